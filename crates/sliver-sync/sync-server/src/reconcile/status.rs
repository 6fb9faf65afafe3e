use std::time::Instant;

use futures::{
    StreamExt,
    stream,
};
use sliver_sync_core::{
    AddressFamily,
    Slice,
    SliverToolId,
    Status,
    apply_status,
    match_statuses,
    parse_status_feed,
};
use tracing::{
    debug,
    error,
    info,
    warn,
};
use url::Url;

use super::{
    Reconciler,
    UpdateSource,
};
use crate::{
    error::{
        StoreError,
        SyncError,
        UnitError,
    },
    fetch::{
        Credentials,
        FeedFetcher,
    },
    metrics::{
        self,
        PASS_STATUS,
    },
    store::SliverStore,
};

/// Monitoring query selecting one service, e.g.
/// `<base>?show_state=1&service_name=ndt_ipv6`.
pub fn monitoring_url(base: &Url, tool_id: &str, family: AddressFamily) -> Url {
    let service_name = format!("{tool_id}{}", family.service_suffix());
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("show_state", "1")
        .append_pair("service_name", &service_name);
    url
}

/// What one (slice, family) unit did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct UnitOutcome {
    updated: usize,
    skipped: usize,
}

/// Totals logged when a status pass completes. `None` marks a failed unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PassTotals {
    updated: usize,
    skipped: usize,
    failed_units: usize,
}

impl FromIterator<Option<UnitOutcome>> for PassTotals {
    fn from_iter<I: IntoIterator<Item = Option<UnitOutcome>>>(outcomes: I) -> Self {
        outcomes
            .into_iter()
            .fold(Self::default(), |mut totals, outcome| {
                match outcome {
                    Some(outcome) => {
                        totals.updated += outcome.updated;
                        totals.skipped += outcome.skipped;
                    }
                    None => totals.failed_units += 1,
                }
                totals
            })
    }
}

impl<S, F> Reconciler<S, F>
where
    S: SliverStore + 'static,
    F: FeedFetcher,
{
    /// Pull the monitoring feed for every slice and address family and apply
    /// it to the stored sliver tools.
    ///
    /// Fails only if the monitoring entry or the slice list cannot be loaded.
    #[tracing::instrument(level = "info", skip_all, target = "reconcile::status")]
    pub async fn sync_statuses(&self) -> Result<(), SyncError> {
        let _pass = self.status_pass.lock().await;
        let started = Instant::now();

        let (base, auth, slices) = self.load_monitoring_inputs().await.inspect_err(|err| {
            error!(target: "reconcile::status", error = %err, "Cannot start status pass");
            metrics::record_pass_failure(PASS_STATUS);
        })?;

        let units = slices
            .iter()
            .flat_map(|slice| AddressFamily::ALL.map(|family| (slice, family)));
        let base = &base;
        let auth = &auth;
        let unit_passes = units
            .into_iter()
            .map(|(slice, family)| {
                async move {
                    match self.sync_unit(base, auth, slice, family).await {
                        Ok(outcome) => Some(outcome),
                        Err(err) => {
                            metrics::record_unit_failure(family);
                            warn!(
                                target: "reconcile::status",
                                tool_id = %slice.tool_id,
                                %family,
                                error = %err,
                                "Skipping monitoring unit"
                            );
                            None
                        }
                    }
                }
            })
            .collect::<Vec<_>>();
        let totals: PassTotals = stream::iter(unit_passes)
            .buffer_unordered(self.monitoring_concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect();

        metrics::record_pass_duration(PASS_STATUS, started.elapsed());
        info!(
            target: "reconcile::status",
            slices = slices.len(),
            updated = totals.updated,
            skipped = totals.skipped,
            failed_units = totals.failed_units,
            "Status pass complete"
        );
        Ok(())
    }

    async fn load_monitoring_inputs(&self) -> Result<(Url, Credentials, Vec<Slice>), SyncError> {
        let config = self
            .with_store(|store| store.monitoring_config())
            .await
            .map_err(SyncError::MonitoringConfig)?
            .ok_or(SyncError::MissingMonitoringConfig)?;
        let base = Url::parse(&config.url).map_err(|source| {
            SyncError::MonitoringUrl {
                url: config.url.clone(),
                source,
            }
        })?;
        let slices = self
            .with_store(|store| store.slices())
            .await
            .map_err(SyncError::Slices)?;

        Ok((base, Credentials::from(&config), slices))
    }

    /// Fetch, match, merge and persist the statuses of one (slice, family).
    async fn sync_unit(
        &self,
        base: &Url,
        auth: &Credentials,
        slice: &Slice,
        family: AddressFamily,
    ) -> Result<UnitOutcome, UnitError> {
        let url = monitoring_url(base, &slice.tool_id, family);
        let body = self.fetcher.fetch(&url, Some(auth)).await?;
        let statuses = parse_status_feed(&body)?;
        let tool_id = slice.tool_id.clone();
        let candidates = self
            .with_store(move |store| store.sliver_tools_by_tool_id(&tool_id))
            .await
            .map_err(UnitError::Query)?;

        let now = self.clock.now();
        let matched: Vec<(SliverToolId, String, Status)> = match_statuses(candidates, &statuses)
            .map(|(tool, reported)| (tool.id(), tool.fqdn, reported))
            .collect();
        let results = self
            .with_store(move |store| {
                Ok(matched
                    .into_iter()
                    .map(|(id, fqdn, reported)| {
                        let result = store.update_sliver_tool(&id, |tool| {
                            apply_status(tool, family, reported, now);
                            true
                        });
                        (fqdn, result)
                    })
                    .collect::<Vec<_>>())
            })
            .await
            .map_err(UnitError::Persist)?;

        let mut updated = Vec::new();
        let mut outcome = UnitOutcome::default();
        for (fqdn, result) in results {
            match result {
                Ok(Some(tool)) => updated.push(tool),
                // Removed since it was matched.
                Ok(None) => {}
                Err(err) => {
                    outcome.skipped += 1;
                    log_persist_failure(&fqdn, family, &err);
                }
            }
        }
        outcome.updated = updated.len();

        debug!(
            target: "reconcile::status",
            tool_id = %slice.tool_id,
            %family,
            reported = statuses.len(),
            updated = outcome.updated,
            "Applied monitoring unit"
        );
        metrics::record_updated(PASS_STATUS, outcome.updated);
        self.publish(UpdateSource::Status(family), updated);
        Ok(outcome)
    }
}

fn log_persist_failure(fqdn: &str, family: AddressFamily, err: &StoreError) {
    metrics::record_skipped(PASS_STATUS, "persist");
    error!(
        target: "reconcile::status",
        %fqdn,
        %family,
        error = %err,
        "Failed to persist sliver tool status"
    );
}
