use std::time::Instant;

use sliver_sync_core::{
    AddressEntry,
    AddressLineError,
    SliverTool,
    apply_address,
    match_unique,
    parse_address_feed,
};
use tracing::{
    debug,
    error,
    info,
    warn,
};

use super::{
    Reconciler,
    UpdateSource,
};
use crate::{
    error::{
        LineError,
        SyncError,
    },
    fetch::FeedFetcher,
    metrics::{
        self,
        PASS_ADDRESSES,
    },
    store::SliverStore,
};

impl<S, F> Reconciler<S, F>
where
    S: SliverStore + 'static,
    F: FeedFetcher,
{
    /// Pull the address feed and apply it to the stored sliver tools.
    ///
    /// Fails only if the feed cannot be fetched.
    #[tracing::instrument(level = "info", skip_all, target = "reconcile::address")]
    pub async fn sync_addresses(&self) -> Result<(), SyncError> {
        let _pass = self.address_pass.lock().await;
        let started = Instant::now();

        let body = match self.fetcher.fetch(&self.address_feed_url, None).await {
            Ok(body) => body,
            Err(err) => {
                error!(
                    target: "reconcile::address",
                    url = %self.address_feed_url,
                    error = %err,
                    "Failed to fetch address feed"
                );
                metrics::record_pass_failure(PASS_ADDRESSES);
                return Err(SyncError::AddressFeed(err));
            }
        };

        let mut updated = Vec::new();
        let mut unchanged = 0usize;
        let mut skipped = 0usize;
        for line in parse_address_feed(&body) {
            match self.apply_address_line(line).await {
                Ok(Some(tool)) => updated.push(tool),
                Ok(None) => unchanged += 1,
                Err(err) => {
                    skipped += 1;
                    metrics::record_skipped(PASS_ADDRESSES, err.reason());
                    log_line_error(&err);
                }
            }
        }

        metrics::record_updated(PASS_ADDRESSES, updated.len());
        metrics::record_pass_duration(PASS_ADDRESSES, started.elapsed());
        info!(
            target: "reconcile::address",
            updated = updated.len(),
            unchanged,
            skipped,
            "Address pass complete"
        );

        self.publish(UpdateSource::Addresses, updated);
        Ok(())
    }

    /// Match, merge and persist one feed line. Returns the persisted record,
    /// or `None` when the stored addresses already agree with the feed.
    async fn apply_address_line(
        &self,
        line: Result<AddressEntry<'_>, AddressLineError>,
    ) -> Result<Option<SliverTool>, LineError> {
        let entry = line?;
        let fqdn = entry.fqdn.to_owned();
        let candidates = self
            .with_store(move |store| store.sliver_tools_by_fqdn(&fqdn))
            .await
            .map_err(LineError::Query)?;
        let id = match_unique(entry.fqdn, candidates)?.id();

        let (fqdn, ipv4, ipv6) = (
            entry.fqdn.to_owned(),
            entry.ipv4.to_owned(),
            entry.ipv6.to_owned(),
        );
        let updated = self
            .with_store(move |store| {
                let entry = AddressEntry {
                    fqdn: &fqdn,
                    ipv4: &ipv4,
                    ipv6: &ipv6,
                };
                store.update_sliver_tool(&id, |tool| apply_address(tool, &entry))
            })
            .await
            .map_err(LineError::Persist)?;

        if let Some(tool) = &updated {
            debug!(
                target: "reconcile::address",
                fqdn = %tool.fqdn,
                ipv4 = %tool.sliver_ipv4,
                ipv6 = %tool.sliver_ipv6,
                "Updated sliver tool addresses"
            );
        }
        Ok(updated)
    }
}

fn log_line_error(err: &LineError) {
    match err {
        LineError::Malformed(_) => {
            debug!(target: "reconcile::address", error = %err, "Skipping malformed feed line");
        }
        LineError::Match(_) => {
            warn!(target: "reconcile::address", error = %err, "Skipping feed line");
        }
        LineError::Query(_) | LineError::Persist(_) => {
            error!(target: "reconcile::address", error = %err, "Skipping feed line");
        }
    }
}
