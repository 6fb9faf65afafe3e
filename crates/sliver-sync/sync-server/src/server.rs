use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use tokio::{
    net::TcpListener,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::SyncError,
    fetch::FeedFetcher,
    reconcile::Reconciler,
    store::SliverStore,
};

/// Intervals of the built-in scheduler. A `None` interval leaves the pass to
/// the external trigger endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Schedule {
    pub address_interval: Option<Duration>,
    pub status_interval: Option<Duration>,
}

pub struct SyncServer<S, F> {
    pub listener: TcpListener,
    pub reconciler: Arc<Reconciler<S, F>>,
    pub schedule: Schedule,
}

// Type alias for boxed future
pub type BoxedFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

impl<S, F> SyncServer<S, F>
where
    S: SliverStore + 'static,
    F: FeedFetcher + 'static,
{
    /// Start the server
    /// Returns the API future and the scheduler future.
    pub fn start(self, cancel_token: CancellationToken) -> (BoxedFuture, BoxedFuture) {
        let scheduler_handle = run_schedule(
            self.reconciler.clone(),
            self.schedule,
            cancel_token.clone(),
        );
        tracing::debug!(schedule = ?self.schedule, "Started scheduler");

        let api_handle = crate::api::serve(self.listener, self.reconciler, cancel_token);
        tracing::info!("Started API server");

        (Box::pin(api_handle), Box::pin(scheduler_handle))
    }

    /// Run the server until the cancellation token is cancelled or one of its
    /// tasks fails.
    pub async fn run(self, cancel_token: CancellationToken) -> Result<()> {
        let (mut api_handle, mut scheduler_handle) = self.start(cancel_token.clone());

        tokio::select! {
            res = &mut api_handle => {
                if let Err(e) = &res {
                    tracing::error!("API server encountered an error: {:?}", e);
                }
                cancel_token.cancel();
                scheduler_handle.await?;
                tracing::info!("Scheduler stopped.");
                res
            }
            res = &mut scheduler_handle => {
                if let Err(e) = &res {
                    tracing::error!("Scheduler encountered an error: {:?}", e);
                }
                cancel_token.cancel();
                api_handle.await?;
                tracing::info!("Api stopped.");
                res
            }
        }
    }
}

async fn run_schedule<S, F>(
    reconciler: Arc<Reconciler<S, F>>,
    schedule: Schedule,
    cancel_token: CancellationToken,
) -> Result<()>
where
    S: SliverStore + 'static,
    F: FeedFetcher + 'static,
{
    let addresses = async {
        if let Some(period) = schedule.address_interval {
            run_periodic("addresses", period, &cancel_token, || {
                reconciler.sync_addresses()
            })
            .await;
        }
    };
    let statuses = async {
        if let Some(period) = schedule.status_interval {
            run_periodic("status", period, &cancel_token, || reconciler.sync_statuses()).await;
        }
    };

    tokio::join!(addresses, statuses);
    // With no intervals configured the scheduler idles until shutdown.
    cancel_token.cancelled().await;
    Ok(())
}

async fn run_periodic<P, Fut>(
    pass: &'static str,
    period: Duration,
    cancel_token: &CancellationToken,
    mut run_pass: P,
) where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<(), SyncError>>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                tracing::info!(pass, "Scheduler received cancellation signal, shutting down...");
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) = run_pass().await {
                    tracing::error!(pass, error = %err, "Scheduled pass failed");
                }
            }
        }
    }
}
