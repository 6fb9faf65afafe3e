//! # `api`
//!
//! HTTP endpoints used by the scheduler (cron) to trigger reconciliation.
//!
//! | Method     | Path                      | Response                                    |
//! |------------|---------------------------|---------------------------------------------|
//! | GET, POST  | `/admin/update/addresses` | `200 OK`, or `500` if the feed fetch failed |
//! | GET, POST  | `/admin/update/status`    | `200 OK`, or `500` if the monitoring entry or slices could not be loaded |
//! | GET        | `/health`                 | `200 ok`                                    |
//! | GET        | `/ready`                  | `200 ready` / `503 not ready`               |
//!
//! A `200` acknowledges that the pass ran to completion. Individual records
//! may still have been skipped; those are only visible in the logs and
//! metrics.

pub mod accept;

use std::{
    net::SocketAddr,
    sync::Arc,
};

use anyhow::Result;
use hyper_util::rt::TokioIo;
use tokio::net::{
    TcpListener,
    TcpStream,
};
use tokio_util::sync::CancellationToken;

use crate::{
    fetch::FeedFetcher,
    reconcile::Reconciler,
    store::SliverStore,
};

pub const ADDRESS_UPDATE_PATH: &str = "/admin/update/addresses";
pub const STATUS_UPDATE_PATH: &str = "/admin/update/status";

/// Start the API server
pub async fn serve<S, F>(
    listener: TcpListener,
    reconciler: Arc<Reconciler<S, F>>,
    cancel_token: CancellationToken,
) -> Result<()>
where
    S: SliverStore + 'static,
    F: FeedFetcher + 'static,
{
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                tracing::info!(target: "api", "Api received cancellation signal, shutting down...");
                break;
            }
            res = listener.accept() => {
                match res {
                    Ok((stream, socketaddr)) => {
                        serve_connection(socketaddr, reconciler.clone(), stream);
                    }
                    Err(err) => {
                        tracing::error!(target: "api", ?err, "Error accepting connection");
                    }
                }
            }
        }
    }

    Ok(())
}

fn serve_connection<S, F>(
    socketaddr: SocketAddr,
    reconciler: Arc<Reconciler<S, F>>,
    stream: TcpStream,
) where
    S: SliverStore + 'static,
    F: FeedFetcher + 'static,
{
    tracing::debug!(target: "api", %socketaddr, "Connection accepted");

    // Use an adapter to access something implementing `tokio::io` traits as if they implement
    // `hyper::rt` IO traits.
    let io = TokioIo::new(stream);

    tokio::task::spawn(async move {
        crate::accept!(io, reconciler, socketaddr);
    });
}
