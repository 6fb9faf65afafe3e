#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod api;
mod config;
pub mod error;
pub mod fetch;
mod metrics;
pub mod reconcile;
mod server;
pub mod store;

pub use config::Config;
pub use error::SyncError;
pub use fetch::{
    Credentials,
    FeedFetcher,
    HttpFetcher,
};
pub use reconcile::{
    Clock,
    DirectoryUpdate,
    Reconciler,
    SystemClock,
    UpdateSource,
};
pub use server::{
    Schedule,
    SyncServer,
};
pub use store::{
    SledStore,
    SliverStore,
};

/// Address feed published by the host inventory.
pub const DEFAULT_ADDRESS_FEED_URL: &str = "http://ks.measurementlab.net/mlab-host-ips.txt";
