//! # `sliver-sync-core`
//!
//! Pure stages of the sliver tool reconciliation pipeline:
//!
//! ```text
//! feed text ──parse──▶ entries ──match──▶ (record, entry) ──merge──▶ updated record
//! ```
//!
//! Nothing in this crate performs I/O. Fetching feeds, querying candidates and
//! persisting merged records is the job of `sliver-sync-server`.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod address_feed;
pub mod identity;
pub mod matcher;
pub mod merge;
pub mod model;
pub mod status_feed;

pub use address_feed::{
    AddressEntry,
    AddressFeed,
    AddressLineError,
    parse_address_feed,
};
pub use identity::{
    SliverToolId,
    derive_id,
};
pub use matcher::{
    MatchError,
    match_statuses,
    match_unique,
};
pub use merge::{
    ADDRESS_DISABLED,
    apply_address,
    apply_status,
    effective_status,
    is_disabled,
    normalize_address,
};
pub use model::{
    AddressFamily,
    MonitoringConfig,
    Slice,
    SliverTool,
    Status,
};
pub use status_feed::{
    SERVICE_OK,
    SliceStatus,
    StatusFeedError,
    parse_status_feed,
};
