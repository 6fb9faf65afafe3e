//! Error types of the reconciliation server.

use sliver_sync_core::{
    MatchError,
    StatusFeedError,
};
use thiserror::Error;

/// Failure of the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sled(#[from] std::io::Error),
    #[error("failed to encode or decode record: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failure to retrieve a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} responded with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("cannot answer digest challenge: {0}")]
    Digest(#[from] digest_auth::Error),
}

/// Failure that aborts a whole reconciliation pass. These surface at the
/// trigger endpoint; per-record failures are only logged.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to fetch address feed: {0}")]
    AddressFeed(#[source] FetchError),
    #[error("failed to load monitoring configuration: {0}")]
    MonitoringConfig(#[source] StoreError),
    #[error("monitoring configuration entry not found")]
    MissingMonitoringConfig,
    #[error("invalid monitoring URL {url:?}: {source}")]
    MonitoringUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to load slices: {0}")]
    Slices(#[source] StoreError),
}

/// Why a single address feed line was not applied.
#[derive(Debug, Error)]
pub(crate) enum LineError {
    #[error(transparent)]
    Malformed(#[from] sliver_sync_core::AddressLineError),
    #[error("failed to query sliver tools: {0}")]
    Query(#[source] StoreError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("failed to persist sliver tool: {0}")]
    Persist(#[source] StoreError),
}

impl LineError {
    pub(crate) const fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::Query(_) => "query",
            Self::Match(MatchError::NotFound { .. }) => "not_found",
            Self::Match(MatchError::Ambiguous { .. }) => "ambiguous",
            Self::Persist(_) => "persist",
        }
    }
}

/// Why one (slice, family) monitoring unit was skipped.
#[derive(Debug, Error)]
pub(crate) enum UnitError {
    #[error("failed to fetch status feed: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Feed(#[from] StatusFeedError),
    #[error("failed to query sliver tools: {0}")]
    Query(#[source] StoreError),
    #[error("failed to persist sliver tools: {0}")]
    Persist(#[source] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn line_error_reasons() {
        let not_found = LineError::from(MatchError::NotFound {
            fqdn: "host1.example.org".to_string(),
        });
        let ambiguous = LineError::from(MatchError::Ambiguous {
            fqdn: "host1.example.org".to_string(),
            count: 2,
        });
        let persist = LineError::Persist(StoreError::Sled(std::io::Error::other("disk full")));

        assert_eq!(not_found.reason(), "not_found");
        assert_eq!(ambiguous.reason(), "ambiguous");
        assert_eq!(persist.reason(), "persist");
        assert_eq!(
            persist.to_string(),
            "failed to persist sliver tool: database error: disk full"
        );
    }

    #[test]
    fn empty_feed_is_a_unit_error() {
        let err = UnitError::from(StatusFeedError::Empty);
        assert_matches!(err, UnitError::Feed(StatusFeedError::Empty));
        assert_eq!(err.to_string(), "status feed contained no parseable lines");
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
        assert_send_sync::<StoreError>();
        assert_send_sync::<FetchError>();
    }
}
