//! Matching of feed entries against stored sliver tools.

use thiserror::Error;

use crate::{
    model::{
        SliverTool,
        Status,
    },
    status_feed::SliceStatus,
};

/// A feed entry that could not be tied to exactly one stored record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("no sliver tool found with fqdn {fqdn}")]
    NotFound { fqdn: String },
    #[error("{count} sliver tools share fqdn {fqdn}")]
    Ambiguous { fqdn: String, count: usize },
}

/// Resolve the candidates returned by an fqdn query to the single record the
/// address feed line refers to.
pub fn match_unique(fqdn: &str, mut candidates: Vec<SliverTool>) -> Result<SliverTool, MatchError> {
    match candidates.len() {
        0 => Err(MatchError::NotFound {
            fqdn: fqdn.to_string(),
        }),
        1 => Ok(candidates.swap_remove(0)),
        count => Err(MatchError::Ambiguous {
            fqdn: fqdn.to_string(),
            count,
        }),
    }
}

/// Pair every candidate reported by the monitoring feed with its status.
/// Candidates the feed does not mention are dropped.
pub fn match_statuses<'a, I>(
    candidates: I,
    statuses: &'a SliceStatus,
) -> impl Iterator<Item = (SliverTool, Status)> + 'a
where
    I: IntoIterator<Item = SliverTool>,
    I::IntoIter: 'a,
{
    candidates.into_iter().filter_map(move |tool| {
        let status = statuses.get(&tool.fqdn)?;
        Some((tool, status))
    })
}
