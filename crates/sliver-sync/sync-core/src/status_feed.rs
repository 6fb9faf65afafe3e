//! Parser for the monitoring (Nagios `show_state`) feed.
//!
//! Lines look like `<sliver fqdn>/<service> <state code> ...`. A state code of
//! [`SERVICE_OK`] means the service is healthy.

use std::collections::HashMap;

use thiserror::Error;

use crate::model::Status;

/// State code reported for a healthy service.
pub const SERVICE_OK: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusFeedError {
    /// No line of the feed could be parsed.
    #[error("status feed contained no parseable lines")]
    Empty,
}

/// Classification of every sliver reported by one monitoring query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceStatus {
    statuses: HashMap<String, Status>,
}

impl SliceStatus {
    pub fn get(&self, fqdn: &str) -> Option<Status> {
        self.statuses.get(fqdn).copied()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Status)> {
        self.statuses.iter().map(|(fqdn, status)| (fqdn.as_str(), *status))
    }
}

impl FromIterator<(String, Status)> for SliceStatus {
    fn from_iter<T: IntoIterator<Item = (String, Status)>>(iter: T) -> Self {
        Self {
            statuses: iter.into_iter().collect(),
        }
    }
}

/// Parse a monitoring feed body. Unparseable lines are skipped; when a sliver
/// is reported more than once the last line wins.
pub fn parse_status_feed(text: &str) -> Result<SliceStatus, StatusFeedError> {
    let status: SliceStatus = text
        .lines()
        .filter_map(parse_line)
        .map(|(fqdn, status)| (fqdn.to_string(), status))
        .collect();

    if status.is_empty() {
        return Err(StatusFeedError::Empty);
    }
    Ok(status)
}

fn parse_line(line: &str) -> Option<(&str, Status)> {
    let mut fields = line.split_whitespace();
    let slice_path = fields.next()?;
    let state = fields.next()?;
    let (fqdn, _service) = slice_path.split_once('/')?;
    if fqdn.is_empty() {
        return None;
    }

    Some((fqdn, classify(state)))
}

/// Map a monitoring state code onto a [`Status`].
pub fn classify(state: &str) -> Status {
    if state == SERVICE_OK {
        Status::Online
    } else {
        Status::Offline
    }
}
