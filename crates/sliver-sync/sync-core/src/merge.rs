//! Merge rules applied to a matched sliver tool.
//!
//! Address and status updates come from independent feeds and touch disjoint
//! fields. They share one cross-field rule: a family whose address is
//! disabled is always `offline`. [`is_disabled`] is the single predicate both
//! merges consult.

use chrono::{
    DateTime,
    Utc,
};

use crate::{
    address_feed::AddressEntry,
    model::{
        AddressFamily,
        SliverTool,
        Status,
    },
};

/// Address value marking a family as administratively disabled.
pub const ADDRESS_DISABLED: &str = "off";

/// Whether an address value means "no address assigned".
pub fn is_disabled(address: &str) -> bool {
    address.is_empty() || address == ADDRESS_DISABLED
}

/// Stored form of an address published by the feed.
pub fn normalize_address(address: &str) -> &str {
    if is_disabled(address) {
        ADDRESS_DISABLED
    } else {
        address
    }
}

/// Apply an address feed entry. Status fields are left for the monitoring pass.
///
/// Returns `true` if either address changed.
pub fn apply_address(tool: &mut SliverTool, entry: &AddressEntry<'_>) -> bool {
    let ipv4 = normalize_address(entry.ipv4);
    let ipv6 = normalize_address(entry.ipv6);
    let changed = tool.sliver_ipv4 != ipv4 || tool.sliver_ipv6 != ipv6;

    ipv4.clone_into(&mut tool.sliver_ipv4);
    ipv6.clone_into(&mut tool.sliver_ipv6);
    changed
}

/// Status a family ends up with given what monitoring reported for it.
pub fn effective_status(address: &str, reported: Status) -> Status {
    if is_disabled(address) {
        Status::Offline
    } else {
        reported
    }
}

/// Apply a monitoring classification for one address family and stamp the
/// record with `now`.
pub fn apply_status(
    tool: &mut SliverTool,
    family: AddressFamily,
    reported: Status,
    now: DateTime<Utc>,
) {
    let status = effective_status(tool.address(family), reported);
    *tool.status_mut(family) = status;
    tool.when = now;
}
