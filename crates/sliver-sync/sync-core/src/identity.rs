//! Composite identity of a sliver tool record.
//!
//! The id is the store key for both lookups and upserts, so it must be a
//! deterministic function of `(tool, slice, server, site)` only. Components
//! are joined with `-`; a `-` or `\` inside a component is escaped with `\`,
//! which keeps the encoding injective while matching the plain
//! `tool-slice-server-site` form for ordinary ids.

use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};

const SEPARATOR: char = '-';
const ESCAPE: char = '\\';

/// Store key of a [`SliverTool`](crate::SliverTool).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SliverToolId(String);

impl SliverToolId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for SliverToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<[u8]> for SliverToolId {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Derive the record id from its identity components.
pub fn derive_id(tool_id: &str, slice_id: &str, server_id: &str, site_id: &str) -> SliverToolId {
    let components = [tool_id, slice_id, server_id, site_id];
    let capacity = components.iter().map(|c| c.len() + 1).sum();
    let mut id = String::with_capacity(capacity);

    for (i, component) in components.iter().enumerate() {
        if i > 0 {
            id.push(SEPARATOR);
        }
        for ch in component.chars() {
            if ch == SEPARATOR || ch == ESCAPE {
                id.push(ESCAPE);
            }
            id.push(ch);
        }
    }

    SliverToolId(id)
}
