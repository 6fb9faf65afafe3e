use std::fmt;

use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::identity::{
    SliverToolId,
    derive_id,
};

/// Health classification of one address family of a sliver tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    #[default]
    Offline,
}

impl Status {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address family processed by a monitoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub const ALL: [Self; 2] = [Self::Ipv4, Self::Ipv6];

    /// Suffix appended to the tool id to form the monitoring service name.
    /// IPv4 is the default service and carries no suffix.
    pub const fn service_suffix(self) -> &'static str {
        match self {
            Self::Ipv4 => "",
            Self::Ipv6 => "_ipv6",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One deployment of a measurement tool on one server at one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliverTool {
    pub tool_id: String,
    pub slice_id: String,
    pub server_id: String,
    pub site_id: String,
    pub fqdn: String,
    pub sliver_ipv4: String,
    pub sliver_ipv6: String,
    pub status_ipv4: Status,
    pub status_ipv6: Status,
    /// Time of the last status update.
    pub when: DateTime<Utc>,
}

impl SliverTool {
    /// Store key of this record.
    pub fn id(&self) -> SliverToolId {
        derive_id(&self.tool_id, &self.slice_id, &self.server_id, &self.site_id)
    }

    pub fn address(&self, family: AddressFamily) -> &str {
        match family {
            AddressFamily::Ipv4 => &self.sliver_ipv4,
            AddressFamily::Ipv6 => &self.sliver_ipv6,
        }
    }

    pub fn status(&self, family: AddressFamily) -> Status {
        match family {
            AddressFamily::Ipv4 => self.status_ipv4,
            AddressFamily::Ipv6 => self.status_ipv6,
        }
    }

    pub(crate) fn status_mut(&mut self, family: AddressFamily) -> &mut Status {
        match family {
            AddressFamily::Ipv4 => &mut self.status_ipv4,
            AddressFamily::Ipv6 => &mut self.status_ipv6,
        }
    }
}

/// A logical measurement service deployed across many sliver tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    pub tool_id: String,
}

/// Location and credentials of the monitoring system.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl MonitoringConfig {
    /// Well-known key the monitoring entry is stored under.
    pub const DEFAULT_ENTRY: &'static str = "0";
}

impl fmt::Debug for MonitoringConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoringConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
