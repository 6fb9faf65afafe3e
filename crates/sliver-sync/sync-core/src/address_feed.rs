//! Parser for the host address feed.
//!
//! Each non-blank line of the feed carries `fqdn,ipv4,ipv6`. An empty address
//! field means the family is disabled for that host.

use std::str::Lines;

use thiserror::Error;

/// Addresses published for one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressEntry<'a> {
    pub fqdn: &'a str,
    pub ipv4: &'a str,
    pub ipv6: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressLineError {
    #[error("expected 3 comma separated fields, found {found} in line {line:?}")]
    FieldCount { line: String, found: usize },
}

/// Lazy iterator over the lines of an address feed.
///
/// Blank lines are skipped. Every other line yields either an entry or an
/// [`AddressLineError`]. Calling [`parse_address_feed`] again on the same
/// text re-parses it from the start.
#[derive(Debug, Clone)]
pub struct AddressFeed<'a> {
    lines: Lines<'a>,
}

impl<'a> Iterator for AddressFeed<'a> {
    type Item = Result<AddressEntry<'a>, AddressLineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?.trim();
            if line.is_empty() {
                continue;
            }
            return Some(parse_line(line));
        }
    }
}

pub fn parse_address_feed(text: &str) -> AddressFeed<'_> {
    AddressFeed {
        lines: text.lines(),
    }
}

fn parse_line(line: &str) -> Result<AddressEntry<'_>, AddressLineError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [fqdn, ipv4, ipv6] = fields[..] else {
        return Err(AddressLineError::FieldCount {
            line: line.to_string(),
            found: fields.len(),
        });
    };

    Ok(AddressEntry { fqdn, ipv4, ipv6 })
}
