//! Private-range membership and address helpers

use anyhow::{Context, Result};
use ipnetwork::IpNetwork;
use std::net::IpAddr;

use crate::config::PRIVATE_RANGES;

/// Parses a textual address, tolerating surrounding whitespace.
pub fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse::<IpAddr>().ok()
}

/// True if the address parses and is a loopback address.
pub fn is_loopback(raw: &str) -> bool {
    parse_ip(raw).is_some_and(|ip| ip.is_loopback())
}

/// The set of CIDR ranges considered internal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateRanges {
    networks: Vec<IpNetwork>,
}

impl Default for PrivateRanges {
    fn default() -> Self {
        let networks = PRIVATE_RANGES
            .iter()
            .filter_map(|cidr| cidr.parse::<IpNetwork>().ok())
            .collect();
        Self { networks }
    }
}

impl PrivateRanges {
    /// Parse a list of CIDR strings. Fails on the first malformed entry.
    pub fn parse<S: AsRef<str>>(cidrs: &[S]) -> Result<Self> {
        let networks = cidrs
            .iter()
            .map(|c| {
                c.as_ref()
                    .trim()
                    .parse::<IpNetwork>()
                    .with_context(|| format!("Invalid CIDR range '{}'", c.as_ref()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { networks })
    }

    pub fn networks(&self) -> &[IpNetwork] {
        &self.networks
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(ip))
    }

    /// True if `raw` parses and falls inside one of the ranges.
    pub fn is_internal_ip(&self, raw: &str) -> bool {
        parse_ip(raw).is_some_and(|ip| self.contains(ip))
    }

    /// True if `raw` parses and falls outside every range.
    /// Unparsable input is neither internal nor public.
    pub fn is_public_ip(&self, raw: &str) -> bool {
        parse_ip(raw).is_some_and(|ip| !self.contains(ip))
    }
}

#[cfg(test)]
#[path = "subnet_tests.rs"]
mod subnet_tests;
