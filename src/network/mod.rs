//! Network module - address classification against the configured private ranges

mod subnet;

pub use subnet::{is_loopback, parse_ip, PrivateRanges};
