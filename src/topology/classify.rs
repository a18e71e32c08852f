//! Node classification
//!
//! Infers an environment from inventory role tags, or marks the node external
//! when its address lies outside the private ranges.

use serde::{Deserialize, Serialize};

use crate::network::PrivateRanges;

/// Environment / exposure of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    Prod,
    Dev,
    Test,
    Qa,
    External,
    InternalUnknown,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Prod => "prod",
            Classification::Dev => "dev",
            Classification::Test => "test",
            Classification::Qa => "qa",
            Classification::External => "external",
            Classification::InternalUnknown => "internal-unknown",
        }
    }

    /// Display color for diagrams and the live map.
    pub fn color(&self) -> &'static str {
        match self {
            Classification::Prod => "#007bff",
            Classification::Dev => "#28a745",
            Classification::Test => "#fd7e14",
            Classification::Qa => "#6f42c1",
            Classification::External => "#ff3366",
            Classification::InternalUnknown => "#999999",
        }
    }
}

// Checked in order; first match wins.
const ENVIRONMENT_KEYWORDS: &[(Classification, &[&str])] = &[
    (Classification::Prod, &["prod", "prd", "production"]),
    (Classification::Dev, &["dev", "developer"]),
    (Classification::Test, &["test", "tst"]),
    (Classification::Qa, &["qa", "quality", "pre-prod"]),
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Environment of a single role or tag string.
pub fn classify_tag(tag: &str) -> Option<Classification> {
    let tag_lower = tag.to_lowercase();
    ENVIRONMENT_KEYWORDS
        .iter()
        .find(|(_, keywords)| contains_any(&tag_lower, keywords))
        .map(|(class, _)| *class)
}

/// Environment from a node's tags; the first tag that names one wins.
pub fn classify_tags<S: AsRef<str>>(tags: &[S]) -> Option<Classification> {
    tags.iter().find_map(|t| classify_tag(t.as_ref()))
}

/// Full node classification. A known public address overrides any tag.
pub fn classify_node<S: AsRef<str>>(
    ip: Option<&str>,
    tags: &[S],
    ranges: &PrivateRanges,
) -> Classification {
    if ip.is_some_and(|ip| ranges.is_public_ip(ip)) {
        return Classification::External;
    }
    classify_tags(tags).unwrap_or(Classification::InternalUnknown)
}
