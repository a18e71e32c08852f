//! Connection snapshot payload parsing
//!
//! A payload is a JSON object with `incomingconnections` and
//! `outgoingconnections`, each either one descriptor object or a list of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::PayloadError;
use crate::models::{ConnectionObservation, Direction};

const INCOMING_KEY: &str = "incomingconnections";
const OUTGOING_KEY: &str = "outgoingconnections";

/// One connection as reported by the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionDescriptor {
    #[serde(default, rename = "localip", deserialize_with = "lenient_text")]
    pub local_ip: Option<String>,
    #[serde(default, rename = "remoteip", deserialize_with = "lenient_text")]
    pub remote_ip: Option<String>,
    #[serde(default, rename = "localport", deserialize_with = "lenient_port")]
    pub local_port: Option<u16>,
    #[serde(default, rename = "remoteport", deserialize_with = "lenient_port")]
    pub remote_port: Option<u16>,
}

/// Normalised payload: both directions as lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub incoming: Vec<ConnectionDescriptor>,
    pub outgoing: Vec<ConnectionDescriptor>,
}

impl ConnectionRecord {
    pub fn len(&self) -> usize {
        self.incoming.len() + self.outgoing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every descriptor as an observation stamped with the entry time.
    pub fn observations(
        &self,
        observed_at: DateTime<Utc>,
    ) -> impl Iterator<Item = ConnectionObservation> + '_ {
        let incoming = self.incoming.iter().map(|d| (Direction::Incoming, d));
        let outgoing = self.outgoing.iter().map(|d| (Direction::Outgoing, d));
        incoming
            .chain(outgoing)
            .map(move |(direction, d)| ConnectionObservation {
                direction,
                local_ip: d.local_ip.clone().unwrap_or_default(),
                remote_ip: d.remote_ip.clone().unwrap_or_default(),
                local_port: d.local_port,
                remote_port: d.remote_port,
                observed_at,
            })
    }
}

/// Parse one telemetry payload.
pub fn parse_payload(raw: &str) -> Result<ConnectionRecord, PayloadError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(map) = value else {
        return Err(PayloadError::NotAnObject);
    };

    Ok(ConnectionRecord {
        incoming: descriptors(map.get(INCOMING_KEY)),
        outgoing: descriptors(map.get(OUTGOING_KEY)),
    })
}

fn descriptors(value: Option<&Value>) -> Vec<ConnectionDescriptor> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(descriptor).collect(),
        Some(single @ Value::Object(_)) => descriptor(single).into_iter().collect(),
        _ => Vec::new(),
    }
}

// Non-object members are dropped individually.
fn descriptor(value: &Value) -> Option<ConnectionDescriptor> {
    if !value.is_object() {
        return None;
    }
    ConnectionDescriptor::deserialize(value).ok()
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Some(Value::String(s)) => s.trim().parse::<u16>().ok(),
        _ => None,
    })
}
