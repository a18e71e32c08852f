//! JSON export functionality
//!
//! The per-host workbook and the live topology document

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::models::AggregatedEdge;
use crate::topology::{TopologyEdge, TopologyGraph, TopologyNode};

pub const PER_HOST_COLUMNS: [&str; 7] = [
    "Type",
    "LocalIP",
    "Port",
    "RemoteIP",
    "RemoteHost",
    "Count",
    "LatestTimestamp",
];

/// Workbook with one sheet per local host
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerHostWorkbook {
    pub generated_at: String,
    pub sheets: Vec<HostSheet>,
}

#[derive(Debug, Serialize)]
pub struct HostSheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Group rows by local host; sheets come out sorted by host name.
pub fn per_host_workbook(rows: &[AggregatedEdge], generated_at: DateTime<Utc>) -> PerHostWorkbook {
    let mut by_host: BTreeMap<&str, Vec<Vec<Value>>> = BTreeMap::new();
    for row in rows {
        let key = &row.key;
        let port = key.port.map(Value::from).unwrap_or(Value::Null);
        by_host.entry(key.local_host.as_str()).or_default().push(vec![
            Value::from(key.direction.as_str()),
            Value::from(key.local_ip.as_str()),
            port,
            Value::from(key.remote_ip.as_str()),
            Value::from(key.remote_host.as_str()),
            Value::from(row.count),
            Value::from(timestamp(&row.latest_seen_at)),
        ]);
    }

    let sheets = by_host
        .into_iter()
        .map(|(host, rows)| HostSheet {
            name: host.to_string(),
            columns: PER_HOST_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        })
        .collect();

    PerHostWorkbook {
        generated_at: timestamp(&generated_at),
        sheets,
    }
}

pub fn export_per_host_json(rows: &[AggregatedEdge], generated_at: DateTime<Utc>) -> Result<String> {
    let workbook = per_host_workbook(rows, generated_at);
    let json = serde_json::to_string_pretty(&workbook)?;
    Ok(json)
}

fn node_element(node: &TopologyNode) -> Value {
    json!({
        "data": {
            "id": node.id,
            "label": node.label,
            "degree": node.degree,
            "ip": node.ip,
            "classification": node.classification,
            "color": node.color,
        }
    })
}

fn edge_element(edge: &TopologyEdge) -> Value {
    json!({
        "data": {
            "source": edge.source,
            "target": edge.target,
            "label": edge.label,
            "isPublic": edge.is_public,
            "srcIp": edge.src_ip,
            "dstIp": edge.dst_ip,
        }
    })
}

/// Export the live graph in the element-list shape graph viewers consume
pub fn export_topology_json(graph: &TopologyGraph, generated_at: DateTime<Utc>) -> Result<String> {
    let document = json!({
        "nodes": graph.nodes().iter().map(node_element).collect::<Vec<_>>(),
        "edges": graph.edges().iter().map(edge_element).collect::<Vec<_>>(),
        "generatedAt": timestamp(&generated_at),
    });
    let json = serde_json::to_string_pretty(&document)?;
    Ok(json)
}
