//! CSV export functionality
//!
//! The connection summary and the flat edge list

use anyhow::Result;
use chrono::SecondsFormat;
use csv::Writer;

use crate::models::AggregatedEdge;

pub const SUMMARY_COLUMNS: [&str; 8] = [
    "LocalHost",
    "Type",
    "LocalIP",
    "Port",
    "RemoteIP",
    "RemoteHost",
    "Count",
    "LatestTimestamp",
];

pub const EDGE_LIST_COLUMNS: [&str; 6] = ["Source", "SourceIP", "Target", "TargetIP", "Port", "Count"];

/// One line per aggregated row.
pub fn export_summary_csv(rows: &[AggregatedEdge]) -> Result<String> {
    let mut writer = Writer::from_writer(vec![]);
    writer.write_record(SUMMARY_COLUMNS)?;

    for row in rows {
        let key = &row.key;
        writer.write_record([
            key.local_host.as_str(),
            key.direction.as_str(),
            key.local_ip.as_str(),
            &key.port_text(),
            key.remote_ip.as_str(),
            key.remote_host.as_str(),
            &row.count.to_string(),
            &row.latest_seen_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ])?;
    }

    let csv_data = String::from_utf8(writer.into_inner()?)?;
    Ok(csv_data)
}

/// Directed source/target list; rows missing a host name on either end are
/// left out.
pub fn export_edge_list_csv(rows: &[AggregatedEdge]) -> Result<String> {
    let mut writer = Writer::from_writer(vec![]);
    writer.write_record(EDGE_LIST_COLUMNS)?;

    for row in rows {
        let o = row.key.orientation();
        if o.source.is_empty() || o.target.is_empty() {
            continue;
        }
        writer.write_record([
            o.source,
            o.source_ip,
            o.target,
            o.target_ip,
            &row.key.port_text(),
            &row.count.to_string(),
        ])?;
    }

    let csv_data = String::from_utf8(writer.into_inner()?)?;
    Ok(csv_data)
}
