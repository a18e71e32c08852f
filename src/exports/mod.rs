//! Export functionality for network blueprint reports
//!
//! Provides CSV, JSON and draw.io renderers plus the per-variant report run

pub mod csv;
pub mod drawio;
pub mod filter;
pub mod json;
pub mod report;

pub use csv::{export_edge_list_csv, export_summary_csv, EDGE_LIST_COLUMNS, SUMMARY_COLUMNS};
pub use drawio::{build_diagram_pages, export_drawio, host_ip_aliases, node_label, render_drawio};
pub use filter::FilterVariant;
pub use json::{export_per_host_json, export_topology_json, per_host_workbook, HostSheet, PerHostWorkbook};
pub use report::{generate_reports, list_report_files, Artifact, ExportSummary, ReportFile, ReportOptions};
