//! draw.io diagram export
//!
//! One page per local host. Each page holds the host's laid-out subgraph:
//! nodes as rounded rectangles, connections as labelled arrows. Page, node
//! and edge ids are sequential so identical input renders identical files.

use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::collections::{BTreeMap, BTreeSet};

use crate::layout::{layout_subgraph, DiagramLayout, HostSubgraph, LayoutConfig};
use crate::models::AggregatedEdge;

const NODE_STYLE: &str = "rounded=1;whiteSpace=wrap;html=1;";
const EDGE_STYLE: &str = "endArrow=classic;html=1;rounded=0;";

/// Every address seen for each host name, excluding the name itself.
pub fn host_ip_aliases(rows: &[AggregatedEdge]) -> BTreeMap<String, BTreeSet<String>> {
    let mut aliases: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for row in rows {
        let key = &row.key;
        for (host, ip) in [(&key.local_host, &key.local_ip), (&key.remote_host, &key.remote_ip)] {
            if host.is_empty() || ip.is_empty() || host == ip {
                continue;
            }
            aliases.entry(host.clone()).or_default().insert(ip.clone());
        }
    }
    aliases
}

/// Node caption: the host name followed by its known addresses.
pub fn node_label(name: &str, aliases: &BTreeMap<String, BTreeSet<String>>) -> String {
    match aliases.get(name) {
        Some(ips) if !ips.is_empty() => {
            let ips: Vec<&str> = ips.iter().map(String::as_str).collect();
            format!("{} ({})", name, ips.join(", "))
        }
        _ => name.to_string(),
    }
}

/// Lay out every non-excluded local host, in host-name order. Hosts whose
/// subgraph ends up empty get no page.
pub fn build_diagram_pages(
    rows: &[AggregatedEdge],
    excluded: &BTreeSet<String>,
    cfg: &LayoutConfig,
) -> Vec<DiagramLayout> {
    let hosts: BTreeSet<&str> = rows
        .iter()
        .map(|r| r.key.local_host.as_str())
        .filter(|h| !h.is_empty() && !excluded.contains(*h))
        .collect();

    hosts
        .into_iter()
        .filter_map(|host| {
            let subgraph = HostSubgraph::from_rows(host, rows, excluded);
            let layout = layout_subgraph(subgraph, cfg);
            if layout.is_none() {
                tracing::debug!("[EXPORT] Host '{}' has no drawable connections, skipping page", host);
            }
            layout
        })
        .collect()
}

fn start<'a>(name: &'a str, attrs: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    let mut el = BytesStart::new(name);
    for &attr in attrs {
        el.push_attribute(attr);
    }
    el
}

/// Render laid-out pages as an `mxfile` document.
pub fn render_drawio(
    pages: &[DiagramLayout],
    aliases: &BTreeMap<String, BTreeSet<String>>,
    footprint_width: f64,
    footprint_height: f64,
) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(start("mxfile", &[("host", "netmap-core")])))?;

    let width = footprint_width.to_string();
    let height = footprint_height.to_string();
    let mut next_node = 1usize;
    let mut next_edge = 1usize;

    for (page_idx, page) in pages.iter().enumerate() {
        let page_id = format!("page-{}", page_idx + 1);
        writer.write_event(Event::Start(start(
            "diagram",
            &[("id", page_id.as_str()), ("name", page.subgraph.host.as_str())],
        )))?;
        writer.write_event(Event::Start(start(
            "mxGraphModel",
            &[("grid", "1"), ("gridSize", "10"), ("arrows", "1"), ("page", "1")],
        )))?;
        writer.write_event(Event::Start(BytesStart::new("root")))?;
        writer.write_event(Event::Empty(start("mxCell", &[("id", "0")])))?;
        writer.write_event(Event::Empty(start("mxCell", &[("id", "1"), ("parent", "0")])))?;

        let mut node_ids: Vec<String> = Vec::with_capacity(page.subgraph.nodes().len());
        for (name, pos) in page.subgraph.nodes().iter().zip(&page.positions) {
            let id = format!("node-{}", next_node);
            next_node += 1;
            let label = node_label(name, aliases);
            writer.write_event(Event::Start(start(
                "mxCell",
                &[
                    ("id", id.as_str()),
                    ("value", label.as_str()),
                    ("style", NODE_STYLE),
                    ("vertex", "1"),
                    ("parent", "1"),
                ],
            )))?;
            let x = format!("{:.1}", pos.x);
            let y = format!("{:.1}", pos.y);
            writer.write_event(Event::Empty(start(
                "mxGeometry",
                &[
                    ("x", x.as_str()),
                    ("y", y.as_str()),
                    ("width", width.as_str()),
                    ("height", height.as_str()),
                    ("as", "geometry"),
                ],
            )))?;
            writer.write_event(Event::End(BytesEnd::new("mxCell")))?;
            node_ids.push(id);
        }

        for edge in page.subgraph.edges() {
            let id = format!("edge-{}", next_edge);
            next_edge += 1;
            writer.write_event(Event::Start(start(
                "mxCell",
                &[
                    ("id", id.as_str()),
                    ("value", edge.label.as_str()),
                    ("style", EDGE_STYLE),
                    ("edge", "1"),
                    ("parent", "1"),
                    ("source", node_ids[edge.source].as_str()),
                    ("target", node_ids[edge.target].as_str()),
                ],
            )))?;
            writer.write_event(Event::Empty(start(
                "mxGeometry",
                &[("relative", "1"), ("as", "geometry")],
            )))?;
            writer.write_event(Event::End(BytesEnd::new("mxCell")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("root")))?;
        writer.write_event(Event::End(BytesEnd::new("mxGraphModel")))?;
        writer.write_event(Event::End(BytesEnd::new("diagram")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("mxfile")))?;
    let xml = String::from_utf8(writer.into_inner())?;
    Ok(xml)
}

/// Build and render the full diagram document. Returns the XML and the
/// number of pages drawn.
pub fn export_drawio(
    rows: &[AggregatedEdge],
    excluded: &BTreeSet<String>,
    cfg: &LayoutConfig,
) -> Result<(String, usize)> {
    let pages = build_diagram_pages(rows, excluded, cfg);
    let aliases = host_ip_aliases(rows);
    let xml = render_drawio(&pages, &aliases, cfg.footprint.width, cfg.footprint.height)?;
    Ok((xml, pages.len()))
}
