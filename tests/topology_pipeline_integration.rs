use chrono::{DateTime, Duration, TimeZone, Utc};
use netmap_core::{
    refresh_topology, run_live_pass, Classification, Direction, FixtureSource, MapSettings, PassError, Sources,
    TopologyCache,
};
use std::path::PathBuf;
use std::sync::Arc;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
}

fn outgoing(remote_ip: &str, local_port: u16, remote_port: u16) -> String {
    format!(
        r#"{{"outgoingconnections":[{{"localip":"10.0.0.2","remoteip":"{}","localport":{},"remoteport":{}}}]}}"#,
        remote_ip, local_port, remote_port
    )
}

fn base_fixture() -> FixtureSource {
    FixtureSource::new()
        .with_host("web1", &["10.0.0.2"])
        .with_host("db1", &["10.0.0.5"])
        .with_entity("db1", Some("10.0.0.5"), &["Production Database"])
        .with_item("item-web1", "web1")
}

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/small_estate.json")
}

#[test]
fn repeated_sightings_merge_into_one_counted_edge() {
    let fixture = base_fixture()
        .with_entry("item-web1", now() - Duration::minutes(30), &outgoing("10.0.0.5", 51000, 443))
        .with_entry("item-web1", now() - Duration::minutes(20), &outgoing("10.0.0.5", 51001, 443))
        .with_entry("item-web1", now() - Duration::minutes(10), &outgoing("10.0.0.5", 51002, 443));
    let sources = Sources::from_single(Arc::new(fixture));

    let snapshot = run_live_pass(&sources, &MapSettings::default_values(), now()).unwrap();

    let edges = snapshot.graph.edges();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].source, "web1");
    assert_eq!(edges[0].target, "db1");
    assert_eq!(edges[0].port, Some(443));
    assert!(!edges[0].is_public);
    assert_eq!(snapshot.stats.entries, 3);

    let db = snapshot.graph.node("db1").expect("db1 node");
    assert_eq!(db.classification, Classification::Prod);
    assert_eq!(db.label, "db1 (10.0.0.5)");
}

#[test]
fn unresolved_public_address_becomes_external_node() {
    let fixture = base_fixture().with_entry("item-web1", now() - Duration::minutes(5), &outgoing("8.8.8.8", 40000, 53));
    let sources = Sources::from_single(Arc::new(fixture));

    let snapshot = run_live_pass(&sources, &MapSettings::default_values(), now()).unwrap();

    let node = snapshot.graph.node("8.8.8.8").expect("external node");
    assert_eq!(node.classification, Classification::External);
    assert_eq!(node.ip.as_deref(), Some("8.8.8.8"));
    assert!(snapshot.graph.edges()[0].is_public);
    assert_eq!(snapshot.graph.edges()[0].label, "port 53");
}

#[test]
fn malformed_entries_and_failing_items_do_not_abort_the_pass() {
    let fixture = base_fixture()
        .with_item("item-db1", "db1")
        .with_failing_item("item-db1")
        .with_entry("item-web1", now() - Duration::minutes(15), "{not json")
        .with_entry("item-web1", now() - Duration::minutes(5), &outgoing("10.0.0.5", 51000, 5432));
    let sources = Sources::from_single(Arc::new(fixture));

    let snapshot = run_live_pass(&sources, &MapSettings::default_values(), now()).unwrap();

    assert_eq!(snapshot.graph.edges().len(), 1);
    assert_eq!(snapshot.stats.items, 2);
    assert_eq!(snapshot.stats.failed_items, 1);
    assert_eq!(snapshot.stats.skipped_entries, 1);
}

#[test]
fn entries_outside_the_live_window_are_ignored() {
    let fixture = base_fixture()
        .with_entry("item-web1", now() - Duration::hours(30), &outgoing("10.0.0.5", 51000, 22))
        .with_entry("item-web1", now() - Duration::minutes(5), &outgoing("10.0.0.5", 51000, 443));
    let sources = Sources::from_single(Arc::new(fixture));

    let snapshot = run_live_pass(&sources, &MapSettings::default_values(), now()).unwrap();

    let ports: Vec<_> = snapshot.graph.edges().iter().map(|e| e.port).collect();
    assert_eq!(ports, vec![Some(443)]);
}

#[test]
fn inventory_outage_keeps_previous_snapshot() {
    let cache = TopologyCache::new();
    let settings = MapSettings::default_values();
    let healthy = base_fixture().with_entry("item-web1", now() - Duration::minutes(5), &outgoing("10.0.0.5", 51000, 443));
    refresh_topology(&Sources::from_single(Arc::new(healthy)), &settings, &cache, now()).unwrap();

    let broken = base_fixture().with_inventory_unavailable();
    let later = now() + Duration::minutes(5);
    let err = refresh_topology(&Sources::from_single(Arc::new(broken)), &settings, &cache, later).unwrap_err();

    assert!(matches!(err, PassError::InventoryUnavailable(_)));
    let snapshot = cache.snapshot();
    assert_eq!(snapshot.graph.edges().len(), 1);
    assert_eq!(snapshot.refreshed_at, Some(now()));
}

#[test]
fn fixture_file_drives_a_live_pass() {
    let fixture = FixtureSource::load(&fixture_path()).expect("fixture should load");
    let sources = Sources::from_single(Arc::new(fixture));
    let at = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();

    let snapshot = run_live_pass(&sources, &MapSettings::default_values(), at).unwrap();

    let ids: Vec<_> = snapshot.graph.nodes().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["8.8.8.8", "app1", "db1", "web1"]);
    // app1 is only known to the CMDB
    assert!(snapshot.graph.edges().iter().all(|e| e.source != "10.0.3.3"));
    let incoming = snapshot
        .graph
        .edges()
        .iter()
        .find(|e| e.target == "web1")
        .expect("incoming edge into web1");
    assert_eq!(incoming.source, "app1");
    assert_eq!(incoming.port, Some(443));
}

#[test]
fn direction_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Direction::Incoming).unwrap(), "\"incoming\"");
}
