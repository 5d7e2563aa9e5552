//! Unit tests for API types serialization/deserialization.

#![allow(clippy::unwrap_used, clippy::panic)]

use cellpci::api::{CellCounters, HealthResponse, IndicationResponse, Rat, Report};
use cellpci_core::{CellKey, CellSize, Cgi, ConflictCounters, Pci, PciError, PciPool};

const PLMN: u32 = 0x13F184;

fn parse(json: &str) -> Report {
    serde_json::from_str(json).unwrap()
}

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_serialization() {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: "0.1.0".to_string(),
    };

    let json = serde_json::to_string(&health).unwrap();
    assert!(json.contains("\"status\":\"ok\""));
    assert!(json.contains("\"version\":\"0.1.0\""));
}

// =============================================================================
// REPORT TESTS
// =============================================================================

#[test]
fn test_report_minimal_uses_defaults() {
    let report = parse(r#"{"plmn":1307012,"cell_id":10,"pci":5}"#);

    assert_eq!(report.rat, Rat::Nr);
    assert_eq!(report.cell_size, CellSize::Macro);
    assert!(report.node_id.is_empty());
    assert!(report.pools.is_empty());
    assert!(report.neighbors.is_empty());
}

#[test]
fn test_report_full_deserialization() {
    let report = parse(
        r#"{
            "plmn": 1307012,
            "cell_id": 10,
            "rat": "eutra",
            "node_id": "enb-7",
            "pci": 42,
            "dl_earfcn": 6300,
            "cell_size": "outdoor_small",
            "pools": [{"lower": 100, "upper": 200}],
            "neighbors": [{"plmn": 1307012, "cell_id": 11, "pci": 43}]
        }"#,
    );

    assert_eq!(report.rat, Rat::Eutra);
    assert_eq!(report.cell_size, CellSize::OutdoorSmall);
    assert_eq!(report.pools, vec![PciPool::new(100, 200)]);
    assert_eq!(report.neighbors.len(), 1);
    assert_eq!(report.neighbors[0].rat, Rat::Nr);
}

#[test]
fn test_report_to_fact() {
    let report = parse(
        r#"{"plmn":1307012,"cell_id":10,"node_id":"gnb-1","pci":5,"dl_earfcn":640000,
            "neighbors":[{"plmn":1307012,"cell_id":11,"pci":6}]}"#,
    );

    let fact = report.to_fact(&[PciPool::new(1, 10)]).unwrap();

    assert_eq!(fact.cgi, Cgi::nr(PLMN, 10).unwrap());
    assert_eq!(fact.node_id.as_str(), "gnb-1");
    assert_eq!(fact.metric.pci, Pci(5));
    assert_eq!(fact.metric.dl_earfcn, 640_000);
    assert_eq!(fact.pools, vec![PciPool::new(1, 10)]);
    assert_eq!(fact.neighbors.len(), 1);
    assert_eq!(fact.neighbors[0].cgi, Cgi::nr(PLMN, 11).unwrap());
    assert_eq!(fact.neighbors[0].pci, Pci(6));
}

#[test]
fn test_report_own_pools_win_over_defaults() {
    let report = parse(r#"{"plmn":1307012,"cell_id":10,"pci":5,"pools":[{"lower":20,"upper":30}]}"#);

    let fact = report.to_fact(&[PciPool::new(1, 10)]).unwrap();

    assert_eq!(fact.pools, vec![PciPool::new(20, 30)]);
}

#[test]
fn test_report_pci_out_of_range() {
    let report = parse(r#"{"plmn":1307012,"cell_id":10,"pci":1008}"#);
    assert!(matches!(report.to_fact(&[]), Err(PciError::Serialization(_))));

    let neighbor = parse(
        r#"{"plmn":1307012,"cell_id":10,"pci":1,"neighbors":[{"plmn":1307012,"cell_id":11,"pci":2000}]}"#,
    );
    assert!(neighbor.to_fact(&[]).is_err());
}

#[test]
fn test_report_eutra_cell_id_too_wide() {
    // 29 bits: fine for NR, too wide for EUTRA.
    let nr = parse(r#"{"plmn":1307012,"cell_id":268435456,"pci":1}"#);
    assert!(nr.to_fact(&[]).is_ok());

    let eutra = parse(r#"{"plmn":1307012,"cell_id":268435456,"rat":"eutra","pci":1}"#);
    assert!(matches!(eutra.to_fact(&[]), Err(PciError::InvalidCgi(_))));
}

#[test]
fn test_report_malformed_pool() {
    let report = parse(r#"{"plmn":1307012,"cell_id":10,"pci":1,"pools":[{"lower":9,"upper":3}]}"#);

    assert!(matches!(
        report.to_fact(&[]),
        Err(PciError::InvalidPool { .. })
    ));
}

#[test]
fn test_report_pool_above_pci_range() {
    let report = parse(
        r#"{"plmn":1307012,"cell_id":10,"pci":1,"pools":[{"lower":1,"upper":4000000000}]}"#,
    );
    assert!(matches!(report.to_fact(&[]), Err(PciError::Serialization(_))));

    let edge = parse(r#"{"plmn":1307012,"cell_id":10,"pci":1,"pools":[{"lower":1000,"upper":1007}]}"#);
    assert_eq!(edge.to_fact(&[]).unwrap().pools, vec![PciPool::new(1000, 1007)]);
}

#[test]
fn test_report_missing_pci_is_rejected() {
    let result: Result<Report, _> = serde_json::from_str(r#"{"plmn":1307012,"cell_id":10}"#);
    assert!(result.is_err());
}

#[test]
fn test_rat_cell_id_bits() {
    assert_eq!(Rat::Nr.cell_id_bits(), 36);
    assert_eq!(Rat::Eutra.cell_id_bits(), 28);
}

// =============================================================================
// RESPONSE TESTS
// =============================================================================

#[test]
fn test_indication_response_success() {
    let response = IndicationResponse::success(CellKey(7));

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"success\":true"));
    assert!(json.contains("\"key\":7"));
    assert!(json.contains("\"error\":null"));
}

#[test]
fn test_indication_response_error() {
    let response = IndicationResponse::error("bad report");

    assert!(!response.success);
    assert!(response.key.is_none());
    assert_eq!(response.error.as_deref(), Some("bad report"));
}

#[test]
fn test_cell_counters_are_flattened() {
    let counters = CellCounters {
        key: CellKey(42),
        counters: ConflictCounters {
            detected: 3,
            resolved: 2,
            acknowledged: 1,
            unacknowledged: 1,
        },
    };

    let value = serde_json::to_value(&counters).unwrap();
    assert_eq!(value["key"], 42);
    assert_eq!(value["detected"], 3);
    assert_eq!(value["unacknowledged"], 1);
    assert!(value.get("counters").is_none());

    let back: CellCounters = serde_json::from_value(value).unwrap();
    assert_eq!(back.counters.resolved, 2);
}
