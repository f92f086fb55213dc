// tests/transform_normalize.rs
mod common;

use common::{board, service};
use sldb_relay::feed::{RawFeedResult, RawService};
use sldb_relay::transform::{normalize, normalize_service};

#[test]
fn one_record_per_service_in_order() {
    let raw = board(&["2E10", "1B23", "5Z99", "1A00"]);
    let out = normalize(&raw);
    let headcodes: Vec<&str> = out.iter().map(|r| r.headcode.as_str()).collect();
    assert_eq!(headcodes, vec!["2E10", "1B23", "5Z99", "1A00"]);
    assert_eq!(out[1].uid, "U1B23");

    assert!(normalize(&RawFeedResult::default()).is_empty());
}

#[test]
fn empty_visible_platform_becomes_tbc() {
    let svc = RawService {
        platform: Some(String::new()),
        platform_is_hidden: false,
        ..service("2E10")
    };
    assert_eq!(normalize_service(&svc).platform, "TBC");
}

#[test]
fn full_service_maps_every_field() {
    let r = normalize_service(&service("2E10"));
    assert_eq!(r.headcode, "2E10");
    assert_eq!(r.uid, "U2E10");
    assert_eq!(
        r.toc,
        r#"<span style="cursor: pointer" title="Northern">NT</span>"#
    );
    assert_eq!(
        r.origin,
        r#"<span style="cursor: pointer;" title="Leeds">LEEDS</span>"#
    );
    assert_eq!(r.platform, "3");
    assert_eq!(r.wta, "10:15:00");
    assert_eq!(r.eta, "10:17:30");
    assert_eq!(r.wtd, "10:18:00");
    assert_eq!(r.etd, "10:19:00");
    assert_eq!(r.consist, "Service consists of 4 vehicles");
    assert_eq!(r.last_reported, "");
    assert_eq!(r.disruption, "");
    assert_eq!(r.cis_comments, "");
}

#[test]
fn bare_service_degrades_to_placeholders() {
    let r = normalize_service(&RawService::default());
    assert_eq!(r.headcode, "");
    assert_eq!(r.toc, "");
    assert_eq!(r.origin, "");
    assert_eq!(r.destination, "");
    assert_eq!(r.platform, "TBC");
    assert_eq!(r.wta, "");
    assert_eq!(r.consist, "");
}

#[test]
fn wire_keys_match_consumer_contract() {
    let r = normalize_service(&service("2E10"));
    let v = serde_json::to_value(&r).unwrap();
    let mut keys: Vec<&str> = v.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec![
            "cis_comments",
            "consist",
            "destination",
            "distruption",
            "eta",
            "etd",
            "headcode",
            "last_reported",
            "origin",
            "platform",
            "toc",
            "uid",
            "wta",
            "wtd"
        ]
    );
}
