// tests/ldb_parse.rs
use sldb_relay::feed::soap::parse_board;
use sldb_relay::feed::FetchError;
use sldb_relay::transform::normalize;

const BOARD_XML: &str = include_str!("fixtures/ldb_board.xml");
const FAULT_XML: &str = include_str!("fixtures/ldb_fault.xml");

#[test]
fn parses_services_ignoring_namespace_prefixes() {
    let board = parse_board(BOARD_XML).unwrap();
    assert_eq!(board.location_name.as_deref(), Some("Manchester Victoria"));
    assert_eq!(board.services.len(), 3);

    let first = &board.services[0];
    assert_eq!(first.train_id.as_deref(), Some("2E10"));
    assert_eq!(first.uid.as_deref(), Some("P12345"));
    assert_eq!(first.operator_code.as_deref(), Some("NT"));
    assert_eq!(first.length.as_deref(), Some("4"));
    assert!(!first.platform_is_hidden);

    // only the first destination location is kept
    let dest = first.destination.as_ref().unwrap();
    assert_eq!(dest.tiploc.as_deref(), Some("BLKBURN"));
    assert_eq!(dest.location_name.as_deref(), Some("Blackburn"));

    assert!(board.services[1].platform_is_hidden);
    assert_eq!(board.services[2].operator.as_deref(), Some("Freightliner & Co"));
}

#[test]
fn fixture_board_normalizes_end_to_end() {
    let records = normalize(&parse_board(BOARD_XML).unwrap());
    let headcodes: Vec<&str> = records.iter().map(|r| r.headcode.as_str()).collect();
    assert_eq!(headcodes, vec!["2E10", "1B23", "5Z99"]);

    let r = &records[0];
    assert_eq!(r.platform, "3");
    assert_eq!(r.wta, "10:15:00");
    assert_eq!(r.eta, "10:17:00");
    assert_eq!(r.wtd, "10:18:00");
    assert_eq!(r.etd, "10:19:00");
    assert_eq!(r.consist, "Service consists of 4 vehicles");
    assert_eq!(
        r.destination,
        r#"<span style="cursor: pointer;" title="Blackburn">BLKBURN</span>"#
    );

    // hidden platform, zero-length consist, no arrival times
    let r = &records[1];
    assert_eq!(r.platform, "TBC");
    assert_eq!(r.consist, "");
    assert_eq!(r.wta, "");
    assert_eq!(r.eta, "");

    // empty platform element
    let r = &records[2];
    assert_eq!(r.platform, "TBC");
    assert_eq!(r.wtd, "");
    assert_eq!(
        r.toc,
        r#"<span style="cursor: pointer" title="Freightliner &amp; Co">FL</span>"#
    );
}

#[test]
fn soap_fault_is_reported() {
    match parse_board(FAULT_XML) {
        Err(FetchError::Fault { code, message }) => {
            assert_eq!(code, "soap:Client");
            assert!(message.starts_with("Unauthorized"));
        }
        other => panic!("expected fault, got {other:?}"),
    }
}

#[test]
fn truncated_xml_is_malformed() {
    let cut = &BOARD_XML[..BOARD_XML.len() / 2];
    assert!(parse_board(cut).is_err());
}
