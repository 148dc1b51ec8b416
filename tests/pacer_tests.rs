// Pacing policy tests

use csv_playback::{EmissionUnit, Pacer, PacingPolicy, Record, TimestampParser};
use std::time::Duration;

fn single(ts: &str) -> EmissionUnit {
    let columns = vec!["ts".to_string(), "value".to_string()];
    EmissionUnit::Single(Record::from_row(&columns, [ts, "0"]))
}

fn replay(format: &str) -> Pacer {
    Pacer::new(PacingPolicy::TimestampReplay {
        column: "ts".to_string(),
        parser: TimestampParser::new(format),
    })
}

#[test]
fn test_fixed_rate_delay_is_constant() {
    let mut pacer = Pacer::new(PacingPolicy::FixedRate {
        period: Duration::from_millis(20),
    });
    for _ in 0..3 {
        assert_eq!(pacer.next_delay(&single("x")).unwrap(), Duration::from_millis(20));
    }
    assert_eq!(pacer.unit_size(), 1);
}

#[test]
fn test_burst_delay_is_interval() {
    let mut pacer = Pacer::new(PacingPolicy::Burst {
        interval: Duration::from_millis(1000),
        size: 5,
    });
    let unit = EmissionUnit::Burst(vec![Record::default(); 5]);
    assert_eq!(pacer.next_delay(&unit).unwrap(), Duration::from_secs(1));
    assert_eq!(pacer.unit_size(), 5);
}

#[test]
fn test_time_only_replay() {
    let mut pacer = replay("%H:%M:%S");
    let delays: Vec<Duration> = ["10:00:00", "10:00:30", "10:01:00"]
        .iter()
        .map(|ts| pacer.next_delay(&single(ts)).unwrap())
        .collect();

    assert_eq!(
        delays,
        vec![Duration::ZERO, Duration::from_secs(30), Duration::from_secs(30)]
    );
}

#[test]
fn test_backwards_timestamp_gives_zero_delay() {
    let mut pacer = replay("%Y-%m-%d %H:%M:%S");
    pacer.next_delay(&single("2024-05-01 12:00:10")).unwrap();
    assert_eq!(
        pacer.next_delay(&single("2024-05-01 12:00:05")).unwrap(),
        Duration::ZERO
    );
    // The earlier timestamp becomes the new reference
    assert_eq!(
        pacer.next_delay(&single("2024-05-01 12:00:07")).unwrap(),
        Duration::from_secs(2)
    );
}

#[test]
fn test_unparsable_timestamp_is_transient() {
    let mut pacer = replay("%Y-%m-%d %H:%M:%S");
    let err = pacer.next_delay(&single("yesterday")).unwrap_err();
    assert!(err.is_transient());
    assert!(err.to_string().contains("yesterday"));
}

#[test]
fn test_missing_timestamp_column_is_transient() {
    let mut pacer = replay("auto");
    let columns = vec!["value".to_string()];
    let unit = EmissionUnit::Single(Record::from_row(&columns, ["1"]));
    let err = pacer.next_delay(&unit).unwrap_err();
    assert!(err.is_transient());
}

#[test]
fn test_auto_detects_layouts() {
    let parser = TimestampParser::new("auto");
    let rfc = parser.parse("2024-05-01T12:00:00Z").unwrap();
    let epoch = parser.parse("1714564800").unwrap();
    assert_eq!(rfc, epoch);

    let fractional = parser.parse("1714564800.5").unwrap();
    assert_eq!((fractional - epoch).num_milliseconds(), 500);
}

#[test]
fn test_compact_time_keeps_leading_zero() {
    let mut pacer = replay("%H%M%S");
    let delays: Vec<Duration> = ["095958", "095959", "100000"]
        .iter()
        .map(|ts| pacer.next_delay(&single(ts)).unwrap())
        .collect();

    assert_eq!(
        delays,
        vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(1)]
    );
}

#[test]
fn test_timestamp_error_reports_cell_text() {
    let mut pacer = replay("%Y-%m-%d");
    let err = pacer.next_delay(&single("0420")).unwrap_err();
    assert!(err.to_string().contains("'0420'"));
}

#[test]
fn test_none_format_means_auto() {
    assert_eq!(TimestampParser::new("None"), TimestampParser::Auto);
    assert_eq!(TimestampParser::new("AUTO"), TimestampParser::Auto);
}
