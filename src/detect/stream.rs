//! Ingestion of raw samples and grouping into per-source ordered streams.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::model::{MetadataValue, MetricPoint};

/// A sample as received on the wire, before its timestamp is parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMetricPoint {
    pub timestamp: String,
    pub value: f64,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, MetadataValue>>,
}

/// Parsed samples plus one error per rejected sample.
#[derive(Debug, Default)]
pub struct Ingested {
    pub points: Vec<MetricPoint>,
    pub errors: Vec<String>,
}

/// Per-source streams, each sorted ascending by timestamp. Keyed in source
/// order so iteration is deterministic.
pub type Streams = BTreeMap<String, Vec<MetricPoint>>;

/// Parse an RFC 3339 timestamp, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Convert raw samples, excluding and recording any with a malformed
/// timestamp or a non-finite value.
pub fn ingest(raw: &[RawMetricPoint]) -> Ingested {
    let mut ingested = Ingested {
        points: Vec::with_capacity(raw.len()),
        errors: Vec::new(),
    };

    for (i, point) in raw.iter().enumerate() {
        let Some(timestamp) = parse_timestamp(&point.timestamp) else {
            ingested.errors.push(format!(
                "data[{}].timestamp: '{}' is not a valid timestamp",
                i, point.timestamp
            ));
            continue;
        };
        if !point.value.is_finite() {
            ingested
                .errors
                .push(format!("data[{}].value: must be a finite number", i));
            continue;
        }
        ingested.points.push(MetricPoint {
            timestamp,
            value: point.value,
            source: point.source.clone(),
            metadata: point.metadata.clone(),
        });
    }

    ingested
}

/// Group samples by source and sort each group by timestamp. The sort is
/// stable, so equal timestamps keep their input order.
pub fn group_by_source(points: Vec<MetricPoint>) -> Streams {
    let mut streams = Streams::new();
    for point in points {
        streams.entry(point.source.clone()).or_default().push(point);
    }
    for stream in streams.values_mut() {
        stream.sort_by_key(|p| p.timestamp);
    }
    streams
}

/// Keep only samples no older than `hours` before `now`.
pub fn retain_recent(points: Vec<MetricPoint>, now: DateTime<Utc>, hours: u32) -> Vec<MetricPoint> {
    let cutoff = now - Duration::hours(i64::from(hours));
    points.into_iter().filter(|p| p.timestamp >= cutoff).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(source: &str, ts: &str, value: f64) -> RawMetricPoint {
        RawMetricPoint {
            timestamp: ts.to_string(),
            value,
            source: source.to_string(),
            metadata: None,
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T12:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T14:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:00:00.000"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_ingest_records_bad_timestamps() {
        let input = vec![
            raw("a", "2024-03-01T12:00:00Z", 1.0),
            raw("a", "not-a-time", 2.0),
            raw("b", "2024-03-01T12:05:00Z", 3.0),
        ];
        let ingested = ingest(&input);
        assert_eq!(ingested.points.len(), 2);
        assert_eq!(ingested.errors.len(), 1);
        assert!(ingested.errors[0].starts_with("data[1].timestamp"));
    }

    #[test]
    fn test_group_sorts_each_source() {
        let t = |m| Utc.with_ymd_and_hms(2024, 3, 1, 12, m, 0).unwrap();
        let points = vec![
            MetricPoint::new("b", t(10), 3.0),
            MetricPoint::new("a", t(5), 2.0),
            MetricPoint::new("a", t(0), 1.0),
            MetricPoint::new("b", t(1), 4.0),
        ];
        let streams = group_by_source(points);
        assert_eq!(streams.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(streams["a"].iter().map(|p| p.value).collect::<Vec<_>>(), vec![1.0, 2.0]);
        assert_eq!(streams["b"].iter().map(|p| p.value).collect::<Vec<_>>(), vec![4.0, 3.0]);
    }

    #[test]
    fn test_retain_recent() {
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let points = vec![
            MetricPoint::new("a", now - Duration::hours(30), 1.0),
            MetricPoint::new("a", now - Duration::hours(24), 2.0),
            MetricPoint::new("a", now - Duration::hours(1), 3.0),
        ];
        let kept = retain_recent(points, now, 24);
        assert_eq!(kept.iter().map(|p| p.value).collect::<Vec<_>>(), vec![2.0, 3.0]);
    }
}
