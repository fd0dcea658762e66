use std::collections::HashSet;

use super::model::{Anomaly, AnomalyKind};

/// Width of a dedup bucket in seconds.
pub const DEDUP_BUCKET_SECS: i64 = 5 * 60;

/// Key collapsing near-duplicate detections: same source, same anomaly type,
/// same five-minute period.
pub fn dedup_key(anomaly: &Anomaly) -> (&str, AnomalyKind, i64) {
    (
        anomaly.source.as_str(),
        anomaly.kind(),
        anomaly.timestamp.timestamp().div_euclid(DEDUP_BUCKET_SECS),
    )
}

/// Concatenate threshold and pattern output and keep the first anomaly seen
/// for each dedup key, preserving emission order.
pub fn fuse(threshold: Vec<Anomaly>, pattern: Vec<Anomaly>) -> Vec<Anomaly> {
    let mut seen = HashSet::new();
    let mut fused = Vec::with_capacity(threshold.len() + pattern.len());

    for anomaly in threshold.into_iter().chain(pattern) {
        let (source, kind, bucket) = dedup_key(&anomaly);
        if seen.insert((source.to_string(), kind, bucket)) {
            fused.push(anomaly);
        }
    }
    fused
}
