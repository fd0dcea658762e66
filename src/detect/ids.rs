//! Anomaly identifier generation.
//!
//! Ids are opaque to every stage of the pipeline. The generator is injected
//! into the engine so tests and the CLI can produce reproducible output.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::detect::model::AnomalyKind;

pub trait IdGenerator: Send + Sync {
    fn next_id(&self, kind: AnomalyKind) -> String;
}

/// Monotonic counter: `threshold-000001`, `pattern-000002`, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self, kind: AnomalyKind) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{:06}", kind, n)
    }
}

/// Random v4 UUIDs prefixed with the anomaly kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self, kind: AnomalyKind) -> String {
        format!("{}-{}", kind, Uuid::new_v4())
    }
}
