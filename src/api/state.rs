use std::sync::Arc;
use std::time::Duration;

use crate::detect::DetectionEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DetectionEngine>,
    /// Deadline for one detection request.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(engine: DetectionEngine, request_timeout: Duration) -> Self {
        Self {
            engine: Arc::new(engine),
            request_timeout,
        }
    }
}
