//! Checks shared by the classifier and the trajectory generator.

use tokio::sync::watch;

use reframe_models::SegmentRequest;

use crate::error::{EngineError, EngineResult};

/// Whether the optional cancel flag has been raised.
pub(crate) fn is_cancelled(cancel: Option<&watch::Receiver<bool>>) -> bool {
    cancel.is_some_and(|rx| *rx.borrow())
}

/// Fail with `Cancelled` when the flag is raised.
pub(crate) fn check_cancelled(cancel: Option<&watch::Receiver<bool>>) -> EngineResult<()> {
    if is_cancelled(cancel) {
        Err(EngineError::Cancelled)
    } else {
        Ok(())
    }
}

/// Reject non-finite, negative or empty time ranges.
pub(crate) fn check_segment(start: f64, end: f64) -> EngineResult<()> {
    if SegmentRequest::new(start, end).is_valid() {
        Ok(())
    } else {
        Err(EngineError::invalid_segment(format!(
            "[{}, {}] is not a valid time range",
            start, end
        )))
    }
}
