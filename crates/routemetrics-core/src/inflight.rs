//! In-flight request accounting.
//!
//! The decrement lives in `Drop`, so it runs however the wrapped work ends:
//! normal return, `Err`, panic unwind, or the future being dropped while
//! suspended (cancellation).

use std::future::Future;
use std::sync::Arc;

use crate::labels::LabelSnapshot;
use crate::metrics::Gauge;

/// Holds one increment of an in-flight gauge until dropped.
#[must_use = "the gauge is decremented as soon as the guard is dropped"]
pub struct InFlightGuard {
    gauge: Arc<dyn Gauge>,
    labels: LabelSnapshot,
    armed: bool,
}

impl InFlightGuard {
    /// Increment `gauge` under `labels`. The same snapshot is used for the
    /// decrement.
    pub fn enter(gauge: Arc<dyn Gauge>, labels: LabelSnapshot) -> Self {
        // A failed increment must not be followed by a decrement.
        let armed = match gauge.increment(&labels.pairs()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "in-flight increment dropped");
                false
            }
        };
        Self {
            gauge,
            labels,
            armed,
        }
    }

    pub fn labels(&self) -> &LabelSnapshot {
        &self.labels
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.gauge.decrement(&self.labels.pairs()) {
            tracing::debug!(error = %e, "in-flight decrement dropped");
        }
    }
}

/// Run `work` with the gauge incremented for its whole lifetime.
///
/// With no gauge, `work` is awaited directly and `labels` is never called.
pub async fn guard<L, F>(gauge: Option<&Arc<dyn Gauge>>, labels: L, work: F) -> F::Output
where
    L: FnOnce() -> LabelSnapshot,
    F: Future,
{
    let Some(gauge) = gauge else {
        return work.await;
    };
    let _in_flight = InFlightGuard::enter(Arc::clone(gauge), labels());
    work.await
}
