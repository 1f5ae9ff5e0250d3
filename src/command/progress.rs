use crate::property::{Property, ReactiveProperty};

/// Handle given to progressive execution functions to report progress.
///
/// Progress only moves forward within an execution and never exceeds `1.0`.
#[derive(Clone)]
pub struct ProgressContext {
    progress: Property<f64>,
}

impl ProgressContext {
    pub(crate) fn new(progress: Property<f64>) -> Self {
        Self { progress }
    }

    /// Current progress of the running execution.
    pub fn value(&self) -> f64 {
        self.progress.value().unwrap_or(0.0)
    }

    /// Move progress to `value`, clamped to `[current, 1.0]`.
    ///
    /// Nothing is emitted when the clamped value equals the current one.
    pub fn set(&self, value: f64) {
        let current = self.value();
        // `max` ignores NaN.
        let clamped = value.max(current).min(1.0);
        if clamped != current {
            self.progress.publish(clamped);
        }
    }

    /// Advance progress by `delta`.
    pub fn add(&self, delta: f64) {
        self.set(self.value() + delta);
    }
}
