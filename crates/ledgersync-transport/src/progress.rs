//! Progress reporting

/// Receives fractional progress in `[0, 1]`.
///
/// Callbacks fire on whatever context runs the transfer. Forwarding them to a
/// UI thread is the receiver's job.
pub trait ProgressObserver: Send + Sync {
    /// Report progress as a fraction in `[0, 1]`
    fn progress(&self, fraction: f32);
}

impl<F> ProgressObserver for F
where
    F: Fn(f32) + Send + Sync,
{
    fn progress(&self, fraction: f32) {
        self(fraction);
    }
}

/// Observer that discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn progress(&self, _fraction: f32) {}
}

/// Maps a sub-stage's `[0, 1]` onto `[start, start + span]` of an outer observer
pub struct ScaledProgress<'a> {
    inner: &'a dyn ProgressObserver,
    start: f32,
    span: f32,
}

impl<'a> ScaledProgress<'a> {
    /// Wrap `inner` so that this stage covers `[start, start + span]`
    #[must_use]
    pub fn new(inner: &'a dyn ProgressObserver, start: f32, span: f32) -> Self {
        Self { inner, start, span }
    }
}

impl ProgressObserver for ScaledProgress<'_> {
    fn progress(&self, fraction: f32) {
        let scaled = self.start + self.span * clamp_fraction(fraction);
        self.inner.progress(clamp_fraction(scaled));
    }
}

/// Clamp to `[0, 1]`, mapping NaN to 0
#[must_use]
pub fn clamp_fraction(fraction: f32) -> f32 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

/// Fraction of `total` covered by `done`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fraction_of(done: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    clamp_fraction(done as f32 / total as f32)
}
