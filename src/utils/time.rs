use std::time::{Duration, Instant};

/// CPU time spent recording frames.
///
/// Wrap each `render_frame` call in [`begin`](Self::begin) /
/// [`end`](Self::end); the timer keeps the shortest, longest and mean
/// recording time.
#[derive(Debug, Clone, Default)]
pub struct FrameTimer {
    started: Option<Instant>,
    frames: u32,
    total: Duration,
    shortest: Option<Duration>,
    longest: Duration,
}

impl FrameTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Closes the span opened by [`begin`](Self::begin) and returns its
    /// length. Without an open span nothing is recorded.
    pub fn end(&mut self) -> Option<Duration> {
        let span = self.started.take()?.elapsed();
        self.frames += 1;
        self.total += span;
        self.shortest = Some(self.shortest.map_or(span, |s| s.min(span)));
        self.longest = self.longest.max(span);
        Some(span)
    }

    #[must_use]
    pub fn frames(&self) -> u32 {
        self.frames
    }

    #[must_use]
    pub fn mean(&self) -> Duration {
        if self.frames == 0 { Duration::ZERO } else { self.total / self.frames }
    }

    #[must_use]
    pub fn shortest(&self) -> Duration {
        self.shortest.unwrap_or_default()
    }

    #[must_use]
    pub fn longest(&self) -> Duration {
        self.longest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_without_begin_records_nothing() {
        let mut timer = FrameTimer::new();
        assert!(timer.end().is_none());
        assert_eq!(timer.frames(), 0);
        assert_eq!(timer.mean(), Duration::ZERO);

        timer.begin();
        let span = timer.end().expect("open span");
        assert_eq!(timer.frames(), 1);
        assert_eq!(timer.shortest(), span);
        assert_eq!(timer.longest(), span);
    }
}
