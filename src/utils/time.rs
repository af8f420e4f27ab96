use std::time::{Duration, Instant};

/// Frame counter of the render context.
///
/// The frame index is what the render target pool measures idleness in;
/// the wall-clock readings are for logging only.
#[derive(Debug, Clone)]
pub struct FrameClock {
    frame: u64,
    started: Instant,
    last_tick: Instant,
    delta: Duration,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// A clock at frame 0.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            frame: 0,
            started: now,
            last_tick: now,
            delta: Duration::ZERO,
        }
    }

    /// Starts the next frame and returns its index.
    pub fn tick(&mut self) -> u64 {
        let now = Instant::now();
        self.delta = now - self.last_tick;
        self.last_tick = now;
        self.frame += 1;
        self.frame
    }

    #[inline]
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Wall time between the last two ticks.
    #[inline]
    #[must_use]
    pub fn delta(&self) -> Duration {
        self.delta
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.last_tick - self.started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_advances_frame_index() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.frame(), 2);
        assert!(clock.elapsed() >= clock.delta());
    }
}
