use std::time::Instant;

const FPS_UPDATE_INTERVAL: f32 = 1.0;

/// Frame pacing clock: per-frame delta plus a once-per-interval FPS figure
#[derive(Debug)]
pub struct FrameClock {
    last_tick: Instant,
    frames: u64,
    window_frames: u32,
    window_time: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last_tick: Instant::now(),
            frames: 0,
            window_frames: 0,
            window_time: 0.0,
        }
    }

    /// Count a finished frame. Returns the average FPS whenever a full interval has elapsed
    pub fn tick(&mut self) -> Option<f32> {
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        self.record(delta)
    }

    fn record(&mut self, delta: f32) -> Option<f32> {
        self.frames += 1;
        self.window_frames += 1;
        self.window_time += delta;

        if self.window_time < FPS_UPDATE_INTERVAL {
            return None;
        }
        let fps = self.window_frames as f32 / self.window_time;
        self.window_frames = 0;
        self.window_time = 0.0;
        Some(fps)
    }

    /// Frames counted since construction
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_reports_once_per_interval() {
        let mut clock = FrameClock::new();
        for _ in 0..59 {
            assert_eq!(clock.record(1.0 / 60.0), None);
        }
        let fps = clock.record(1.0 / 60.0 + 1e-4).unwrap();
        assert!((fps - 60.0).abs() < 0.1);
        assert_eq!(clock.record(1.0 / 60.0), None);
    }

    #[test]
    fn clock_counts_frames() {
        let mut clock = FrameClock::new();
        clock.tick();
        clock.tick();
        assert_eq!(clock.frames(), 2);
    }
}
