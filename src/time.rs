//! Frame timing

use std::time::Instant;

/// Delta/total time and a once-per-second FPS estimate.
#[derive(Debug)]
pub struct Time {
    last_tick: Option<Instant>,
    delta: f32,
    total: f64,
    frame_count: u64,
    fps: f32,
    fps_accumulator: f32,
    fps_frames: u32,
}

impl Default for Time {
    fn default() -> Self {
        Self {
            last_tick: None,
            delta: 0.0,
            total: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_accumulator: 0.0,
            fps_frames: 0,
        }
    }
}

impl Time {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by the wall-clock time since the previous call. The first call yields zero.
    pub fn update(&mut self) -> f32 {
        let now = Instant::now();
        let dt = self
            .last_tick
            .map(|last| now.duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_tick = Some(now);
        self.advance(dt)
    }

    /// Forget the previous tick so the next [`Time::update`] yields zero
    pub fn pause(&mut self) {
        self.last_tick = None;
    }

    /// Advance by an explicit step
    pub fn advance(&mut self, dt: f32) -> f32 {
        let dt = dt.max(0.0);
        self.delta = dt;
        self.total += dt as f64;
        self.frame_count += 1;

        self.fps_accumulator += dt;
        self.fps_frames += 1;
        if self.fps_accumulator >= 1.0 {
            self.fps = self.fps_frames as f32 / self.fps_accumulator;
            self.fps_accumulator = 0.0;
            self.fps_frames = 0;
        }
        dt
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second over the last full second, zero until one has elapsed
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_accumulates() {
        let mut time = Time::new();
        time.advance(0.25);
        time.advance(0.5);
        assert_eq!(time.delta(), 0.5);
        assert!((time.total() - 0.75).abs() < 1e-9);
        assert_eq!(time.frame_count(), 2);
    }

    #[test]
    fn fps_updates_once_per_second() {
        let mut time = Time::new();
        for _ in 0..3 {
            time.advance(0.25);
        }
        assert_eq!(time.fps(), 0.0);

        time.advance(0.25);
        assert_eq!(time.fps(), 4.0);
    }

    #[test]
    fn negative_steps_are_clamped() {
        let mut time = Time::new();
        assert_eq!(time.advance(-1.0), 0.0);
    }

    #[test]
    fn first_update_is_zero() {
        let mut time = Time::new();
        assert_eq!(time.update(), 0.0);
    }

    #[test]
    fn update_after_pause_ignores_the_gap() {
        let mut time = Time::new();
        time.update();
        std::thread::sleep(std::time::Duration::from_millis(20));
        time.pause();
        assert_eq!(time.update(), 0.0);
        assert_eq!(time.frame_count(), 2);
    }
}
