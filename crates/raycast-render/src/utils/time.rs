use std::time::{
    Duration,
    Instant,
};

const NANOS_PER_SEC: u32 = 1_000_000_000;

pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn get_elapsed_and_reset(&mut self) -> Duration {
        let elapsed = self.start.elapsed();
        self.start = Instant::now();
        elapsed
    }
}

pub fn get_fps(elapsed: &Duration) -> f32 {
    let elapsed = elapsed.as_nanos();
    if elapsed == 0 {
        return 0.0;
    }
    NANOS_PER_SEC as f32 / elapsed as f32
}

/// Advances through volume frames at a fixed rate while playing.
#[derive(Debug, Clone)]
pub struct Playback {
    frame: u32,
    frame_count: u32,
    playing: bool,
    frames_per_second: f32,
    accumulated: Duration,
}

impl Playback {
    pub fn new(frame_count: u32) -> Self {
        Self {
            frame: 0,
            frame_count: frame_count.max(1),
            playing: false,
            frames_per_second: 10.0,
            accumulated: Duration::ZERO,
        }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn set_frame_count(&mut self, frame_count: u32) {
        self.frame_count = frame_count.max(1);
        self.frame = self.frame.min(self.frame_count - 1);
    }

    pub fn set_frame(&mut self, frame: u32) {
        self.frame = frame.min(self.frame_count - 1);
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn toggle(&mut self) {
        self.playing = !self.playing;
        self.accumulated = Duration::ZERO;
    }

    pub fn step_forward(&mut self) {
        self.frame = (self.frame + 1) % self.frame_count;
    }

    pub fn step_backward(&mut self) {
        self.frame = (self.frame + self.frame_count - 1) % self.frame_count;
    }

    pub fn frames_per_second(&self) -> f32 {
        self.frames_per_second
    }

    pub fn set_frames_per_second(&mut self, frames_per_second: f32) {
        self.frames_per_second = frames_per_second.max(0.1);
    }

    pub fn advance(&mut self, elapsed: Duration) {
        if !self.playing || self.frame_count < 2 {
            return;
        }
        self.accumulated += elapsed;
        let period = Duration::from_secs_f32(1.0 / self.frames_per_second);
        while self.accumulated >= period {
            self.accumulated -= period;
            self.step_forward();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps() {
        assert_eq!(get_fps(&Duration::from_secs(1)), 1.0);
        assert_eq!(get_fps(&Duration::from_millis(250)), 4.0);
        assert_eq!(get_fps(&Duration::ZERO), 0.0);
    }

    #[test]
    fn test_playback_steps_wrap() {
        let mut playback = Playback::new(3);
        playback.step_backward();
        assert_eq!(playback.frame(), 2);
        playback.step_forward();
        assert_eq!(playback.frame(), 0);
        playback.set_frame(10);
        assert_eq!(playback.frame(), 2);
    }

    #[test]
    fn test_playback_advances_only_while_playing() {
        let mut playback = Playback::new(4);
        playback.advance(Duration::from_secs(1));
        assert_eq!(playback.frame(), 0);

        playback.toggle();
        playback.set_frames_per_second(4.0);
        playback.advance(Duration::from_millis(600));
        assert_eq!(playback.frame(), 2);
        playback.advance(Duration::from_millis(600));
        assert_eq!(playback.frame(), 0);
    }

    #[test]
    fn test_single_frame_never_moves() {
        let mut playback = Playback::new(0);
        assert_eq!(playback.frame_count(), 1);
        playback.toggle();
        playback.advance(Duration::from_secs(5));
        playback.step_forward();
        assert_eq!(playback.frame(), 0);
    }
}
