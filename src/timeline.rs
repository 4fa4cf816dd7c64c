use std::time::{Duration, Instant};

/// Keeps track of the time spent per frame of the controlling loop.
pub struct Timeline {
    start_time: Instant,
    previous_frame_time: Instant,
    previous_frame_duration: Duration,
    longest_frame_duration: Duration,
    frame_count: u64,
}

impl Timeline {
    pub fn new() -> Timeline {
        let now = Instant::now();
        Timeline {
            start_time: now,
            previous_frame_time: now,
            previous_frame_duration: Duration::from_secs(0),
            longest_frame_duration: Duration::from_secs(0),
            frame_count: 0,
        }
    }

    /// Notify the timeline that we've ended the current frame and proceeding to the next.
    pub fn next_frame(&mut self) -> &mut Self {
        let now = Instant::now();
        let duration = now.duration_since(self.previous_frame_time);
        self.previous_frame_time = now;
        self.previous_frame_duration = duration;
        self.longest_frame_duration = self.longest_frame_duration.max(duration);
        self.frame_count += 1;
        self
    }

    /// Returns the duration of the last frame
    pub fn previous_frame_duration(&self) -> Duration {
        self.previous_frame_duration
    }

    /// The longest frame so far, the hitch a user would notice
    pub fn longest_frame_duration(&self) -> Duration {
        self.longest_frame_duration
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn average_frame_duration(&self) -> Duration {
        if self.frame_count == 0 {
            return Duration::from_secs(0);
        }
        self.elapsed() / self.frame_count as u32
    }

    /// Time since the timeline was created
    pub fn elapsed(&self) -> Duration {
        self.previous_frame_time.duration_since(self.start_time)
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Timeline::new()
    }
}
