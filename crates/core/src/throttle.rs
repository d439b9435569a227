use std::time::Duration;
use tokio::time::Instant;

/// Admits at most one video frame per `interval`, measured from the last
/// frame that was actually sent.
#[derive(Debug, Clone)]
pub struct VideoThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl VideoThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a frame arriving at `now` may be sent.
    pub fn ready(&self, now: Instant) -> bool {
        self.last_sent
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Records a frame that was handed to the connection.
    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn frames_at_ten_times_the_rate_are_thinned() {
        let interval = Duration::from_millis(1000);
        let mut throttle = VideoThrottle::new(interval);
        let total = Duration::from_secs(5);
        let step = interval / 10;

        let started = Instant::now();
        let mut sent = 0;
        while started.elapsed() < total {
            let now = Instant::now();
            if throttle.ready(now) {
                throttle.mark_sent(now);
                sent += 1;
            }
            tokio::time::advance(step).await;
        }
        assert_eq!(sent, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn single_frame_after_interval_is_accepted() {
        let mut throttle = VideoThrottle::new(Duration::from_millis(500));
        let now = Instant::now();
        assert!(throttle.ready(now));
        throttle.mark_sent(now);
        assert!(!throttle.ready(Instant::now()));

        tokio::time::advance(Duration::from_millis(499)).await;
        assert!(!throttle.ready(Instant::now()));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(throttle.ready(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_frames_do_not_push_the_window() {
        let mut throttle = VideoThrottle::new(Duration::from_millis(300));
        throttle.mark_sent(Instant::now());
        for _ in 0..2 {
            tokio::time::advance(Duration::from_millis(100)).await;
            assert!(!throttle.ready(Instant::now()));
        }
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(throttle.ready(Instant::now()));
    }

    #[test]
    fn reset_admits_the_next_frame() {
        let mut throttle = VideoThrottle::new(Duration::from_secs(60));
        throttle.mark_sent(Instant::now());
        throttle.reset();
        assert!(throttle.ready(Instant::now()));
    }
}
