use std::time::Duration;

use tokio::time::Instant;

/// Inactivity deadline for one exchange.
///
/// Armed when the request goes out and pushed back on every received chunk.
/// A disarmed watchdog never fires.
#[derive(Debug)]
pub struct Watchdog {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Starts a fresh window, replacing any pending deadline.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.timeout);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves when the current window runs out.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_timeout() {
        let mut watchdog = Watchdog::new(Duration::from_secs(30));
        watchdog.arm();
        let started = Instant::now();
        watchdog.expired().await;
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_pushes_deadline_back() {
        let mut watchdog = Watchdog::new(Duration::from_secs(30));
        let started = Instant::now();
        watchdog.arm();
        tokio::time::sleep(Duration::from_secs(20)).await;
        watchdog.arm();
        watchdog.expired().await;
        assert_eq!(started.elapsed(), Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_never_fires() {
        let mut watchdog = Watchdog::new(Duration::from_secs(1));
        watchdog.arm();
        watchdog.disarm();
        assert!(!watchdog.is_armed());
        let fired = tokio::time::timeout(Duration::from_secs(60), watchdog.expired()).await;
        assert!(fired.is_err());
    }
}
