//! Run deadline.

use std::time::Duration;

/// Wall-clock limit for one workflow run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunTimeout(Duration);

impl RunTimeout {
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// Creates a RunTimeout from seconds.
    ///
    /// # Example
    ///
    /// ```
    /// use relay_agent::workflow::timeout::RunTimeout;
    /// use std::time::Duration;
    ///
    /// assert_eq!(RunTimeout::from_secs(30).duration(), Duration::from_secs(30));
    /// ```
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl Default for RunTimeout {
    /// Default timeout is 300 seconds.
    fn default() -> Self {
        Self(Duration::from_secs(300))
    }
}

impl From<Duration> for RunTimeout {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_five_minutes() {
        assert_eq!(RunTimeout::default().duration(), Duration::from_secs(300));
        assert_eq!(RunTimeout::from_millis(1500).duration(), Duration::from_millis(1500));
    }
}
