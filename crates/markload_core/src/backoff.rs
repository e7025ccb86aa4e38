use std::time::Duration;

/// Linear backoff between failed status requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub increment: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(3000),
            increment: Duration::from_millis(2000),
            max: Duration::from_millis(15000),
        }
    }
}

impl BackoffPolicy {
    pub fn start(self) -> Backoff {
        Backoff {
            policy: self,
            current: self.initial.min(self.max),
        }
    }
}

/// Running backoff state for one poller.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    /// A status request failed: returns the wait before the next attempt and
    /// grows the interval for the failure after that.
    pub fn on_failure(&mut self) -> Duration {
        let wait = self.current;
        self.current = (self.current + self.policy.increment).min(self.policy.max);
        wait
    }

    /// A status request succeeded: growth resets and the wait is the initial interval.
    pub fn on_success(&mut self) -> Duration {
        self.current = self.policy.initial.min(self.policy.max);
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn failures_grow_linearly() {
        let mut backoff = BackoffPolicy::default().start();
        assert_eq!(backoff.on_failure(), ms(3000));
        assert_eq!(backoff.on_failure(), ms(5000));
        assert_eq!(backoff.on_failure(), ms(7000));
    }

    #[test]
    fn growth_is_capped() {
        let mut backoff = BackoffPolicy::default().start();
        let waits: Vec<_> = (0..10).map(|_| backoff.on_failure()).collect();
        assert!(waits.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(waits.iter().all(|wait| *wait <= ms(15000)));
        assert_eq!(waits.last().copied(), Some(ms(15000)));
    }

    #[test]
    fn success_resets_growth() {
        let mut backoff = BackoffPolicy::default().start();
        backoff.on_failure();
        backoff.on_failure();
        assert_eq!(backoff.on_success(), ms(3000));
        assert_eq!(backoff.on_failure(), ms(3000));
    }

    #[test]
    fn initial_above_max_is_clamped() {
        let policy = BackoffPolicy {
            initial: ms(20),
            increment: ms(5),
            max: ms(10),
        };
        let mut backoff = policy.start();
        assert_eq!(backoff.on_failure(), ms(10));
        assert_eq!(backoff.on_success(), ms(10));
    }
}
