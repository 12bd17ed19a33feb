use std::time::Duration;

use reqwest::StatusCode;

use crate::HttpClientOptions;

/// Outcome of judging one response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryDecision {
    pub retry: bool,
    pub wait: Duration,
}

/// Fixed-interval retry on server errors, bounded by a total attempt count.
///
/// `execution_count` is 1-based and counts the attempt whose response is
/// being judged. A request is reissued only while `execution_count` is below
/// `max_tries`, so `max_tries` is the total number of attempts a delivery may
/// make. A `max_tries` of zero behaves like one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryStrategy {
    max_tries: u32,
    interval: Duration,
}

impl RetryStrategy {
    pub fn new(max_tries: u32, interval: Duration) -> Self {
        Self {
            max_tries,
            interval,
        }
    }

    pub fn from_options(options: &HttpClientOptions) -> Self {
        Self::new(options.max_tries, options.retry_interval())
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    /// Wait before reissuing. Constant for every attempt and status.
    pub fn retry_interval(&self) -> Duration {
        self.interval
    }

    pub fn should_retry(&self, execution_count: u32, status: StatusCode) -> bool {
        if execution_count >= self.max_tries {
            return false;
        }
        status.as_u16() >= 500
    }

    pub fn decide(&self, execution_count: u32, status: StatusCode) -> RetryDecision {
        RetryDecision {
            retry: self.should_retry(execution_count, status),
            wait: self.interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::StatusCode;

    use super::RetryStrategy;
    use crate::HttpClientOptions;

    fn strategy(max_tries: u32) -> RetryStrategy {
        RetryStrategy::new(max_tries, Duration::from_millis(1_000))
    }

    #[test]
    fn consecutive_503s_retry_until_the_attempt_ceiling() {
        let n = 3;
        let strategy = strategy(n);
        let decisions: Vec<bool> = (1..=n + 1)
            .map(|count| strategy.should_retry(count, StatusCode::SERVICE_UNAVAILABLE))
            .collect();

        assert_eq!(decisions, vec![true, true, false, false]);
        assert_eq!(decisions.iter().filter(|retry| **retry).count(), (n - 1) as usize);
    }

    #[test]
    fn boundary_at_and_past_max_tries_never_retries() {
        let strategy = strategy(5);
        assert!(strategy.should_retry(4, StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!strategy.should_retry(5, StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!strategy.should_retry(6, StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!strategy.should_retry(u32::MAX, StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn statuses_below_500_never_retry() {
        let strategy = strategy(10);
        for code in [200u16, 201, 204, 301, 400, 404, 409, 429, 499] {
            let status = StatusCode::from_u16(code).expect("valid status");
            for count in 1..10 {
                assert!(
                    !strategy.should_retry(count, status),
                    "status {code} at attempt {count} must not retry"
                );
            }
        }
    }

    #[test]
    fn every_status_from_500_retries_below_ceiling() {
        let strategy = strategy(2);
        for code in [500u16, 501, 502, 503, 504, 599, 999] {
            let status = StatusCode::from_u16(code).expect("valid status");
            assert!(strategy.should_retry(1, status), "status {code} must retry");
        }
    }

    #[test]
    fn zero_or_one_max_tries_means_a_single_attempt() {
        assert!(!strategy(0).should_retry(1, StatusCode::SERVICE_UNAVAILABLE));
        assert!(!strategy(1).should_retry(1, StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn wait_is_constant() {
        let strategy = strategy(4);
        for count in 1..8 {
            for status in [StatusCode::OK, StatusCode::SERVICE_UNAVAILABLE] {
                let decision = strategy.decide(count, status);
                assert_eq!(decision.wait, Duration::from_millis(1_000));
            }
        }
        assert_eq!(strategy.retry_interval(), Duration::from_millis(1_000));
    }

    #[test]
    fn built_from_options() {
        let options = HttpClientOptions {
            max_tries: 3,
            retry_interval_ms: 250,
            ..HttpClientOptions::default()
        };
        let strategy = RetryStrategy::from_options(&options);
        assert_eq!(strategy.max_tries(), 3);
        assert_eq!(strategy.retry_interval(), Duration::from_millis(250));
    }
}
