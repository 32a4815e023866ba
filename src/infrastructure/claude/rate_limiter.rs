use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Token bucket rate limiter for API request throttling
///
/// Capacity equals the refill rate, so one second worth of requests may
/// burst before callers start waiting.
#[derive(Clone, Debug)]
pub struct TokenBucketRateLimiter {
    state: Arc<Mutex<Bucket>>,
    capacity: f64,
    refill_rate: f64,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketRateLimiter {
    /// Create a limiter allowing `rate_limit_rps` requests per second.
    ///
    /// Non-positive rates are clamped to one request per ten seconds;
    /// configuration validation rejects them before this point.
    pub fn new(rate_limit_rps: f64) -> Self {
        let rate = if rate_limit_rps > 0.0 { rate_limit_rps } else { 0.1 };
        Self {
            state: Arc::new(Mutex::new(Bucket {
                tokens: rate.max(1.0),
                last_refill: Instant::now(),
            })),
            capacity: rate.max(1.0),
            refill_rate: rate,
        }
    }

    /// Wait until a token is available and consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                let tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
                bucket.last_refill = now;

                if tokens >= 1.0 {
                    bucket.tokens = tokens - 1.0;
                    return;
                }
                bucket.tokens = tokens;
                Duration::from_secs_f64(((1.0 - tokens) / self.refill_rate).max(0.01))
            };
            sleep(wait).await;
        }
    }

    /// Tokens available right now, for monitoring.
    pub async fn available_tokens(&self) -> f64 {
        let bucket = self.state.lock().await;
        let elapsed = Instant::now().duration_since(bucket.last_refill).as_secs_f64();
        (bucket.tokens + elapsed * self.refill_rate).min(self.capacity)
    }
}
