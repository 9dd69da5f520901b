use std::sync::{Arc, Mutex};

use time::{Duration, OffsetDateTime};

use crate::{Error, Result};

/// Time source for the limiter. Injected so tests can drive refills manually;
/// nothing in the bucket reads the wall clock directly.
pub trait Clock
where
	Self: Send + Sync,
{
	fn now(&self) -> OffsetDateTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

#[derive(Debug)]
struct Bucket {
	tokens: f64,
	refreshed_at: OffsetDateTime,
}

/// Process-wide token bucket. Every outbound retrieval call, regardless of
/// which step or query issued it, takes a token before proceeding. The SEC
/// enforces its limit per process origin, so there is exactly one of these.
pub struct RateLimiter {
	rate_per_second: f64,
	burst: f64,
	bucket: Mutex<Bucket>,
	clock: Arc<dyn Clock>,
}
impl RateLimiter {
	pub fn new(rate_per_second: u32, burst: u32, clock: Arc<dyn Clock>) -> Self {
		let now = clock.now();

		Self {
			rate_per_second: f64::from(rate_per_second),
			burst: f64::from(burst),
			bucket: Mutex::new(Bucket { tokens: f64::from(burst), refreshed_at: now }),
			clock,
		}
	}

	/// Takes a token if one is available right now. Never blocks.
	pub fn try_acquire(&self) -> bool {
		self.take().is_none()
	}

	/// Waits for a token, giving up once the wait would exceed `max_wait`.
	/// The wait counts against the caller's step timeout budget.
	pub async fn acquire(&self, max_wait: Duration) -> Result<()> {
		let mut waited = Duration::ZERO;

		loop {
			let Some(needed) = self.take() else {
				return Ok(());
			};

			if waited + needed > max_wait {
				return Err(Error::Transient {
					message: format!(
						"rate limiter wait of {needed} exceeds remaining budget of {}",
						max_wait - waited,
					),
				});
			}

			waited += needed;

			tokio::time::sleep(std::time::Duration::try_from(needed).unwrap_or_default()).await;
		}
	}

	/// `None` when a token was taken; otherwise the wait until one refills.
	fn take(&self) -> Option<Duration> {
		// A poisoned lock means a panic elsewhere, not bad accounting. Fail
		// open on the stale state rather than refusing every caller.
		let mut bucket = self.bucket.lock().unwrap_or_else(|err| err.into_inner());
		let now = self.clock.now();

		if now < bucket.refreshed_at {
			tracing::warn!("Rate limiter clock moved backwards; allowing call through.");

			bucket.refreshed_at = now;

			return None;
		}

		let elapsed = (now - bucket.refreshed_at).as_seconds_f64();

		bucket.tokens = (bucket.tokens + elapsed * self.rate_per_second).min(self.burst);
		bucket.refreshed_at = now;

		if bucket.tokens >= 1.0 {
			bucket.tokens -= 1.0;

			return None;
		}

		Some(Duration::seconds_f64((1.0 - bucket.tokens) / self.rate_per_second))
	}
}
