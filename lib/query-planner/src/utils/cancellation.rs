use std::time::{Duration, Instant};

/// Cancellation signal for planning, optionally bounded by a deadline.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken(tokio_util::sync::CancellationToken, Option<Instant>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(tokio_util::sync::CancellationToken::new(), None)
    }

    pub fn with_timeout(duration: Duration) -> Self {
        Self(
            tokio_util::sync::CancellationToken::new(),
            Some(Instant::now() + duration),
        )
    }

    /// Follows a request-scoped token, so cancelling the request stops planning too.
    pub fn from_request(token: &tokio_util::sync::CancellationToken, timeout: Option<Duration>) -> Self {
        Self(token.child_token(), timeout.map(|t| Instant::now() + t))
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    #[inline]
    pub fn bail_if_cancelled(&self) -> Result<(), CancellationError> {
        if let Some(deadline) = self.1 {
            if deadline <= Instant::now() {
                self.cancel();
                return Err(CancellationError::TimedOut);
            }
        }

        if self.0.is_cancelled() {
            return Err(CancellationError::Cancelled);
        }

        Ok(())
    }

    /// Checks the token only every `every` ticks. `every` is rounded up to a power of two.
    #[inline]
    pub fn throttle_check(&self, every: u32) -> CancelTick<'_> {
        CancelTick {
            cancellation_token: self,
            mask: every.max(1).next_power_of_two() - 1,
            ticks: 0,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CancellationError {
    #[error("cancelled")]
    Cancelled,
    #[error("timed out")]
    TimedOut,
}

#[derive(Debug)]
pub struct CancelTick<'a> {
    cancellation_token: &'a CancellationToken,
    mask: u32,
    ticks: u32,
}

impl CancelTick<'_> {
    #[inline(always)]
    pub fn bail_if_cancelled(&mut self) -> Result<(), CancellationError> {
        // x & (n - 1) == x % n for powers of two
        if self.ticks & self.mask == 0 {
            self.cancellation_token.bail_if_cancelled()?;
        }
        self.ticks = self.ticks.wrapping_add(1);

        Ok(())
    }
}
