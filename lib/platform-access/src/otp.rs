//! One-time code policy.

use crate::identity::OneTimeCode;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use rand::Rng;

/// Digits in every code.
pub const CODE_LENGTH: usize = 6;

/// Lifetime and cooldown rules for one-time codes.
///
/// A new code may be issued once the previous one has expired or is older
/// than `lifetime - 1 minute`, so at most one code per lifetime window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpPolicy {
    lifetime: Duration,
}

impl OtpPolicy {
    /// Creates a policy; lifetimes under two minutes are raised to two.
    #[must_use]
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime: lifetime.max(Duration::minutes(2)),
        }
    }

    /// How long a code is accepted.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Minimum age of a still-valid code before another may be issued.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.lifetime - Duration::minutes(1)
    }

    /// Returns how long the caller must wait before `previous` may be
    /// replaced, or `None` if a new code may be issued now.
    #[must_use]
    pub fn retry_after(
        &self,
        previous: Option<&OneTimeCode>,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let previous = previous?;
        if previous.is_expired(now) {
            return None;
        }
        let ready_at = previous.issued_at + self.cooldown();
        (now < ready_at).then(|| ready_at - now)
    }

    /// Generates a fresh code issued at `now`.
    ///
    /// The timestamp is truncated to microseconds so it survives a
    /// round-trip through the database unchanged.
    #[must_use]
    pub fn issue(&self, now: DateTime<Utc>) -> OneTimeCode {
        let now = now.trunc_subsecs(6);
        let mut rng = rand::thread_rng();
        let code = (0..CODE_LENGTH)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        OneTimeCode {
            code,
            issued_at: now,
            expires_at: now + self.lifetime,
        }
    }
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self::new(Duration::minutes(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
    }

    #[test]
    fn issued_code_is_numeric_and_bounded() {
        let now = t0();
        let code = OtpPolicy::default().issue(now);
        assert_eq!(code.code.len(), CODE_LENGTH);
        assert!(code.code.bytes().all(|b| b.is_ascii_digit()));
        assert_eq!(code.expires_at - code.issued_at, Duration::minutes(10));
    }

    #[test]
    fn no_previous_code_allows_issue() {
        assert_eq!(OtpPolicy::default().retry_after(None, t0()), None);
    }

    #[test]
    fn fresh_code_blocks_reissue() {
        let policy = OtpPolicy::default();
        let now = t0();
        let previous = policy.issue(now);

        let wait = policy
            .retry_after(Some(&previous), now + Duration::minutes(1))
            .expect("still cooling down");
        assert_eq!(wait, Duration::minutes(8));
    }

    #[test]
    fn code_older_than_cooldown_may_be_replaced() {
        let policy = OtpPolicy::default();
        let now = t0();
        let previous = policy.issue(now);

        assert_eq!(
            policy.retry_after(Some(&previous), now + Duration::minutes(9)),
            None
        );
    }

    #[test]
    fn expired_code_may_be_replaced() {
        let policy = OtpPolicy::new(Duration::minutes(5));
        let now = t0();
        let previous = policy.issue(now);
        assert_eq!(
            policy.retry_after(Some(&previous), now + Duration::minutes(6)),
            None
        );
    }

    #[test]
    fn tiny_lifetimes_are_clamped() {
        let policy = OtpPolicy::new(Duration::seconds(30));
        assert_eq!(policy.lifetime(), Duration::minutes(2));
        assert_eq!(policy.cooldown(), Duration::minutes(1));
    }
}
