//! Per-principal, per-action cooldown enforcement.
//!
//! Contributor submissions and provider usage reports deliberately share the
//! `Submission` timestamp; decryption requests are tracked separately. `check` and
//! `record` are split so the ledger facade can keep operations atomic: it peeks the
//! cooldown first (preserving error precedence) and records only after every other
//! precondition has passed.

use crate::access::Principal;
use crate::errors::LedgerError;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RateAction {
    /// Contribution submissions and usage reports.
    Submission,
    /// Batch summary decryption requests.
    DecryptionRequest,
}

pub struct RateLimiter {
    cooldown_seconds: u64,
    last: BTreeMap<(Principal, RateAction), DateTime<Utc>>,
}

impl RateLimiter {
    pub fn new(cooldown_seconds: u64) -> Self {
        Self {
            cooldown_seconds,
            last: BTreeMap::new(),
        }
    }

    pub fn cooldown_seconds(&self) -> u64 {
        self.cooldown_seconds
    }

    pub fn set_cooldown_seconds(&mut self, seconds: u64) {
        self.cooldown_seconds = seconds;
    }

    /// Fails `CooldownActive` when `now` is still inside the window; mutates nothing.
    pub fn check(&self, principal: &Principal, action: RateAction, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let Some(last) = self.last.get(&(principal.clone(), action)) else {
            return Ok(());
        };

        let ready_at = *last + Duration::seconds(self.cooldown_seconds as i64);
        if now < ready_at {
            let retry_after_secs = (ready_at - now).num_seconds().max(0) as u64;
            return Err(LedgerError::CooldownActive { retry_after_secs });
        }
        Ok(())
    }

    /// Store `now` as the new last-action time. Call only once the whole operation is
    /// certain to succeed.
    pub fn record(&mut self, principal: &Principal, action: RateAction, now: DateTime<Utc>) {
        self.last.insert((principal.clone(), action), now);
    }

    pub fn check_and_record(
        &mut self,
        principal: &Principal,
        action: RateAction,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.check(principal, action, now)?;
        self.record(principal, action, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn cooldown_window_enforced() {
        let mut limiter = RateLimiter::new(60);
        let p = Principal::new("alice");

        limiter.check_and_record(&p, RateAction::Submission, at(0)).unwrap();

        let err = limiter.check(&p, RateAction::Submission, at(30)).unwrap_err();
        assert!(matches!(err, LedgerError::CooldownActive { retry_after_secs: 30 }));

        limiter.check_and_record(&p, RateAction::Submission, at(61)).unwrap();
    }

    #[test]
    fn actions_are_tracked_independently() {
        let mut limiter = RateLimiter::new(60);
        let p = Principal::new("alice");

        limiter.check_and_record(&p, RateAction::Submission, at(0)).unwrap();

        // A fresh submission is rate limited, but a decryption request is not.
        assert!(limiter.check(&p, RateAction::Submission, at(1)).is_err());
        limiter.check_and_record(&p, RateAction::DecryptionRequest, at(1)).unwrap();
    }

    #[test]
    fn principals_do_not_share_windows() {
        let mut limiter = RateLimiter::new(60);
        limiter.check_and_record(&Principal::new("alice"), RateAction::Submission, at(0)).unwrap();
        limiter.check(&Principal::new("bob"), RateAction::Submission, at(0)).unwrap();
    }

    #[test]
    fn shrinking_the_cooldown_applies_to_existing_windows() {
        let mut limiter = RateLimiter::new(60);
        let p = Principal::new("alice");

        limiter.check_and_record(&p, RateAction::Submission, at(0)).unwrap();
        limiter.set_cooldown_seconds(10);
        limiter.check(&p, RateAction::Submission, at(11)).unwrap();
    }
}
