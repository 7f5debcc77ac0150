//! One-time codes bound to an order
//!
//! A delivery code proves the physical handoff, a COD code proves cash was
//! collected. Records live inside the order's `payment_details`; every
//! operation here is pure and takes the current time explicitly.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Verification attempts granted per issued code
pub const MAX_ATTEMPTS: i32 = 5;

/// Resends allowed before the cycle needs admin intervention
pub const MAX_RESENDS: i32 = 3;

/// OTP failures surfaced to callers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    #[error("OTP resend limit exceeded")]
    ResendLimitExceeded,

    #[error("OTP has expired")]
    Expired,

    #[error("Invalid OTP, {attempts_left} attempts left")]
    Mismatch { attempts_left: i32 },

    #[error("No OTP attempts left")]
    AttemptsExhausted,

    #[error("OTP has already been used")]
    AlreadyConsumed,

    #[error("No OTP has been issued for this order")]
    NotIssued,
}

/// Which code on an order
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OtpKind {
    #[default]
    Delivery,
    Cod,
}

/// Length and lifetime of codes of one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpPolicy {
    pub digits: u32,
    pub ttl: Duration,
}

impl OtpPolicy {
    pub fn new(digits: u32, ttl: Duration) -> Self {
        Self { digits, ttl }
    }

    /// Generate a zero-padded numeric code
    fn generate_code(&self) -> String {
        let upper = 10u64.pow(self.digits);
        let value = rand::thread_rng().gen_range(0..upper);
        format!("{:0width$}", value, width = self.digits as usize)
    }
}

/// Embedded OTP sub-document
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub code: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    pub attempts_left: i32,
    pub resend_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<DateTime<Utc>>,
}

/// Code-free view of an OTP record
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct OtpSummary {
    pub expires_at: DateTime<Utc>,
    pub attempts_left: i32,
    pub resend_count: i32,
    pub verified: bool,
}

/// Issue a fresh code, replacing whatever was there before
pub fn issue(policy: &OtpPolicy, now: DateTime<Utc>) -> OtpRecord {
    OtpRecord {
        code: policy.generate_code(),
        expires_at: now + policy.ttl,
        attempts_left: MAX_ATTEMPTS,
        resend_count: 0,
        consumed_at: None,
    }
}

/// Re-issue a code, counting against the resend cap
pub fn resend(
    current: &OtpRecord,
    policy: &OtpPolicy,
    now: DateTime<Utc>,
) -> Result<OtpRecord, OtpError> {
    if current.consumed_at.is_some() {
        return Err(OtpError::AlreadyConsumed);
    }
    if current.resend_count >= MAX_RESENDS {
        return Err(OtpError::ResendLimitExceeded);
    }

    let mut next = issue(policy, now);
    next.resend_count = current.resend_count + 1;
    Ok(next)
}

/// Check a submitted code, mutating the attempt counter or consumption mark
pub fn verify(record: &mut OtpRecord, submitted: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
    if record.consumed_at.is_some() {
        return Err(OtpError::AlreadyConsumed);
    }
    if record.attempts_left <= 0 {
        return Err(OtpError::AttemptsExhausted);
    }
    if now >= record.expires_at {
        return Err(OtpError::Expired);
    }

    if record.code != submitted.trim() {
        record.attempts_left -= 1;
        if record.attempts_left == 0 {
            return Err(OtpError::AttemptsExhausted);
        }
        return Err(OtpError::Mismatch {
            attempts_left: record.attempts_left,
        });
    }

    record.consumed_at = Some(now);
    Ok(())
}

impl OtpRecord {
    /// Unexpired and unconsumed
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_none() && self.attempts_left > 0 && now < self.expires_at
    }

    pub fn summary(&self) -> OtpSummary {
        OtpSummary {
            expires_at: self.expires_at,
            attempts_left: self.attempts_left,
            resend_count: self.resend_count,
            verified: self.consumed_at.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery_policy() -> OtpPolicy {
        OtpPolicy::new(6, Duration::hours(24))
    }

    #[test]
    fn test_issue_sets_counters_and_expiry() {
        let now = Utc::now();
        let record = issue(&delivery_policy(), now);

        assert_eq!(record.code.len(), 6);
        assert!(record.code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(record.expires_at, now + Duration::hours(24));
        assert_eq!(record.attempts_left, MAX_ATTEMPTS);
        assert_eq!(record.resend_count, 0);
        assert!(record.is_live(now));
    }

    #[test]
    fn test_cod_codes_are_four_digits() {
        let policy = OtpPolicy::new(4, Duration::minutes(15));
        for _ in 0..50 {
            assert_eq!(issue(&policy, Utc::now()).code.len(), 4);
        }
    }

    #[test]
    fn test_resend_cap() {
        let policy = delivery_policy();
        let now = Utc::now();
        let mut record = issue(&policy, now);

        for expected in 1..=3 {
            record = resend(&record, &policy, now).unwrap();
            assert_eq!(record.resend_count, expected);
        }

        assert_eq!(
            resend(&record, &policy, now),
            Err(OtpError::ResendLimitExceeded)
        );
    }

    #[test]
    fn test_resend_resets_attempts() {
        let policy = delivery_policy();
        let now = Utc::now();
        let mut record = issue(&policy, now);
        record.attempts_left = 1;

        let next = resend(&record, &policy, now + Duration::minutes(1)).unwrap();
        assert_eq!(next.attempts_left, MAX_ATTEMPTS);
        assert_eq!(next.expires_at, now + Duration::minutes(1) + Duration::hours(24));
    }

    #[test]
    fn test_verify_success_consumes() {
        let now = Utc::now();
        let mut record = issue(&delivery_policy(), now);
        let code = record.code.clone();

        assert!(verify(&mut record, &code, now).is_ok());
        assert!(!record.is_live(now));
        assert_eq!(verify(&mut record, &code, now), Err(OtpError::AlreadyConsumed));
    }

    #[test]
    fn test_verify_mismatch_decrements_until_exhausted() {
        let now = Utc::now();
        let mut record = issue(&delivery_policy(), now);
        record.code = "123456".to_string();

        for left in (1..MAX_ATTEMPTS).rev() {
            assert_eq!(
                verify(&mut record, "000000", now),
                Err(OtpError::Mismatch { attempts_left: left })
            );
        }
        assert_eq!(
            verify(&mut record, "000000", now),
            Err(OtpError::AttemptsExhausted)
        );
        assert_eq!(record.attempts_left, 0);

        // Even the right code is refused once locked out
        assert_eq!(
            verify(&mut record, "123456", now),
            Err(OtpError::AttemptsExhausted)
        );
    }

    #[test]
    fn test_verify_expired() {
        let now = Utc::now();
        let mut record = issue(&OtpPolicy::new(6, Duration::minutes(15)), now);
        let code = record.code.clone();

        let later = now + Duration::minutes(15);
        assert_eq!(verify(&mut record, &code, later), Err(OtpError::Expired));
        assert_eq!(record.attempts_left, MAX_ATTEMPTS);
    }

    #[test]
    fn test_wire_shape() {
        let record = issue(&delivery_policy(), Utc::now());
        let json = serde_json::to_value(&record).unwrap();

        assert!(json.get("code").is_some());
        assert!(json.get("expiresAt").is_some());
        assert!(json.get("attempts_left").is_some());
        assert!(json.get("resend_count").is_some());
        assert!(json.get("consumed_at").is_none());
    }
}
