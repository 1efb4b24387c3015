use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Stored `agent_limit` value meaning "no cap".
pub const UNLIMITED_AGENTS: i32 = -1;

/// Cap applied to users that have not bought a plan yet (`agent_limit == 0`).
pub const DEFAULT_AGENT_LIMIT: i64 = 5;

pub const VERIFICATION_CODE_TTL_HOURS: i64 = 24;
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub verification_code: Option<String>,
    pub verification_code_expires_at: Option<DateTime<Utc>>,
    pub plan: PlanTier,
    pub agent_limit: i32,
    pub domains: Vec<String>,
    pub reset_password_token: Option<String>,
    pub reset_password_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlanTier {
    Regular,
    Special,
    Agency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanDetails {
    /// Minor currency units.
    pub amount: i64,
    pub currency: &'static str,
    pub name: &'static str,
}

impl PlanTier {
    pub const ALL: [PlanTier; 3] = [PlanTier::Regular, PlanTier::Special, PlanTier::Agency];

    /// Value written to `users.agent_limit` once the plan is paid for.
    pub fn agent_limit(self) -> i32 {
        match self {
            PlanTier::Regular => 2,
            PlanTier::Special => 5,
            PlanTier::Agency => UNLIMITED_AGENTS,
        }
    }

    pub fn details(self) -> PlanDetails {
        match self {
            PlanTier::Regular => PlanDetails {
                amount: 59900,
                currency: "USD",
                name: "Regular Plan",
            },
            PlanTier::Special => PlanDetails {
                amount: 89900,
                currency: "USD",
                name: "Special Plan",
            },
            // Priced on request
            PlanTier::Agency => PlanDetails {
                amount: 0,
                currency: "USD",
                name: "Agency Plan",
            },
        }
    }
}

impl User {
    pub fn new(email: String, password_hash: String, verification_code: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            is_verified: false,
            verification_code: Some(verification_code),
            verification_code_expires_at: Some(now + Duration::hours(VERIFICATION_CODE_TTL_HOURS)),
            plan: PlanTier::Regular,
            agent_limit: 0,
            domains: Vec::new(),
            reset_password_token: None,
            reset_password_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Maximum number of agents this user may own; `None` means unlimited.
    pub fn effective_agent_limit(&self) -> Option<i64> {
        match self.agent_limit {
            n if n < 0 => None,
            0 => Some(DEFAULT_AGENT_LIMIT),
            n => Some(i64::from(n)),
        }
    }

    pub fn verification_code_matches(&self, code: &str, now: DateTime<Utc>) -> bool {
        match (&self.verification_code, self.verification_code_expires_at) {
            (Some(expected), Some(expires_at)) => expected == code && now < expires_at,
            _ => false,
        }
    }

    /// A reset token is accepted strictly before its stored expiry.
    pub fn reset_token_valid(&self, token: &str, now: DateTime<Utc>) -> bool {
        match (&self.reset_password_token, self.reset_password_expires_at) {
            (Some(expected), Some(expires_at)) => expected == token && now < expires_at,
            _ => false,
        }
    }

    pub fn mark_verified(&mut self) {
        self.is_verified = true;
        self.verification_code = None;
        self.verification_code_expires_at = None;
        self.updated_at = Utc::now();
    }

    pub fn start_password_reset(&mut self, token: String, now: DateTime<Utc>) {
        self.reset_password_token = Some(token);
        self.reset_password_expires_at = Some(now + Duration::hours(RESET_TOKEN_TTL_HOURS));
        self.updated_at = now;
    }

    pub fn set_password_hash(&mut self, password_hash: String) {
        self.password_hash = password_hash;
        self.reset_password_token = None;
        self.reset_password_expires_at = None;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn user() -> User {
        User::new("a@example.com".to_string(), "hash".to_string(), "ABC123".to_string())
    }

    #[test]
    fn new_user_is_unverified_regular_without_paid_limit() {
        let u = user();
        assert!(!u.is_verified);
        assert_eq!(u.plan, PlanTier::Regular);
        assert_eq!(u.agent_limit, 0);
        assert_eq!(u.effective_agent_limit(), Some(DEFAULT_AGENT_LIMIT));
    }

    #[test]
    fn effective_limit_follows_plan() {
        let mut u = user();
        u.agent_limit = PlanTier::Regular.agent_limit();
        assert_eq!(u.effective_agent_limit(), Some(2));
        u.agent_limit = PlanTier::Agency.agent_limit();
        assert_eq!(u.effective_agent_limit(), None);
    }

    #[test]
    fn reset_token_expires_exactly_at_stored_expiry() {
        let mut u = user();
        let now = Utc::now();
        u.start_password_reset("tok".to_string(), now);
        let expires_at = u.reset_password_expires_at.unwrap();

        assert!(u.reset_token_valid("tok", expires_at - Duration::milliseconds(1)));
        assert!(!u.reset_token_valid("tok", expires_at));
        assert!(!u.reset_token_valid("tok", expires_at + Duration::seconds(1)));
        assert!(!u.reset_token_valid("other", now));
    }

    #[test]
    fn verification_code_checks_value_and_expiry() {
        let u = user();
        let now = Utc::now();
        assert!(u.verification_code_matches("ABC123", now));
        assert!(!u.verification_code_matches("abc123", now));
        assert!(!u.verification_code_matches("ABC123", now + Duration::hours(25)));
    }

    #[test]
    fn plan_tier_round_trips_through_strings() {
        for plan in PlanTier::ALL {
            assert_eq!(PlanTier::from_str(&plan.to_string()).unwrap(), plan);
        }
        assert!(PlanTier::from_str("gold").is_err());
    }
}
