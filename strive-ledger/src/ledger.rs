use crate::grant::CreditGrant;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Owns every user's credit grants. A single internal mutex serializes
/// mutations, so two bookings for the same user racing through different
/// class locks still see a consistent balance.
pub struct CreditLedger {
    grants: Mutex<HashMap<Uuid, Vec<CreditGrant>>>,
}

impl CreditLedger {
    pub fn new() -> Self {
        Self {
            grants: Mutex::new(HashMap::new()),
        }
    }

    /// Records a purchased package.
    pub fn grant(
        &self,
        user_id: Uuid,
        country_code: String,
        credits: i32,
        valid_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CreditGrant {
        let grant = CreditGrant::new(user_id, country_code, credits, valid_until, now);
        let mut grants = self.grants.lock().unwrap();
        grants.entry(user_id).or_default().push(grant.clone());
        info!(
            "Granted {} credits to user {} (grant {})",
            credits, user_id, grant.id
        );
        grant
    }

    /// Spendable balance: sum of credits across grants whose deadline has
    /// not passed. Zero when the user holds none.
    pub fn remaining_credits(&self, user_id: &Uuid, now: DateTime<Utc>) -> i32 {
        let grants = self.grants.lock().unwrap();
        grants
            .get(user_id)
            .map(|user_grants| {
                user_grants
                    .iter()
                    .filter(|g| g.is_spendable(now))
                    .map(|g| g.credits)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Subtracts `amount` from the user's grants, oldest deadline first
    /// (purchase order breaks ties). Fails with no mutation when the
    /// spendable balance does not cover the amount; no grant ever goes
    /// negative.
    pub fn deduct(
        &self,
        user_id: &Uuid,
        amount: i32,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut grants = self.grants.lock().unwrap();

        let available: i32 = grants
            .get(user_id)
            .map(|gs| {
                gs.iter()
                    .filter(|g| g.is_spendable(now))
                    .map(|g| g.credits)
                    .sum()
            })
            .unwrap_or(0);

        if available < amount {
            return Err(LedgerError::InsufficientCredits {
                required: amount,
                available,
            });
        }

        let Some(user_grants) = grants.get_mut(user_id) else {
            return Ok(());
        };
        let mut eligible: Vec<&mut CreditGrant> = user_grants
            .iter_mut()
            .filter(|g| g.is_spendable(now))
            .collect();
        eligible.sort_by_key(|g| g.valid_until);

        let mut outstanding = amount;
        for grant in eligible {
            if outstanding == 0 {
                break;
            }
            let take = outstanding.min(grant.credits);
            grant.credits -= take;
            outstanding -= take;
        }

        info!("Deducted {} credits from user {}", amount, user_id);
        Ok(())
    }

    /// Returns `amount` to the first non-expired grant in purchase order.
    /// First-found is the documented policy, not soonest-expiring or
    /// largest-balance.
    pub fn refund(
        &self,
        user_id: &Uuid,
        amount: i32,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut grants = self.grants.lock().unwrap();
        let user_grants = grants
            .get_mut(user_id)
            .ok_or(LedgerError::NoEligibleGrant(*user_id))?;

        match user_grants.iter_mut().find(|g| g.is_spendable(now)) {
            Some(grant) => {
                grant.credits += amount;
                info!(
                    "Refunded {} credits to user {} (grant {})",
                    amount, user_id, grant.id
                );
                Ok(())
            }
            None => {
                warn!("No valid grant found for user {} to refund", user_id);
                Err(LedgerError::NoEligibleGrant(*user_id))
            }
        }
    }

    /// Flags grants past their deadline. Idempotent; never deletes.
    pub fn expire_grants(&self, now: DateTime<Utc>) -> usize {
        let mut grants = self.grants.lock().unwrap();
        let mut flagged = 0;
        for user_grants in grants.values_mut() {
            for grant in user_grants.iter_mut() {
                if !grant.expired && grant.valid_until < now {
                    grant.expired = true;
                    flagged += 1;
                    info!("Grant {} has expired", grant.id);
                }
            }
        }
        flagged
    }

    pub fn grants_for(&self, user_id: &Uuid) -> Vec<CreditGrant> {
        let grants = self.grants.lock().unwrap();
        grants.get(user_id).cloned().unwrap_or_default()
    }
}

impl Default for CreditLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: i32, available: i32 },

    #[error("User {0} has no eligible grant")]
    NoEligibleGrant(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expired_grants_are_not_spendable() {
        let ledger = CreditLedger::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        // One long-dead grant, one live one
        ledger.grant(
            user_id,
            "SG".to_string(),
            100,
            now - Duration::days(1),
            now - Duration::days(30),
        );
        ledger.grant(user_id, "SG".to_string(), 5, now + Duration::days(30), now);

        assert_eq!(ledger.remaining_credits(&user_id, now), 5);
        assert!(ledger.deduct(&user_id, 5, now).is_ok());

        let err = ledger.deduct(&user_id, 6, now).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientCredits {
                required: 6,
                available: 0
            }
        ));

        // Failed deduct left the dead grant untouched
        let grants = ledger.grants_for(&user_id);
        assert_eq!(grants[0].credits, 100);
        assert_eq!(grants[1].credits, 0);
    }

    #[test]
    fn test_deduct_spans_grants_oldest_deadline_first() {
        let ledger = CreditLedger::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let later = ledger.grant(user_id, "SG".to_string(), 10, now + Duration::days(60), now);
        let sooner = ledger.grant(user_id, "SG".to_string(), 3, now + Duration::days(10), now);

        ledger.deduct(&user_id, 5, now).unwrap();

        let grants = ledger.grants_for(&user_id);
        let sooner_after = grants.iter().find(|g| g.id == sooner.id).unwrap();
        let later_after = grants.iter().find(|g| g.id == later.id).unwrap();

        // The sooner-expiring grant is drained first, remainder comes
        // out of the later one
        assert_eq!(sooner_after.credits, 0);
        assert_eq!(later_after.credits, 8);
        assert_eq!(ledger.remaining_credits(&user_id, now), 8);
    }

    #[test]
    fn test_refund_targets_first_valid_grant() {
        let ledger = CreditLedger::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        ledger.grant(
            user_id,
            "SG".to_string(),
            0,
            now - Duration::days(1),
            now - Duration::days(20),
        );
        let first_valid = ledger.grant(user_id, "SG".to_string(), 2, now + Duration::days(5), now);
        ledger.grant(user_id, "SG".to_string(), 9, now + Duration::days(2), now);

        ledger.refund(&user_id, 4, now).unwrap();

        let grants = ledger.grants_for(&user_id);
        let target = grants.iter().find(|g| g.id == first_valid.id).unwrap();
        assert_eq!(target.credits, 6);
    }

    #[test]
    fn test_refund_without_eligible_grant_fails() {
        let ledger = CreditLedger::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        assert!(matches!(
            ledger.refund(&user_id, 3, now),
            Err(LedgerError::NoEligibleGrant(_))
        ));

        ledger.grant(
            user_id,
            "SG".to_string(),
            10,
            now - Duration::hours(1),
            now - Duration::days(10),
        );
        assert!(matches!(
            ledger.refund(&user_id, 3, now),
            Err(LedgerError::NoEligibleGrant(_))
        ));
    }

    #[test]
    fn test_expire_grants_is_idempotent() {
        let ledger = CreditLedger::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        ledger.grant(
            user_id,
            "SG".to_string(),
            10,
            now - Duration::hours(2),
            now - Duration::days(10),
        );
        ledger.grant(user_id, "SG".to_string(), 10, now + Duration::days(1), now);

        assert_eq!(ledger.expire_grants(now), 1);
        assert_eq!(ledger.expire_grants(now), 0);

        let grants = ledger.grants_for(&user_id);
        assert!(grants[0].expired);
        assert!(!grants[1].expired);
    }
}
