// ABOUTME: Monthly prompt quota enforcement keyed by subscription tier
// ABOUTME: Loads or lazily creates profile and usage rows, then gates final generations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Quota Gate
//!
//! Tier limits come from [`SubscriptionTier::monthly_quota`]: free 5, pro 100,
//! enterprise unlimited. Unknown stored tiers parse as free.
//!
//! Row lookups fail closed (a select error is a 500) but lazy creation of a
//! missing row fails open: the request proceeds with `free` / `0`.
//!
//! The check and the later increment are separate statements, so two
//! concurrent final generations from one user can both pass at `limit - 1`.

use promptsmith_core::errors::{AppError, AppResult};
use promptsmith_core::models::{MonthlyQuota, Profile, SubscriptionTier, UsageLimits};
use serde::Serialize;
use tracing::{debug, warn};

use crate::database::DatabaseProvider;

/// Caller's tier and usage at the time of the check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSnapshot {
    /// Subscription tier
    pub tier: SubscriptionTier,
    /// Monthly allowance for the tier
    pub quota: MonthlyQuota,
    /// Final generations used this month
    pub used: u32,
}

impl QuotaSnapshot {
    /// Prompts left this month, `None` when unlimited
    #[must_use]
    pub const fn remaining(&self) -> Option<u32> {
        self.quota.remaining(self.used)
    }

    /// Whether another final generation must be refused
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        !self.quota.allows(self.used)
    }

    /// Client-facing view
    #[must_use]
    pub fn to_usage_report(&self) -> UsageReport {
        UsageReport {
            tier: self.tier,
            used: self.used,
            limit: self.quota.as_wire(),
            remaining: self.remaining(),
        }
    }
}

/// JSON body of `GET /api/usage`
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    /// Subscription tier
    pub tier: SubscriptionTier,
    /// Final generations used this month
    pub used: u32,
    /// Monthly limit, `-1` when unlimited
    pub limit: i64,
    /// Remaining prompts, `null` when unlimited
    pub remaining: Option<u32>,
}

/// Reads (and lazily creates) the rows backing a user's quota
pub struct QuotaGate;

impl QuotaGate {
    /// Load the caller's quota snapshot without enforcing it
    ///
    /// # Errors
    ///
    /// Returns a database error if a select fails
    pub async fn snapshot(store: &dyn DatabaseProvider, user_id: &str) -> AppResult<QuotaSnapshot> {
        let tier = Self::load_tier(store, user_id).await?;
        let used = Self::load_usage(store, user_id).await?;

        Ok(QuotaSnapshot {
            tier,
            quota: tier.monthly_quota(),
            used,
        })
    }

    /// Load the snapshot and refuse when the monthly allowance is used up
    ///
    /// # Errors
    ///
    /// Returns `QuotaExceeded` (429) carrying limit and usage, or a database
    /// error if a select fails
    pub async fn check(store: &dyn DatabaseProvider, user_id: &str) -> AppResult<QuotaSnapshot> {
        let snapshot = Self::snapshot(store, user_id).await?;

        if let MonthlyQuota::Limited(limit) = snapshot.quota {
            if snapshot.is_exhausted() {
                debug!(user_id, limit, used = snapshot.used, "Monthly quota exhausted");
                return Err(AppError::quota_exceeded(limit, snapshot.used));
            }
        }

        Ok(snapshot)
    }

    async fn load_tier(store: &dyn DatabaseProvider, user_id: &str) -> AppResult<SubscriptionTier> {
        if let Some(profile) = store.get_profile(user_id).await? {
            return Ok(profile.subscription_tier);
        }

        let profile = Profile::new_default(user_id);
        if let Err(e) = store.create_profile(&profile).await {
            warn!(user_id, error = %e, "Failed to create default profile, continuing with free tier");
        }
        Ok(profile.subscription_tier)
    }

    async fn load_usage(store: &dyn DatabaseProvider, user_id: &str) -> AppResult<u32> {
        if let Some(usage) = store.get_usage(user_id).await? {
            return Ok(usage.monthly_prompts_used);
        }

        let usage = UsageLimits::new_default(user_id);
        if let Err(e) = store.create_usage(&usage).await {
            warn!(user_id, error = %e, "Failed to create usage row, continuing with zero usage");
        }
        Ok(usage.monthly_prompts_used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tier: SubscriptionTier, used: u32) -> QuotaSnapshot {
        QuotaSnapshot {
            tier,
            quota: tier.monthly_quota(),
            used,
        }
    }

    #[test]
    fn test_exhaustion_boundary() {
        assert!(!snapshot(SubscriptionTier::Free, 4).is_exhausted());
        assert!(snapshot(SubscriptionTier::Free, 5).is_exhausted());
        assert!(!snapshot(SubscriptionTier::Pro, 99).is_exhausted());
        assert!(snapshot(SubscriptionTier::Pro, 100).is_exhausted());
        assert!(!snapshot(SubscriptionTier::Enterprise, 1_000_000).is_exhausted());
    }

    #[test]
    fn test_usage_report_for_unlimited_tier() {
        let report = snapshot(SubscriptionTier::Enterprise, 42).to_usage_report();
        assert_eq!(report.limit, -1);
        assert_eq!(report.remaining, None);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["tier"], "enterprise");
        assert!(json["remaining"].is_null());
    }

    #[test]
    fn test_remaining_never_underflows() {
        assert_eq!(snapshot(SubscriptionTier::Free, 9).remaining(), Some(0));
    }
}
