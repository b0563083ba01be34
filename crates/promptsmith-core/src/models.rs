// ABOUTME: Core domain models for accounts, subscription tiers, usage and conversation sessions
// ABOUTME: Shared between the HTTP layer, the quota gate and the relational store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Domain models
//!
//! Identity is owned by the external auth provider; profile, usage and session
//! rows live in the relational store and are keyed by the provider's user id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::constants::{limits, session};

// ============================================================================
// Identity
// ============================================================================

/// Authenticated caller as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Provider-issued user id
    pub id: String,
    /// Email address, when the provider exposes one
    pub email: Option<String>,
}

// ============================================================================
// Subscription tiers
// ============================================================================

/// Subscription level gating feature access and monthly quota
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    /// Default tier for new accounts
    #[default]
    Free,
    /// Paid individual tier
    Pro,
    /// Organisation tier with unlimited usage
    Enterprise,
}

impl SubscriptionTier {
    /// Parse a stored tier; anything unrecognised is treated as `Free`
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pro" => Self::Pro,
            "enterprise" => Self::Enterprise,
            _ => Self::Free,
        }
    }

    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Monthly prompt allowance for this tier
    #[must_use]
    pub const fn monthly_quota(&self) -> MonthlyQuota {
        match self {
            Self::Free => MonthlyQuota::Limited(limits::FREE_MONTHLY_PROMPTS),
            Self::Pro => MonthlyQuota::Limited(limits::PRO_MONTHLY_PROMPTS),
            Self::Enterprise => MonthlyQuota::Unlimited,
        }
    }
}

impl Display for SubscriptionTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Monthly prompt allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthlyQuota {
    /// At most this many final generations per month
    Limited(u32),
    /// No cap
    Unlimited,
}

impl MonthlyQuota {
    /// Whether a caller who has used `used` prompts may generate another
    #[must_use]
    pub const fn allows(&self, used: u32) -> bool {
        match self {
            Self::Limited(limit) => used < *limit,
            Self::Unlimited => true,
        }
    }

    /// Wire representation (`-1` for unlimited)
    #[must_use]
    pub fn as_wire(&self) -> i64 {
        match self {
            Self::Limited(limit) => i64::from(*limit),
            Self::Unlimited => limits::UNLIMITED_WIRE_VALUE,
        }
    }

    /// Remaining prompts, `None` when unlimited
    #[must_use]
    pub const fn remaining(&self, used: u32) -> Option<u32> {
        match self {
            Self::Limited(limit) => Some(limit.saturating_sub(used)),
            Self::Unlimited => None,
        }
    }
}

// ============================================================================
// Store rows
// ============================================================================

/// Per-user profile row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Owning user
    pub user_id: String,
    /// Current subscription tier
    pub subscription_tier: SubscriptionTier,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Default profile created lazily on first access
    #[must_use]
    pub fn new_default(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            subscription_tier: SubscriptionTier::Free,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-user usage counter row
///
/// Monthly rollover of `monthly_prompts_used` is handled outside this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimits {
    /// Owning user
    pub user_id: String,
    /// Final generations consumed this month
    pub monthly_prompts_used: u32,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl UsageLimits {
    /// Zeroed counter created lazily on first access
    #[must_use]
    pub fn new_default(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            monthly_prompts_used: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Conversations
// ============================================================================

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction
    System,
    /// End-user input
    User,
    /// Model output
    Assistant,
}

impl MessageRole {
    /// String representation for API calls
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who produced the turn
    pub role: MessageRole,
    /// Turn text
    pub content: String,
}

impl ChatTurn {
    /// Create a turn
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user turn
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant turn
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Lifecycle tag of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Still exploring
    InProgress,
    /// A final prompt has been generated
    Completed,
}

impl SessionStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Parse a stored status, defaulting to `InProgress`
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        if s == "completed" {
            Self::Completed
        } else {
            Self::InProgress
        }
    }
}

/// Persisted conversation keyed by a caller-supplied session id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSession {
    /// Caller-supplied session id
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Full ordered history including the latest assistant turn
    pub messages: Vec<ChatTurn>,
    /// Generated artifact for final turns
    pub final_prompt: Option<String>,
    /// Lifecycle tag
    pub status: SessionStatus,
    /// Derived from the first turn
    pub title: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    /// Build the record written at the end of a turn
    ///
    /// `history` is the caller's turn list; the assistant's reply is appended.
    #[must_use]
    pub fn from_completed_turn(
        id: impl Into<String>,
        user_id: impl Into<String>,
        history: Vec<ChatTurn>,
        reply: String,
        final_generation: bool,
    ) -> Self {
        let title = derive_title(&history);
        let mut messages = history;
        let final_prompt = final_generation.then(|| reply.clone());
        messages.push(ChatTurn::assistant(reply));

        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            messages,
            final_prompt,
            status: if final_generation {
                SessionStatus::Completed
            } else {
                SessionStatus::InProgress
            },
            title,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Title from the first turn: leading characters plus an ellipsis marker
#[must_use]
pub fn derive_title(messages: &[ChatTurn]) -> Option<String> {
    let first = messages.first()?;
    let mut title: String = first
        .content
        .chars()
        .take(session::TITLE_MAX_CHARS)
        .collect();
    title.push_str(session::TITLE_ELLIPSIS);
    Some(title)
}

/// Listing view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session id
    pub id: String,
    /// Derived title
    pub title: Option<String>,
    /// Lifecycle tag
    pub status: SessionStatus,
    /// Number of stored turns
    pub message_count: usize,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl From<&ConversationSession> for SessionSummary {
    fn from(session: &ConversationSession) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            status: session.status,
            message_count: session.messages.len(),
            updated_at: session.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_quota_table() {
        assert_eq!(
            SubscriptionTier::Free.monthly_quota(),
            MonthlyQuota::Limited(5)
        );
        assert_eq!(
            SubscriptionTier::Pro.monthly_quota(),
            MonthlyQuota::Limited(100)
        );
        assert_eq!(
            SubscriptionTier::Enterprise.monthly_quota(),
            MonthlyQuota::Unlimited
        );
    }

    #[test]
    fn test_unknown_tier_falls_back_to_free() {
        assert_eq!(
            SubscriptionTier::from_str_or_default("platinum"),
            SubscriptionTier::Free
        );
        assert_eq!(
            SubscriptionTier::from_str_or_default("PRO"),
            SubscriptionTier::Pro
        );
    }

    #[test]
    fn test_quota_boundary() {
        let quota = MonthlyQuota::Limited(5);
        assert!(quota.allows(4));
        assert!(!quota.allows(5));
        assert_eq!(quota.remaining(7), Some(0));
        assert!(MonthlyQuota::Unlimited.allows(u32::MAX));
        assert_eq!(MonthlyQuota::Unlimited.as_wire(), -1);
    }

    #[test]
    fn test_title_truncates_on_characters() {
        let long = "é".repeat(80);
        let title = derive_title(&[ChatTurn::user(long)]).unwrap();
        assert_eq!(title.chars().count(), 53);
        assert!(title.ends_with("..."));

        assert_eq!(
            derive_title(&[ChatTurn::user("Write a haiku")]).as_deref(),
            Some("Write a haiku...")
        );
        assert!(derive_title(&[]).is_none());
    }

    #[test]
    fn test_completed_turn_record() {
        let history = vec![ChatTurn::user("Help me write a prompt")];
        let final_session = ConversationSession::from_completed_turn(
            "s1",
            "u1",
            history.clone(),
            "You are...".to_owned(),
            true,
        );
        assert_eq!(final_session.messages.len(), 2);
        assert_eq!(final_session.final_prompt.as_deref(), Some("You are..."));
        assert_eq!(final_session.status, SessionStatus::Completed);

        let chat_session =
            ConversationSession::from_completed_turn("s1", "u1", history, "Sure".to_owned(), false);
        assert!(chat_session.final_prompt.is_none());
        assert_eq!(chat_session.status, SessionStatus::InProgress);
        assert_eq!(chat_session.messages[1], ChatTurn::assistant("Sure"));
    }
}
