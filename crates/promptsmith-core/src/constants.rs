// ABOUTME: Application-wide constants grouped by domain
// ABOUTME: Quota table values, session title rules, service identifiers and generation parameters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Monthly quota table
pub mod limits {
    /// Final generations per month on the free tier
    pub const FREE_MONTHLY_PROMPTS: u32 = 5;
    /// Final generations per month on the pro tier
    pub const PRO_MONTHLY_PROMPTS: u32 = 100;
    /// Wire value for an unlimited allowance
    pub const UNLIMITED_WIRE_VALUE: i64 = -1;
}

/// Conversation session rules
pub mod session {
    /// Characters of the first turn kept in a derived title
    pub const TITLE_MAX_CHARS: usize = 50;
    /// Marker appended to a derived title
    pub const TITLE_ELLIPSIS: &str = "...";
    /// Default page size for session listings
    pub const DEFAULT_LIST_LIMIT: i64 = 20;
    /// Largest page size accepted for session listings
    pub const MAX_LIST_LIMIT: i64 = 100;
}

/// Completion parameters per turn kind
pub mod generation {
    /// Temperature for final-generation turns
    pub const FINAL_TEMPERATURE: f32 = 0.1;
    /// Output token cap for final-generation turns
    pub const FINAL_MAX_TOKENS: u32 = 1500;
    /// Temperature for exploratory chat turns
    pub const CHAT_TEMPERATURE: f32 = 0.3;
    /// Output token cap for exploratory chat turns
    pub const CHAT_MAX_TOKENS: u32 = 1000;
}

/// Service identifiers
pub mod service_names {
    /// Service name used in logs
    pub const PROMPTSMITH_SERVER: &str = "promptsmith-server";
    /// Auth provider name used in error messages
    pub const AUTH_PROVIDER: &str = "auth provider";
}

/// Streaming wire format
pub mod streaming {
    /// Terminal sentinel payload
    pub const DONE_SENTINEL: &str = "[DONE]";
}
