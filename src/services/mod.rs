// ABOUTME: Domain service layer for business logic extracted from route handlers
// ABOUTME: Holds the chat turn workflow and the background bookkeeping queue
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Domain service layer
//!
//! Route handlers stay thin; the workflow and its side effects live here so
//! they can be driven directly from tests.

/// Post-stream side effects run by a background worker
pub mod bookkeeping;

/// Validate, authenticate, gate and stream one chat turn
pub mod chat_turn;

pub use bookkeeping::{BookkeepingJob, BookkeepingQueue};
pub use chat_turn::{ChatTurnRequest, ChatTurnService, FragmentPayload, TurnEvent, TurnStream};
