// ABOUTME: System prompt for the prompt-engineering assistant, loaded at compile time
// ABOUTME: Prepended to every conversation sent to the completion provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # System Prompts
//!
//! Prompts live in markdown next to this module so they can be edited without
//! touching code.

/// Instruction prepended to every chat turn
pub const PROMPT_ENGINEER_SYSTEM_PROMPT: &str = include_str!("prompt_engineer.md");
