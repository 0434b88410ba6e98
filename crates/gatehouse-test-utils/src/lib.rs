// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Gatehouse integration tests.
//!
//! Provides deterministic fakes for every seam the engine reaches through,
//! plus a harness that wires them to a temporary database.
//!
//! # Components
//!
//! - [`MockBot`] - records bot API calls, returns fresh message ids, injects failures
//! - [`ManualClock`] - a clock that only moves when told to
//! - [`StaticVerifier`] - init-data verifier backed by a fixed table
//! - [`TestHarness`] - engine context, API facade and queue worker over a temp database

pub mod clock;
pub mod harness;
pub mod mock_bot;
pub mod verifier;

pub use clock::ManualClock;
pub use harness::{profile, TestHarness};
pub use mock_bot::{BotCall, MockBot};
pub use verifier::StaticVerifier;
