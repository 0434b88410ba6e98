// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams between the admission engine and the outside world.
//!
//! The engine never talks to Telegram or reads the wall clock directly; it
//! goes through these traits so tests can substitute deterministic fakes.

pub mod bot;
pub mod clock;
pub mod verify;

pub use bot::{BotApi, Button, MemberPermissions, OutgoingMessage};
pub use clock::{Clock, SystemClock};
pub use verify::{InitDataVerifier, VerifiedInitData};
