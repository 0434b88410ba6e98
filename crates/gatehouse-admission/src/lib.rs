// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Gatehouse admission workflow engine.
//!
//! Everything here is stateless: each operation receives an
//! [`AdmissionContext`], does its local work in one storage transaction, and
//! only then calls out to Telegram. Concurrency control lives entirely in the
//! storage layer's claim primitive.
//!
//! # Components
//!
//! - [`lifecycle`] - session creation, reload, submission, and the deep-link start
//! - [`resolver`] - accept / reject / ban / expire
//! - [`notify`] - answer notifications per chat notification mode
//! - [`consumer`] and [`worker`] - delayed queue delivery
//! - [`membership`] - admin list and member transitions
//! - [`api`] - the surface exposed to the mini-app and admin UI

pub mod api;
pub mod consumer;
pub mod context;
pub mod format;
pub mod lifecycle;
pub mod membership;
pub mod metrics;
pub mod notify;
pub mod resolver;
pub mod worker;

pub use api::{AdmissionApi, Caller};
pub use context::{AdmissionContext, EngineSettings};
pub use resolver::Resolution;
pub use worker::QueueWorker;
