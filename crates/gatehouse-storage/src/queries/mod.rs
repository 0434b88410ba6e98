// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for storage entities.

pub mod audit;
pub mod chat_admin;
pub mod chat_config;
pub mod chat_info;
pub mod forms;
pub mod notification_message;
pub mod private_chat;
pub mod projection;
pub mod queue;
pub mod replay;
pub mod sessions;
