// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mini-app init-data verification contract.

use chrono::{DateTime, Utc};

use crate::error::GatehouseError;
use crate::types::UserProfile;

/// Identity extracted from signed mini-app init data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedInitData {
    pub user: UserProfile,
    /// When Telegram signed the payload.
    pub auth_date: DateTime<Utc>,
    /// `start_param` from the launch link, usually a chat id.
    pub start_param: Option<String>,
}

/// Checks the signature on mini-app init data.
///
/// Returns [`GatehouseError::Unauthenticated`] for anything that does not
/// verify. Freshness is checked by the caller against its own clock.
pub trait InitDataVerifier: Send + Sync {
    fn verify(&self, init_data: &str) -> Result<VerifiedInitData, GatehouseError>;
}
