// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Table-driven init-data verifier.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use gatehouse_core::{GatehouseError, InitDataVerifier, UserProfile, VerifiedInitData};

/// Accepts exactly the init-data strings it was given.
#[derive(Debug, Default)]
pub struct StaticVerifier {
    known: Mutex<HashMap<String, VerifiedInitData>>,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `init_data` as a valid payload for `user` signed at `auth_date`.
    pub fn insert(&self, init_data: &str, user: UserProfile, auth_date: DateTime<Utc>) {
        self.known.lock().unwrap_or_else(|e| e.into_inner()).insert(
            init_data.to_string(),
            VerifiedInitData {
                user,
                auth_date,
                start_param: None,
            },
        );
    }
}

impl InitDataVerifier for StaticVerifier {
    fn verify(&self, init_data: &str) -> Result<VerifiedInitData, GatehouseError> {
        self.known
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(init_data)
            .cloned()
            .ok_or_else(|| GatehouseError::Unauthenticated("signature mismatch".into()))
    }
}
