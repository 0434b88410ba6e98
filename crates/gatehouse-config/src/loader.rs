// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading.
//!
//! Lookup order: `./gatehouse.toml` > `~/.config/gatehouse/gatehouse.toml` >
//! `/etc/gatehouse/gatehouse.toml`, with `GATEHOUSE_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::GatehouseConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/gatehouse/gatehouse.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/gatehouse/gatehouse.toml`
/// 3. `~/.config/gatehouse/gatehouse.toml`
/// 4. `./gatehouse.toml`
/// 5. `GATEHOUSE_*` environment variables
pub fn load_config() -> Result<GatehouseConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<GatehouseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GatehouseConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<GatehouseConfig, figment::Error> {
    tracing::debug!(path = %path.display(), "loading configuration file");
    Figment::new()
        .merge(Serialized::defaults(GatehouseConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(GatehouseConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("gatehouse/gatehouse.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("gatehouse.toml"))
        .merge(env_provider())
}

/// Maps `GATEHOUSE_<SECTION>_<KEY>` to `section.key`.
///
/// Only the first underscore after a known section becomes a dot, so
/// `GATEHOUSE_TELEGRAM_BOT_TOKEN` lands on `telegram.bot_token`.
fn env_provider() -> Env {
    Env::prefixed("GATEHOUSE_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 5] = ["service", "telegram", "storage", "queue", "auth"];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
