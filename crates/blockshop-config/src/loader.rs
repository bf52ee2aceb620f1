// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./blockshop.toml` > `~/.config/blockshop/blockshop.toml`
//! > `/etc/blockshop/blockshop.toml`, with environment variable overrides via
//! the `BLOCKSHOP_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::BlockshopConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/blockshop/blockshop.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "blockshop.toml";

/// Config sections addressable from the environment.
const ENV_SECTIONS: &[&str] = &["server", "rcon", "delivery", "store", "gateway"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/blockshop/blockshop.toml` (system-wide)
/// 3. `~/.config/blockshop/blockshop.toml` (user XDG config)
/// 4. `./blockshop.toml` (local directory)
/// 5. `BLOCKSHOP_*` environment variables
pub fn load_config() -> Result<BlockshopConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no environment).
pub fn load_config_from_str(toml_content: &str) -> Result<BlockshopConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BlockshopConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BlockshopConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BlockshopConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the XDG lookup, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(BlockshopConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("blockshop/blockshop.toml"))
}

/// Environment provider mapping `BLOCKSHOP_<SECTION>_<KEY>` to `section.key`.
///
/// Only the leading section name is rewritten, so keys containing underscores
/// survive: `BLOCKSHOP_STORE_DELIVERY_MODE` becomes `store.delivery_mode`.
fn env_provider() -> Env {
    Env::prefixed("BLOCKSHOP_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
