//! Service configuration.
//!
//! Values are read from environment variables. Binaries load a `.env` file
//! with `dotenvy` before calling [`ServiceConfig::from_env`].
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `QUIRE_OWNER_SHARE_POLICY` | `reject` | `reject` or `ignore` a grant that targets the owner |
//! | `QUIRE_PAGE_LIMIT` | 20 | page size when the caller gives none |
//! | `QUIRE_MAX_PAGE_LIMIT` | 100 | upper bound for caller page sizes |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

/// What to do when an owner tries to share a note with themselves.
///
/// A self-referential grant is never written; the policy only decides
/// whether the attempt is reported as an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerSharePolicy {
    /// Fail with `AlreadyShared`.
    #[default]
    Reject,
    /// Succeed without writing anything.
    Ignore,
}

impl fmt::Display for OwnerSharePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerSharePolicy::Reject => f.write_str("reject"),
            OwnerSharePolicy::Ignore => f.write_str("ignore"),
        }
    }
}

impl FromStr for OwnerSharePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(OwnerSharePolicy::Reject),
            "ignore" => Ok(OwnerSharePolicy::Ignore),
            other => Err(Error::Config(format!(
                "unknown owner share policy '{}' (expected 'reject' or 'ignore')",
                other
            ))),
        }
    }
}

/// Settings for [`crate::NoteService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub owner_share_policy: OwnerSharePolicy,
    pub page_limit: i64,
    pub max_page_limit: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            owner_share_policy: OwnerSharePolicy::default(),
            page_limit: defaults::PAGE_LIMIT,
            max_page_limit: defaults::MAX_PAGE_LIMIT,
        }
    }
}

impl ServiceConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            owner_share_policy: parse_var(&lookup, "QUIRE_OWNER_SHARE_POLICY")?
                .unwrap_or(defaults.owner_share_policy),
            page_limit: parse_var(&lookup, "QUIRE_PAGE_LIMIT")?.unwrap_or(defaults.page_limit),
            max_page_limit: parse_var(&lookup, "QUIRE_MAX_PAGE_LIMIT")?
                .unwrap_or(defaults.max_page_limit),
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the owner share policy.
    pub fn owner_share_policy(mut self, policy: OwnerSharePolicy) -> Self {
        self.owner_share_policy = policy;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.page_limit < 1 {
            return Err(Error::Config("QUIRE_PAGE_LIMIT must be at least 1".to_string()));
        }
        if self.max_page_limit < self.page_limit {
            return Err(Error::Config(
                "QUIRE_MAX_PAGE_LIMIT must not be smaller than QUIRE_PAGE_LIMIT".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse an optional variable, reporting malformed values as `Error::Config`.
pub fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value for {}: {}", key, e))),
    }
}
