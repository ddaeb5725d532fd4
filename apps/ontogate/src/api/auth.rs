//! # API Key & Quota Registry
//!
//! Per-key request quotas over three windows (day/hour/minute). Keys are
//! loaded from a one-key-per-line file; keys suffixed `_ADMIN` are
//! quota-exempt. Periodic tasks reset the windows and re-read the key
//! file (reloads only add new keys, they never drop live ones).

use crate::config::{KeysConfig, load_api_keys};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Suffix marking quota-exempt keys.
const ADMIN_SUFFIX: &str = "_ADMIN";

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Whether a key is subject to quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    /// Quota-exempt.
    Admin,
    /// Quota-tracked.
    User,
}

/// Per-key quota state.
#[derive(Debug, Clone)]
struct Account {
    quota_day: i64,
    quota_hour: i64,
    quota_minute: i64,
    kind: AccountKind,
}

/// Remaining quotas after a successful consume, for request logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSnapshot {
    /// Remaining requests this day.
    pub day: i64,
    /// Remaining requests this hour.
    pub hour: i64,
    /// Remaining requests this minute.
    pub minute: i64,
}

/// Key-check failures, mapped to 401/429 by the handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The key is absent from the registry.
    #[error("invalid userkey")]
    UnknownKey,

    /// A quota window is exhausted; the message names it.
    #[error("request limit exceeded {0}")]
    LimitExceeded(&'static str),
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Thread-safe key registry with quota bookkeeping.
#[derive(Debug)]
pub struct ApiKeyRegistry {
    accounts: Mutex<BTreeMap<String, Account>>,
    start_day: i64,
    start_hour: i64,
    start_minute: i64,
}

impl ApiKeyRegistry {
    /// Build a registry from loaded keys and starting quotas.
    #[must_use]
    pub fn new(keys: Vec<String>, config: &KeysConfig) -> Self {
        let registry = Self {
            accounts: Mutex::new(BTreeMap::new()),
            start_day: config.quota_day,
            start_hour: config.quota_hour,
            start_minute: config.quota_minute,
        };
        registry.merge_keys(keys);
        registry
    }

    /// Check a key and consume one request from each quota window.
    ///
    /// Fails distinctly on unknown keys vs. exhausted quotas; the
    /// exhausted-window message names the narrowest window first checked
    /// (day, then hour, then minute). Admin keys bypass bookkeeping.
    pub fn check_and_consume(&self, key: &str) -> Result<QuotaSnapshot, KeyError> {
        let mut accounts = self.lock();
        let Some(name) = Self::find_key(&accounts, key) else {
            return Err(KeyError::UnknownKey);
        };
        let Some(account) = accounts.get_mut(&name) else {
            return Err(KeyError::UnknownKey);
        };

        if account.kind == AccountKind::Admin {
            return Ok(QuotaSnapshot {
                day: account.quota_day,
                hour: account.quota_hour,
                minute: account.quota_minute,
            });
        }

        if account.quota_day <= 0 {
            return Err(KeyError::LimitExceeded("per day"));
        }
        if account.quota_hour <= 0 {
            return Err(KeyError::LimitExceeded("per hour"));
        }
        if account.quota_minute <= 0 {
            return Err(KeyError::LimitExceeded("per minute"));
        }

        account.quota_day -= 1;
        account.quota_hour -= 1;
        account.quota_minute -= 1;
        Ok(QuotaSnapshot {
            day: account.quota_day,
            hour: account.quota_hour,
            minute: account.quota_minute,
        })
    }

    /// Add accounts for keys not yet present.
    pub fn merge_keys(&self, keys: Vec<String>) {
        let mut accounts = self.lock();
        for key in keys {
            if accounts.contains_key(&key) {
                continue;
            }
            let kind = if key.ends_with(ADMIN_SUFFIX) {
                AccountKind::Admin
            } else {
                AccountKind::User
            };
            accounts.insert(
                key,
                Account {
                    quota_day: self.start_day,
                    quota_hour: self.start_hour,
                    quota_minute: self.start_minute,
                    kind,
                },
            );
        }
    }

    /// Reset every account's per-minute quota.
    pub fn reset_minute(&self) {
        for account in self.lock().values_mut() {
            account.quota_minute = self.start_minute;
        }
    }

    /// Reset every account's per-hour quota.
    pub fn reset_hour(&self) {
        for account in self.lock().values_mut() {
            account.quota_hour = self.start_hour;
        }
    }

    /// Reset every account's per-day quota.
    pub fn reset_day(&self) {
        for account in self.lock().values_mut() {
            account.quota_day = self.start_day;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Locate a key by constant-time comparison against every stored
    /// key, so lookup timing does not leak key prefixes.
    fn find_key(accounts: &BTreeMap<String, Account>, provided: &str) -> Option<String> {
        let mut found = None;
        for stored in accounts.keys() {
            if constant_time_eq(stored.as_bytes(), provided.as_bytes()) && found.is_none() {
                found = Some(stored.clone());
            }
        }
        found
    }
}

/// Length-padded constant-time byte comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let max_len = a.len().max(b.len());
    let mut padded_a = vec![0u8; max_len];
    let mut padded_b = vec![0u8; max_len];
    padded_a[..a.len()].copy_from_slice(a);
    padded_b[..b.len()].copy_from_slice(b);
    let bytes_match: bool = padded_a.ct_eq(&padded_b).into();
    bytes_match && a.len() == b.len()
}

// =============================================================================
// MAINTENANCE TASKS
// =============================================================================

/// Spawn the quota-reset and key-reload timers.
pub fn spawn_maintenance(registry: Arc<ApiKeyRegistry>, config: KeysConfig, key_file: PathBuf) {
    let minute = Arc::clone(&registry);
    tokio::spawn(fn_interval(Duration::from_secs(60), move || {
        minute.reset_minute();
    }));

    let hour = Arc::clone(&registry);
    tokio::spawn(fn_interval(Duration::from_secs(3600), move || {
        hour.reset_hour();
    }));

    let day = Arc::clone(&registry);
    tokio::spawn(fn_interval(Duration::from_secs(86_400), move || {
        day.reset_day();
    }));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(config.reload_secs.max(1)));
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            match load_api_keys(&key_file) {
                Ok(keys) => registry.merge_keys(keys),
                Err(e) => tracing::warn!("api key reload failed: {e}"),
            }
        }
    });
}

/// A future running `action` on a fixed interval, skipping the
/// immediate first tick.
async fn fn_interval(period: Duration, action: impl Fn() + Send + 'static) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        action();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> KeysConfig {
        KeysConfig {
            enabled: true,
            quota_day: 10,
            quota_hour: 5,
            quota_minute: 2,
            reload_secs: 600,
        }
    }

    #[test]
    fn unknown_key_is_rejected() {
        let registry = ApiKeyRegistry::new(vec!["alpha".to_string()], &config());
        assert_eq!(
            registry.check_and_consume("beta"),
            Err(KeyError::UnknownKey)
        );
    }

    #[test]
    fn quotas_decrease_and_exhaust_narrowest_window() {
        let registry = ApiKeyRegistry::new(vec!["alpha".to_string()], &config());
        let first = registry.check_and_consume("alpha").expect("first request");
        assert_eq!(first, QuotaSnapshot { day: 9, hour: 4, minute: 1 });
        registry.check_and_consume("alpha").expect("second request");
        assert_eq!(
            registry.check_and_consume("alpha"),
            Err(KeyError::LimitExceeded("per minute"))
        );
        // a minute reset reopens the window
        registry.reset_minute();
        assert!(registry.check_and_consume("alpha").is_ok());
    }

    #[test]
    fn admin_keys_bypass_quotas() {
        let registry = ApiKeyRegistry::new(vec!["root_ADMIN".to_string()], &config());
        for _ in 0..20 {
            registry.check_and_consume("root_ADMIN").expect("admin is exempt");
        }
    }

    #[test]
    fn merge_keeps_existing_accounts() {
        let registry = ApiKeyRegistry::new(vec!["alpha".to_string()], &config());
        registry.check_and_consume("alpha").expect("consume once");
        registry.merge_keys(vec!["alpha".to_string(), "beta".to_string()]);
        // alpha kept its consumed state, beta starts fresh
        let alpha = registry.check_and_consume("alpha").expect("alpha");
        assert_eq!(alpha.day, 8);
        let beta = registry.check_and_consume("beta").expect("beta");
        assert_eq!(beta.day, 9);
    }

    #[test]
    fn constant_time_eq_requires_equal_length() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(!constant_time_eq(b"abc", b"abd"));
    }
}
