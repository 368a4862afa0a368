//! Mock free-tier quota: a per-day request counter plus a "pro" flag.
//!
//! State lives in a small key-value store. The usage key embeds the calendar
//! date, so the counter starts from zero every day without any reset logic.
//! Nothing here is enforced server-side; it is advisory, single-user data.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use chrono::{Datelike, Local, NaiveDate};
use tracing::{debug, info};

use crate::{error::Result, types::Limits};

pub const FREE_DAILY_LIMIT: u32 = 2;

/// Reported as "remaining" for subscribed users.
pub const PRO_REMAINING: u32 = 999_999;

const PRO_KEY: &str = "app_is_pro";

pub trait QuotaStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuotaStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .expect("MemoryStore poisoned")
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .expect("MemoryStore poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values
            .lock()
            .expect("MemoryStore poisoned")
            .remove(key);
        Ok(())
    }
}

/// A flat JSON object on disk, rewritten on every change.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(values)?)?;
        Ok(())
    }
}

impl QuotaStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            self.write_all(&values)?;
        }
        Ok(())
    }
}

/// `usage_<year>-<month>-<day>`, unpadded.
pub fn usage_key(date: NaiveDate) -> String {
    format!("usage_{}-{}-{}", date.year(), date.month(), date.day())
}

#[derive(Clone)]
pub struct QuotaService {
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
    daily_limit: u32,
}

impl QuotaService {
    pub fn new(store: Arc<dyn QuotaStore>, clock: Arc<dyn Clock>, daily_limit: u32) -> Self {
        Self {
            store,
            clock,
            daily_limit,
        }
    }

    /// File-backed service on the local calendar.
    pub fn with_file(path: impl Into<PathBuf>, daily_limit: u32) -> Self {
        Self::new(
            Arc::new(JsonFileStore::new(path)),
            Arc::new(SystemClock),
            daily_limit,
        )
    }

    pub fn status(&self) -> Result<Limits> {
        let is_pro = self.store.get(PRO_KEY)?.as_deref() == Some("true");
        let used_today = self
            .store
            .get(&usage_key(self.clock.today()))?
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(0);

        Ok(Limits {
            is_pro,
            daily_limit: self.daily_limit,
            used_today,
            remaining_today: if is_pro {
                PRO_REMAINING
            } else {
                self.daily_limit.saturating_sub(used_today)
            },
        })
    }

    /// Spend one request from today's allowance. Returns `false` once it is used up.
    pub fn consume_credit(&self) -> Result<bool> {
        let status = self.status()?;
        if status.is_pro {
            return Ok(true);
        }
        if status.used_today >= status.daily_limit {
            debug!(used = status.used_today, "Daily limit exhausted");
            return Ok(false);
        }

        let used = status.used_today + 1;
        self.store
            .set(&usage_key(self.clock.today()), &used.to_string())?;
        debug!(used, limit = status.daily_limit, "Consumed credit");
        Ok(true)
    }

    pub fn subscribe(&self) -> Result<()> {
        info!("Pro subscription activated");
        self.store.set(PRO_KEY, "true")
    }

    pub fn cancel_subscription(&self) -> Result<()> {
        info!("Pro subscription cancelled");
        self.store.remove(PRO_KEY)
    }
}
