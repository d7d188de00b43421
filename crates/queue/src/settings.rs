//! Processor configuration.
//!
//! Settings are fixed for the lifetime of a processor. Build them in code with
//! the `with_*` methods, deserialize them from a config file, or read them from
//! environment variables with [`ProcessorSettings::from_env`]:
//!
//! | variable                       | field                  |
//! |--------------------------------|------------------------|
//! | `<PREFIX>_NAME`                | `name`                 |
//! | `<PREFIX>_MAX_EVENTS`          | `max_queue_depth`      |
//! | `<PREFIX>_PRE_THREADS`         | `pre_dispatch_threads` |
//! | `<PREFIX>_MAX_SUBMIT_WAIT_MS`  | `max_submit_wait`      |
//! | `<PREFIX>_RETRY_INTERVAL_MS`   | `retry_interval`       |
//! | `<PREFIX>_RETRY_DISCARD_AGE_MS`| `retry_discard_age`    |
//! | `<PREFIX>_MAX_SHUTDOWN_WAIT_MS`| `max_shutdown_wait`    |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sspr_core::Position;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    OutOfRange(String),
}

/// How a processor dispatches work.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatchMode {
    /// Try each submission on one of `n` pool threads first.
    PreDispatch(usize),
    /// Every submission goes through the durable queue and the drain thread.
    QueueOnly,
    /// No threads: `submit` drains the queue on the caller's thread.
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorSettings {
    /// Queue name; also the data table name in the store.
    pub name: String,

    /// Durable queue capacity. A full queue blocks `submit`.
    pub max_queue_depth: usize,

    /// `> 0` pool size, `0` queue only, `< 0` inline.
    pub pre_dispatch_threads: i32,

    #[serde(with = "millis")]
    pub max_submit_wait: Duration,

    /// Pause before re-attempting an item that asked for a retry. New
    /// submissions do not cut the pause short; only shutdown caps it.
    #[serde(with = "millis")]
    pub retry_interval: Duration,

    /// Items older than this are dropped unprocessed.
    #[serde(with = "millis")]
    pub retry_discard_age: Duration,

    #[serde(with = "millis")]
    pub max_shutdown_wait: Duration,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            name: "work-queue".to_string(),
            max_queue_depth: 1000,
            pre_dispatch_threads: 0,
            max_submit_wait: Duration::from_secs(5),
            retry_interval: Duration::from_secs(30),
            retry_discard_age: Duration::from_secs(24 * 60 * 60),
            max_shutdown_wait: Duration::from_secs(30),
        }
    }
}

impl ProcessorSettings {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = depth;
        self
    }

    pub fn with_pre_dispatch_threads(mut self, threads: i32) -> Self {
        self.pre_dispatch_threads = threads;
        self
    }

    pub fn with_max_submit_wait(mut self, wait: Duration) -> Self {
        self.max_submit_wait = wait;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_retry_discard_age(mut self, age: Duration) -> Self {
        self.retry_discard_age = age;
        self
    }

    pub fn with_max_shutdown_wait(mut self, wait: Duration) -> Self {
        self.max_shutdown_wait = wait;
        self
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        match self.pre_dispatch_threads {
            n if n > 0 => DispatchMode::PreDispatch(n as usize),
            0 => DispatchMode::QueueOnly,
            _ => DispatchMode::Inline,
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.name.trim().is_empty() {
            return Err(SettingsError::OutOfRange(
                "queue name must not be empty".to_string(),
            ));
        }
        if self.name.ends_with(".meta") {
            return Err(SettingsError::OutOfRange(format!(
                "queue name '{}' collides with a metadata table",
                self.name
            )));
        }
        if self.max_queue_depth == 0 || self.max_queue_depth as u64 > Position::CAPACITY {
            return Err(SettingsError::OutOfRange(format!(
                "max_queue_depth must be between 1 and {}, got {}",
                Position::CAPACITY,
                self.max_queue_depth
            )));
        }
        if self.retry_discard_age.is_zero() {
            return Err(SettingsError::OutOfRange(
                "retry_discard_age must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Read settings from the process environment, falling back to defaults
    /// for unset variables.
    pub fn from_env(prefix: &str) -> Result<Self, SettingsError> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let key = format!("{prefix}_{suffix}");
            lookup(&key).map(|value| (key, value))
        };
        let mut settings = Self::default();

        if let Some((_, value)) = var("NAME") {
            settings.name = value;
        }
        if let Some((key, value)) = var("MAX_EVENTS") {
            settings.max_queue_depth = parse(&key, &value)?;
        }
        if let Some((key, value)) = var("PRE_THREADS") {
            settings.pre_dispatch_threads = parse(&key, &value)?;
        }
        if let Some((key, value)) = var("MAX_SUBMIT_WAIT_MS") {
            settings.max_submit_wait = Duration::from_millis(parse(&key, &value)?);
        }
        if let Some((key, value)) = var("RETRY_INTERVAL_MS") {
            settings.retry_interval = Duration::from_millis(parse(&key, &value)?);
        }
        if let Some((key, value)) = var("RETRY_DISCARD_AGE_MS") {
            settings.retry_discard_age = Duration::from_millis(parse(&key, &value)?);
        }
        if let Some((key, value)) = var("MAX_SHUTDOWN_WAIT_MS") {
            settings.max_shutdown_wait = Duration::from_millis(parse(&key, &value)?);
        }

        settings.validate()?;
        Ok(settings)
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, SettingsError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| SettingsError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Durations as integer milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
