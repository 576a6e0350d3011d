//! Bridge configuration with validation.
//!
//! Defaults mirror production: replies are awaited for 100 seconds.
//! Loadable from TOML, with `RECRUIT_*` environment overrides on top.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default upper bound on a call's wait for its reply
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(100);

/// Main bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// This service's own reply queue, sent as `reply_to` on every envelope
    pub reply_queue: String,
    /// How long a call waits for its reply
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
    /// How long `publish` waits for room in the outbound queue
    #[serde(with = "humantime_serde")]
    pub publish_timeout: Duration,
    /// Outbound queue capacity
    pub outbound_capacity: usize,
    /// Destination queues of the sibling services
    pub queues: ServiceQueues,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            reply_queue: "recruitment.reply".to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            publish_timeout: Duration::from_secs(5),
            outbound_capacity: 1024,
            queues: ServiceQueues::default(),
        }
    }
}

/// Destination queue per sibling service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceQueues {
    pub employee: String,
    pub organization: String,
    pub job: String,
    pub user: String,
    pub grade: String,
    pub mail: String,
}

impl Default for ServiceQueues {
    fn default() -> Self {
        Self {
            employee: "employee.request".to_string(),
            organization: "organization.request".to_string(),
            job: "job.request".to_string(),
            user: "user.request".to_string(),
            grade: "grade.request".to_string(),
            mail: "mail.request".to_string(),
        }
    }
}

impl ServiceQueues {
    fn named(&self) -> [(&'static str, &str); 6] {
        [
            ("employee", self.employee.as_str()),
            ("organization", self.organization.as_str()),
            ("job", self.job.as_str()),
            ("user", self.user.as_str()),
            ("grade", self.grade.as_str()),
            ("mail", self.mail.as_str()),
        ]
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("reply queue name cannot be empty")]
    EmptyReplyQueue,
    #[error("queue for {0} cannot be empty")]
    EmptyQueue(&'static str),
    #[error("queue for {0} is the reply queue")]
    QueueIsReplyQueue(&'static str),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("invalid configuration file: {0}")]
    Parse(String),
}

impl BridgeConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reply_queue.trim().is_empty() {
            return Err(ConfigError::EmptyReplyQueue);
        }

        for (service, queue) in self.queues.named() {
            if queue.trim().is_empty() {
                return Err(ConfigError::EmptyQueue(service));
            }
            // Requests landing on our own reply queue would be read as replies
            if queue == self.reply_queue {
                return Err(ConfigError::QueueIsReplyQueue(service));
            }
        }

        if self.call_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "call_timeout cannot be 0".into(),
            ));
        }

        if self.publish_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "publish_timeout cannot be 0".into(),
            ));
        }

        if self.outbound_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "outbound_capacity cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Parse from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `RECRUIT_*` overrides read through `lookup`.
    ///
    /// | Key | Field |
    /// |-----|-------|
    /// | `RECRUIT_REPLY_QUEUE` | `reply_queue` |
    /// | `RECRUIT_CALL_TIMEOUT_MS` | `call_timeout` |
    /// | `RECRUIT_PUBLISH_TIMEOUT_MS` | `publish_timeout` |
    /// | `RECRUIT_OUTBOUND_CAPACITY` | `outbound_capacity` |
    /// | `RECRUIT_QUEUE_<SERVICE>` | `queues.<service>` |
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(queue) = lookup("RECRUIT_REPLY_QUEUE") {
            self.reply_queue = queue;
        }
        if let Some(ms) = lookup("RECRUIT_CALL_TIMEOUT_MS") {
            self.call_timeout = Duration::from_millis(parse_env("RECRUIT_CALL_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = lookup("RECRUIT_PUBLISH_TIMEOUT_MS") {
            self.publish_timeout =
                Duration::from_millis(parse_env("RECRUIT_PUBLISH_TIMEOUT_MS", &ms)?);
        }
        if let Some(capacity) = lookup("RECRUIT_OUTBOUND_CAPACITY") {
            self.outbound_capacity = parse_env("RECRUIT_OUTBOUND_CAPACITY", &capacity)?;
        }

        let queues = &mut self.queues;
        for (key, slot) in [
            ("RECRUIT_QUEUE_EMPLOYEE", &mut queues.employee),
            ("RECRUIT_QUEUE_ORGANIZATION", &mut queues.organization),
            ("RECRUIT_QUEUE_JOB", &mut queues.job),
            ("RECRUIT_QUEUE_USER", &mut queues.user),
            ("RECRUIT_QUEUE_GRADE", &mut queues.grade),
            ("RECRUIT_QUEUE_MAIL", &mut queues.mail),
        ] {
            if let Some(queue) = lookup(key) {
                *slot = queue;
            }
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
    })
}
