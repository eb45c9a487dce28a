//! Event loop configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding [`EventLoopConfig::task_budget`]
pub const TASK_BUDGET_ENV: &str = "PLEDGE_TASK_BUDGET";

/// Configuration for an [`EventLoop`](crate::scheduler::EventLoop)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLoopConfig {
    /// Maximum tasks executed by a single run call (starvation protection, 0 = unlimited)
    pub task_budget: usize,
    /// Virtual time the loop starts at, in milliseconds
    pub start_time: u64,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            task_budget: 10_000,
            start_time: 0,
        }
    }
}

impl EventLoopConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-run task budget
    pub fn with_task_budget(mut self, budget: usize) -> Self {
        self.task_budget = budget;
        self
    }

    /// Set the starting virtual time
    pub fn with_start_time(mut self, ms: u64) -> Self {
        self.start_time = ms;
        self
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().overlay_env(|key| std::env::var(key).ok())
    }

    /// Overlay values found through `lookup` (keyed by environment variable name)
    pub fn overlay_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(TASK_BUDGET_ENV) {
            self.task_budget = raw.trim().parse().map_err(|_| {
                Error::Config(format!("{} must be a non-negative integer, got {:?}", TASK_BUDGET_ENV, raw))
            })?;
        }
        Ok(self)
    }

    /// Parse from a JSON document; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Whether the task budget is unlimited
    pub fn is_unbounded(&self) -> bool {
        self.task_budget == 0
    }
}
