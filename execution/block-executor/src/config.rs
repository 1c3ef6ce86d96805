// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use occ_mvhashmap::types::Incarnation;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_MAX_INCARNATION: Incarnation = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to sanitize the block executor config! Sanitizer: {0}, Error: {1}")]
    SanitizerFailed(String, String),
    #[error("Error accessing {0}: {1}")]
    IO(String, #[source] std::io::Error),
    #[error("Error (de)serializing {0}: {1}")]
    Yaml(String, #[source] serde_yaml::Error),
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlockExecutorConfig {
    /// Number of worker threads. 1 executes blocks sequentially.
    pub concurrency_level: usize,
    /// Highest incarnation a transaction may reach in parallel execution. When a
    /// transaction would exceed it, the rest of the block is executed sequentially.
    pub max_incarnation: Incarnation,
}

impl Default for BlockExecutorConfig {
    fn default() -> Self {
        Self {
            concurrency_level: num_cpus::get(),
            max_incarnation: DEFAULT_MAX_INCARNATION,
        }
    }
}

impl BlockExecutorConfig {
    pub fn parse(serialized: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(serialized)
            .map_err(|e| ConfigError::Yaml("block executor config".to_string(), e))
    }

    pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::IO(path.display().to_string(), e))?;
        let mut config = Self::parse(&contents)?;
        config.sanitize()?;
        Ok(config)
    }

    /// Rejects unusable values, and caps the concurrency level at the number of CPUs.
    pub fn sanitize(&mut self) -> Result<(), ConfigError> {
        let sanitizer_name = "BlockExecutorConfigSanitizer".to_string();

        if self.concurrency_level == 0 {
            return Err(ConfigError::SanitizerFailed(
                sanitizer_name,
                "concurrency_level must be > 0".to_string(),
            ));
        }
        if self.max_incarnation == 0 {
            return Err(ConfigError::SanitizerFailed(
                sanitizer_name,
                "max_incarnation must be > 0".to_string(),
            ));
        }

        let num_cpus = num_cpus::get();
        if self.concurrency_level > num_cpus {
            warn!(
                "[Execution]: concurrency_level {} exceeds the number of CPUs, using {}",
                self.concurrency_level, num_cpus
            );
            self.concurrency_level = num_cpus;
        }
        Ok(())
    }
}
