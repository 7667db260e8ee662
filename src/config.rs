// Copyright 2025 Pipetrace Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Client configuration.
//!
//! Configuration is an explicit value handed to every component that needs
//! it. The SDK keeps no process-global state.

use crate::error::{PipetraceError, Result};
use std::time::Duration;

/// Default base path of the hosted Pipetrace service.
pub const DEFAULT_BASE_PATH: &str = "https://api.pipetrace.dev";

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "PIPETRACE_API_KEY";

/// Environment variable overriding the base path.
pub const ENV_BASE_PATH: &str = "PIPETRACE_BASE_PATH";

/// Environment variable overriding the default test-result name.
pub const ENV_RESULT_NAME: &str = "PIPETRACE_RESULT_NAME";

/// Pipetrace client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key used as a bearer token on every request
    pub api_key: String,
    /// Base URL of the Pipetrace service
    pub base_path: String,
    /// Default name attached to submitted test results
    pub result_name: Option<String>,
    /// Request timeout (default: 30 seconds)
    pub timeout: Duration,
}

impl ClientConfig {
    /// Create a new client configuration with the default base path.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_path: DEFAULT_BASE_PATH.into(),
            result_name: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Build a configuration from `PIPETRACE_*` environment variables.
    ///
    /// `PIPETRACE_API_KEY` is required; `PIPETRACE_BASE_PATH` and
    /// `PIPETRACE_RESULT_NAME` are optional overrides.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(ENV_API_KEY)
            .map_err(|_| PipetraceError::Config(format!("{} is not set", ENV_API_KEY)))?;
        if api_key.trim().is_empty() {
            return Err(PipetraceError::Config(format!("{} is empty", ENV_API_KEY)));
        }

        let mut config = Self::new(api_key);
        if let Ok(base_path) = std::env::var(ENV_BASE_PATH) {
            config.base_path = base_path;
        }
        if let Ok(name) = std::env::var(ENV_RESULT_NAME) {
            config.result_name = Some(name);
        }
        Ok(config)
    }

    /// Set the base path.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Set the default test-result name.
    pub fn with_result_name(mut self, name: impl Into<String>) -> Self {
        self.result_name = Some(name.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = ClientConfig::new("pt-key")
            .with_base_path("http://localhost:8080")
            .with_result_name("nightly")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.api_key, "pt-key");
        assert_eq!(config.base_path, "http://localhost:8080");
        assert_eq!(config.result_name.as_deref(), Some("nightly"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn from_env_reads_and_requires_key() {
        // Single test exercising both branches so parallel tests never race
        // on the process environment.
        std::env::remove_var(ENV_API_KEY);
        std::env::remove_var(ENV_BASE_PATH);
        assert!(matches!(
            ClientConfig::from_env(),
            Err(PipetraceError::Config(_))
        ));

        std::env::set_var(ENV_API_KEY, "pt-env-key");
        std::env::set_var(ENV_BASE_PATH, "http://localhost:9999");
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.api_key, "pt-env-key");
        assert_eq!(config.base_path, "http://localhost:9999");

        std::env::remove_var(ENV_API_KEY);
        std::env::remove_var(ENV_BASE_PATH);
    }
}
