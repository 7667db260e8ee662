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

//! Error types for the Pipetrace SDK.

use thiserror::Error;

/// Pipetrace SDK errors.
#[derive(Error, Debug)]
pub enum PipetraceError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid redaction selector: {0}")]
    InvalidSelector(String),

    #[error("invalid run payload: {0}")]
    Validation(String),

    #[error("task panicked: {0}")]
    Panic(String),
}

/// Result type for Pipetrace operations.
pub type Result<T> = std::result::Result<T, PipetraceError>;
