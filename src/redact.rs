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

//! Field redaction for serialized runs.
//!
//! Redaction is applied to the serialized payload immediately before
//! transmission. It never mutates the run it was derived from: `apply` takes
//! a reference and returns a new value. Selectors are a closed set of shapes;
//! anything else is rejected at decode time rather than guessed at.

use crate::error::{PipetraceError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One segment of a field path: an object key or an array index.
///
/// A `Key` whose text parses as an integer also addresses array elements, so
/// paths written as JSON string arrays (`["messages", "0", "role"]`) navigate
/// into arrays the same way as numeric segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    pub fn key(k: impl Into<String>) -> Self {
        Self::Key(k.into())
    }

    pub fn index(i: usize) -> Self {
        Self::Index(i)
    }

    fn as_array_index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Key(k) => k.parse().ok(),
        }
    }
}

/// A path addressing one leaf inside a structured value.
pub type FieldPath = Vec<PathSegment>;

/// Selector for one redactable section of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepSelector {
    /// Transmit the section unchanged
    KeepAll,
    /// Omit the section entirely from the serialized step
    DropAll,
    /// Transmit only the listed field paths
    Paths(Vec<FieldPath>),
}

impl StepSelector {
    /// Decode a selector from its JSON surface form.
    ///
    /// Accepted shapes: `true` (keep all), `false` (drop all), or an array
    /// of paths where each path is an array of keys and indices. Any other
    /// shape is an `InvalidSelector` error.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(true) => Ok(Self::KeepAll),
            Value::Bool(false) => Ok(Self::DropAll),
            Value::Array(paths) => {
                let mut decoded = Vec::with_capacity(paths.len());
                for path in paths {
                    decoded.push(decode_path(path)?);
                }
                Ok(Self::Paths(decoded))
            }
            other => Err(PipetraceError::InvalidSelector(format!(
                "expected boolean or array of paths, got {}",
                type_name(other)
            ))),
        }
    }
}

fn decode_path(value: &Value) -> Result<FieldPath> {
    let segments = value.as_array().ok_or_else(|| {
        PipetraceError::InvalidSelector(format!("path must be an array, got {}", type_name(value)))
    })?;

    let mut path = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Value::String(s) => path.push(PathSegment::Key(s.clone())),
            Value::Number(n) => {
                let index = n.as_u64().ok_or_else(|| {
                    PipetraceError::InvalidSelector(format!("invalid array index: {}", n))
                })?;
                path.push(PathSegment::Index(index as usize));
            }
            other => {
                return Err(PipetraceError::InvalidSelector(format!(
                    "path segment must be a key or index, got {}",
                    type_name(other)
                )))
            }
        }
    }
    Ok(path)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Selectors for the three redactable sections of a step.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSelectors {
    pub inputs: StepSelector,
    pub model_params: StepSelector,
    pub outputs: StepSelector,
}

impl Default for SectionSelectors {
    fn default() -> Self {
        Self {
            inputs: StepSelector::KeepAll,
            model_params: StepSelector::KeepAll,
            outputs: StepSelector::KeepAll,
        }
    }
}

impl SectionSelectors {
    /// Keep every section unchanged.
    pub fn keep_all() -> Self {
        Self::default()
    }

    /// Drop every section.
    pub fn drop_all() -> Self {
        Self {
            inputs: StepSelector::DropAll,
            model_params: StepSelector::DropAll,
            outputs: StepSelector::DropAll,
        }
    }

    pub fn with_inputs(mut self, selector: StepSelector) -> Self {
        self.inputs = selector;
        self
    }

    pub fn with_model_params(mut self, selector: StepSelector) -> Self {
        self.model_params = selector;
        self
    }

    pub fn with_outputs(mut self, selector: StepSelector) -> Self {
        self.outputs = selector;
        self
    }

    /// Decode from a JSON object of per-section selectors.
    ///
    /// Missing sections default to keep-all. Unknown keys are rejected so a
    /// typo never silently keeps a field the caller meant to drop.
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            PipetraceError::InvalidSelector(format!(
                "expected object of section selectors, got {}",
                type_name(value)
            ))
        })?;

        let mut selectors = Self::default();
        for (key, selector) in map {
            match key.as_str() {
                "inputs" => selectors.inputs = StepSelector::from_json(selector)?,
                "model_params" => selectors.model_params = StepSelector::from_json(selector)?,
                "outputs" => selectors.outputs = StepSelector::from_json(selector)?,
                other => {
                    return Err(PipetraceError::InvalidSelector(format!(
                        "unknown section: {}",
                        other
                    )))
                }
            }
        }
        Ok(selectors)
    }
}

/// Redaction policy for a whole run.
#[derive(Debug, Clone, PartialEq)]
pub enum RedactionPolicy {
    /// Apply the same selectors to every step
    Uniform(SectionSelectors),
    /// Apply selectors by step index; steps past the end keep everything
    PerStep(Vec<SectionSelectors>),
}

impl RedactionPolicy {
    /// Decode from the JSON surface form: an object (uniform) or an array of
    /// objects (per step index).
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Object(_) => Ok(Self::Uniform(SectionSelectors::from_json(value)?)),
            Value::Array(items) => {
                let mut per_step = Vec::with_capacity(items.len());
                for item in items {
                    per_step.push(SectionSelectors::from_json(item)?);
                }
                Ok(Self::PerStep(per_step))
            }
            other => Err(PipetraceError::InvalidSelector(format!(
                "expected object or array of objects, got {}",
                type_name(other)
            ))),
        }
    }

    fn selectors_for(&self, index: usize) -> Option<&SectionSelectors> {
        match self {
            Self::Uniform(selectors) => Some(selectors),
            Self::PerStep(per_step) => per_step.get(index),
        }
    }

    /// Apply the policy to a serialized run, returning the redacted copy.
    ///
    /// The input value is never mutated. Applying the same policy twice
    /// yields an identical result.
    pub fn apply(&self, payload: &Value) -> Value {
        let mut redacted = payload.clone();

        let steps = match redacted.get_mut("steps").and_then(Value::as_array_mut) {
            Some(steps) => steps,
            None => return redacted,
        };

        for (index, step) in steps.iter_mut().enumerate() {
            let selectors = match self.selectors_for(index) {
                Some(selectors) => selectors,
                None => continue,
            };
            let step = match step.as_object_mut() {
                Some(step) => step,
                None => continue,
            };
            apply_section(step, "inputs", &selectors.inputs);
            apply_section(step, "model_params", &selectors.model_params);
            apply_section(step, "outputs", &selectors.outputs);
        }

        redacted
    }
}

fn apply_section(
    step: &mut serde_json::Map<String, Value>,
    section: &str,
    selector: &StepSelector,
) {
    match selector {
        StepSelector::KeepAll => {}
        StepSelector::DropAll => {
            step.remove(section);
        }
        StepSelector::Paths(paths) => {
            if let Some(value) = step.get(section) {
                let projected = project(value, paths);
                step.insert(section.to_string(), projected);
            }
        }
    }
}

/// Rebuild a value containing only the addressed leaves, preserving the
/// container shapes along each path. A path that does not resolve simply
/// contributes nothing.
fn project(src: &Value, paths: &[FieldPath]) -> Value {
    // An exhausted path selects the whole remaining subtree.
    if paths.iter().any(|p| p.is_empty()) {
        return src.clone();
    }

    match src {
        Value::Object(map) => {
            let mut grouped: BTreeMap<&str, Vec<FieldPath>> = BTreeMap::new();
            for path in paths {
                if let PathSegment::Key(key) = &path[0] {
                    if map.contains_key(key) {
                        grouped.entry(key).or_default().push(path[1..].to_vec());
                    }
                }
            }

            let mut out = serde_json::Map::new();
            for (key, tails) in grouped {
                out.insert(key.to_string(), project(&map[key], &tails));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let mut grouped: BTreeMap<usize, Vec<FieldPath>> = BTreeMap::new();
            for path in paths {
                if let Some(index) = path[0].as_array_index() {
                    if index < items.len() {
                        grouped.entry(index).or_default().push(path[1..].to_vec());
                    }
                }
            }

            Value::Array(
                grouped
                    .into_iter()
                    .map(|(index, tails)| project(&items[index], &tails))
                    .collect(),
            )
        }
        // A scalar has no sub-fields to select.
        _ => Value::Null,
    }
}
