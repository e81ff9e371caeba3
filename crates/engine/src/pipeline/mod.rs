// Stepper - Pipeline Stepping Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Pipelines the stepper can drive.
//!
//! A pipeline is built from a [`PipelineDefinition`] by a [`PipelineFactory`].
//! Building yields a [`PipelineInstance`]: the runnable [`Pipeline`] plus one
//! [`ElementMonitor`] per element whose data the stepper can show. While
//! processing a part, the pipeline calls
//! [`RecordBoundaryCallback::end_record`] after every record and stops as soon
//! as the callback asks it to.

mod text;

pub use text::{TextPipeline, TextPipelineFactory};

use std::{collections::BTreeMap, fs, path::Path, sync::Arc};

use eyre::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use stepper_common::{PipelineRef, TextRange};

use crate::{
    diagnostics::ErrorReceiver,
    error::{ProcessingError, SteppingError},
    stepping::monitor::ElementMonitor,
    store::SegmentInputStream,
};

/// Notified by a pipeline at the end of every record.
pub trait RecordBoundaryCallback {
    /// Record `record_index` (1-based within the part) has been processed.
    ///
    /// Returns `true` when the pipeline should stop processing the part.
    fn end_record(&mut self, record_index: i64, highlight: Option<TextRange>) -> bool;
}

/// A runnable pipeline.
pub trait Pipeline: Send {
    /// Prepare for processing. Problems are reported to the error receiver.
    fn start_processing(&mut self) -> Result<(), ProcessingError>;

    /// Feed one part through the pipeline.
    fn process(
        &mut self,
        input: &SegmentInputStream,
        encoding: &str,
        callback: &mut dyn RecordBoundaryCallback,
    ) -> Result<(), ProcessingError>;

    /// Release everything the pipeline holds.
    fn end_processing(&mut self) -> Result<(), ProcessingError>;
}

/// A pipeline together with the monitors of its elements.
pub struct PipelineInstance {
    /// The pipeline
    pub pipeline: Box<dyn Pipeline>,
    /// One monitor per steppable element, in pipeline order
    pub monitors: Vec<ElementMonitor>,
    /// Whether the pipeline splits its input into records
    pub has_record_detector: bool,
}

impl PipelineInstance {
    /// Whether the stepper can drive this pipeline.
    pub fn is_steppable(&self) -> bool {
        self.has_record_detector && !self.monitors.is_empty()
    }
}

/// Builds pipelines.
pub trait PipelineFactory: Send + Sync {
    /// Build `definition`, reporting diagnostics to `errors`.
    fn create(
        &self,
        definition: &PipelineDefinition,
        errors: Arc<dyn ErrorReceiver>,
    ) -> Result<PipelineInstance, SteppingError>;
}

/// One element of a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDefinition {
    /// Unique id within the pipeline
    pub id: String,
    /// Element type, e.g. `splitter`
    #[serde(rename = "type")]
    pub element_type: String,
    /// Element properties
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl ElementDefinition {
    /// An element with no properties.
    pub fn new(id: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self { id: id.into(), element_type: element_type.into(), properties: BTreeMap::new() }
    }

    /// Set a property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// A property value.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// A named, ordered list of elements.
///
/// Definitions are written in TOML:
///
/// ```toml
/// name = "events"
///
/// [[elements]]
/// id = "split"
/// type = "splitter"
///
/// [[elements]]
/// id = "parse"
/// type = "key_value"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name
    pub name: String,
    /// Elements in processing order
    #[serde(default)]
    pub elements: Vec<ElementDefinition>,
}

impl PipelineDefinition {
    /// An empty pipeline.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), elements: Vec::new() }
    }

    /// Append an element.
    pub fn with_element(mut self, element: ElementDefinition) -> Self {
        self.elements.push(element);
        self
    }

    /// Parse a TOML definition.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse pipeline definition as TOML")
    }

    /// Read a TOML definition from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {:?}", path))?;
        Self::from_toml(&content)
    }

    /// Reference to this pipeline.
    pub fn reference(&self) -> PipelineRef {
        PipelineRef::new(&self.name)
    }
}

/// Resolves pipeline references.
pub trait PipelineStore: Send + Sync {
    /// The definition `pipeline` refers to.
    fn read(&self, pipeline: &PipelineRef) -> Result<PipelineDefinition, SteppingError>;
}

/// [`PipelineStore`] holding definitions in memory.
#[derive(Debug, Default)]
pub struct MemoryPipelineStore {
    definitions: RwLock<BTreeMap<String, PipelineDefinition>>,
}

impl MemoryPipelineStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a definition, returning its reference.
    pub fn add(&self, definition: PipelineDefinition) -> PipelineRef {
        let reference = definition.reference();
        self.definitions.write().insert(definition.name.clone(), definition);
        reference
    }
}

impl PipelineStore for MemoryPipelineStore {
    fn read(&self, pipeline: &PipelineRef) -> Result<PipelineDefinition, SteppingError> {
        self.definitions.read().get(pipeline.name()).cloned().ok_or_else(|| {
            SteppingError::PipelineConstruction {
                name: pipeline.name().to_string(),
                message: "no such pipeline".to_string(),
            }
        })
    }
}
