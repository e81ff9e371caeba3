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

//! Line-oriented text pipeline.
//!
//! The first element must be a `splitter`, which cuts the decoded part into
//! records on a delimiter (newline by default). Every record then flows through
//! the remaining elements in order:
//!
//! | type        | properties                       | behaviour                                   |
//! |-------------|----------------------------------|---------------------------------------------|
//! | `uppercase` |                                  | upper-cases the text                        |
//! | `lowercase` |                                  | lower-cases the text                        |
//! | `trim`      |                                  | strips surrounding whitespace               |
//! | `replace`   | `from`, `to`                     | replaces every occurrence of `from`         |
//! | `key_value` | `pair_delimiter`, `separator`    | turns `a=1,b=2` into a JSON object          |
//! | `require`   | `field` (optional)               | raises ERROR when the text or field is missing |
//! | `writer`    |                                  | passes the text through                     |

use std::sync::Arc;

use serde_json::{Map, Value};
use stepper_common::{Location, Severity, TextRange};
use tracing::{debug, trace};

use super::{
    ElementDefinition, Pipeline, PipelineDefinition, PipelineFactory, PipelineInstance,
    RecordBoundaryCallback,
};
use crate::{
    diagnostics::ErrorReceiver,
    error::{ProcessingError, SteppingError},
    stepping::{
        monitor::ElementMonitor,
        recorder::{BufferRecorder, RecordMode},
    },
    store::SegmentInputStream,
};

const SPLITTER: &str = "splitter";

#[derive(Debug, Clone)]
enum Transform {
    Uppercase,
    Lowercase,
    Trim,
    Replace { from: Option<String>, to: String },
    KeyValue { pair_delimiter: String, separator: String },
    Require { field: Option<String> },
    Writer,
}

impl Transform {
    fn parse(element: &ElementDefinition) -> Option<Self> {
        let property = |name: &str| element.property(name).map(str::to_string);
        let transform = match element.element_type.as_str() {
            "uppercase" => Self::Uppercase,
            "lowercase" => Self::Lowercase,
            "trim" => Self::Trim,
            "replace" => {
                Self::Replace { from: property("from"), to: property("to").unwrap_or_default() }
            }
            "key_value" => Self::KeyValue {
                pair_delimiter: property("pair_delimiter").unwrap_or_else(|| ",".to_string()),
                separator: property("separator").unwrap_or_else(|| "=".to_string()),
            },
            "require" => Self::Require { field: property("field") },
            "writer" => Self::Writer,
            _ => return None,
        };
        Some(transform)
    }

    fn formats_output(&self) -> bool {
        matches!(self, Self::KeyValue { .. })
    }
}

#[derive(Debug)]
struct TextElement {
    id: String,
    transform: Transform,
    input: Arc<BufferRecorder>,
    output: Arc<BufferRecorder>,
}

impl TextElement {
    fn apply(&self, text: String, location: Location, errors: &dyn ErrorReceiver) -> String {
        match &self.transform {
            Transform::Uppercase => text.to_uppercase(),
            Transform::Lowercase => text.to_lowercase(),
            Transform::Trim => text.trim().to_string(),
            Transform::Replace { from: Some(from), to } if !from.is_empty() => text.replace(from, to),
            Transform::Replace { .. } => text,
            Transform::KeyValue { pair_delimiter, separator } => {
                let mut object = Map::new();
                for pair in text.split(pair_delimiter.as_str()).map(str::trim).filter(|p| !p.is_empty()) {
                    match pair.split_once(separator.as_str()) {
                        Some((key, value)) => {
                            object.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
                        }
                        None => errors.log(
                            Severity::Warning,
                            Some(location),
                            &self.id,
                            &format!("Ignoring '{pair}' as it has no '{separator}'"),
                        ),
                    }
                }
                Value::Object(object).to_string()
            }
            Transform::Require { field } => {
                let missing = match field {
                    None => text.trim().is_empty(),
                    Some(field) => serde_json::from_str::<Value>(&text)
                        .ok()
                        .and_then(|json| json.get(field).cloned())
                        .is_none_or(|value| value.is_null() || value.as_str() == Some("")),
                };
                if missing {
                    let message = match field {
                        Some(field) => format!("Required field '{field}' is missing"),
                        None => "Required text is missing".to_string(),
                    };
                    errors.log(Severity::Error, Some(location), &self.id, &message);
                }
                text
            }
            Transform::Writer => text,
        }
    }
}

/// Pipeline over delimited text records.
#[derive(Debug)]
pub struct TextPipeline {
    name: String,
    splitter_id: String,
    delimiter: String,
    source: Arc<BufferRecorder>,
    records: Arc<BufferRecorder>,
    elements: Vec<TextElement>,
    errors: Arc<dyn ErrorReceiver>,
}

impl TextPipeline {
    fn decode(&self, input: &SegmentInputStream, encoding: &str) -> Result<String, ProcessingError> {
        match encoding.to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => String::from_utf8(input.bytes().to_vec()).map_err(|e| {
                let message = format!("Unable to decode input as {encoding}: {e}");
                self.errors.log(Severity::Fatal, None, &self.splitter_id, &message);
                ProcessingError::Logged(message)
            }),
            "ISO-8859-1" | "LATIN1" | "LATIN-1" => {
                Ok(input.bytes().iter().map(|byte| char::from(*byte)).collect())
            }
            _ => Err(ProcessingError::Runtime(format!("Unsupported encoding '{encoding}'"))),
        }
    }
}

impl Pipeline for TextPipeline {
    fn start_processing(&mut self) -> Result<(), ProcessingError> {
        debug!(pipeline = %self.name, "starting pipeline");
        if self.delimiter.is_empty() {
            self.errors.log(Severity::Error, None, &self.splitter_id, "Delimiter must not be empty");
        }
        for element in &self.elements {
            if let Transform::Replace { from: None, .. } = element.transform {
                self.errors.log(Severity::Error, None, &element.id, "Property 'from' is required");
            }
        }
        Ok(())
    }

    fn process(
        &mut self,
        input: &SegmentInputStream,
        encoding: &str,
        callback: &mut dyn RecordBoundaryCallback,
    ) -> Result<(), ProcessingError> {
        let text = self.decode(input, encoding)?;
        self.source.set_source(&text);

        for (index, (record, highlight)) in split_records(&text, &self.delimiter).into_iter().enumerate() {
            let record_index = index as i64 + 1;
            trace!(pipeline = %self.name, record_index, "processing record");

            self.records.write(record.as_bytes());
            let mut current = record;
            for element in &self.elements {
                element.input.write(current.as_bytes());
                current = element.apply(current, highlight.from, self.errors.as_ref());
                element.output.write(current.as_bytes());
            }

            if callback.end_record(record_index, Some(highlight)) {
                trace!(pipeline = %self.name, record_index, "stopping at callback request");
                break;
            }
        }
        Ok(())
    }

    fn end_processing(&mut self) -> Result<(), ProcessingError> {
        debug!(pipeline = %self.name, "ending pipeline");
        self.source.reset();
        self.records.reset();
        for element in &self.elements {
            element.input.reset();
            element.output.reset();
        }
        Ok(())
    }
}

/// Cut `text` into non-empty records with their 1-based line/column ranges.
fn split_records(text: &str, delimiter: &str) -> Vec<(String, TextRange)> {
    if delimiter.is_empty() {
        return Vec::new();
    }

    let mut records = Vec::new();
    let mut line_no = 1;
    let mut col_no = 0;
    for piece in text.split(delimiter) {
        let mut from = None;
        let mut to = Location::new(line_no, col_no);
        for ch in piece.chars() {
            if ch == '\n' {
                line_no += 1;
                col_no = 0;
                continue;
            }
            col_no += 1;
            to = Location::new(line_no, col_no);
            from.get_or_insert(to);
        }

        let record = piece.strip_suffix('\r').unwrap_or(piece);
        if let (Some(from), false) = (from, record.trim().is_empty()) {
            records.push((record.to_string(), TextRange::new(from, to)));
        }

        for ch in delimiter.chars() {
            if ch == '\n' {
                line_no += 1;
                col_no = 0;
            } else {
                col_no += 1;
            }
        }
    }
    records
}

/// Builds [`TextPipeline`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextPipelineFactory;

impl PipelineFactory for TextPipelineFactory {
    fn create(
        &self,
        definition: &PipelineDefinition,
        errors: Arc<dyn ErrorReceiver>,
    ) -> Result<PipelineInstance, SteppingError> {
        let construction_error = |message: String| SteppingError::PipelineConstruction {
            name: definition.name.clone(),
            message,
        };

        let (splitter, rest) = match definition.elements.split_first() {
            Some((first, rest)) if first.element_type == SPLITTER => (Some(first), rest),
            _ => (None, definition.elements.as_slice()),
        };

        let source = Arc::new(BufferRecorder::new(RecordMode::Source));
        let records = Arc::new(BufferRecorder::new(RecordMode::Record));
        let mut monitors = Vec::new();
        if let Some(splitter) = splitter {
            let mut monitor = ElementMonitor::new(&splitter.id, SPLITTER);
            monitor.register_input_recorder(source.clone());
            monitor.register_output_recorder(records.clone());
            monitors.push(monitor);
        }

        let mut elements = Vec::with_capacity(rest.len());
        for element in rest {
            if element.element_type == SPLITTER {
                return Err(construction_error(format!(
                    "splitter '{}' must be the first element",
                    element.id
                )));
            }
            let transform = Transform::parse(element).ok_or_else(|| {
                construction_error(format!(
                    "unknown element type '{}' for '{}'",
                    element.element_type, element.id
                ))
            })?;

            let input = Arc::new(BufferRecorder::new(RecordMode::Record));
            let output = Arc::new(BufferRecorder::new(RecordMode::Record));
            let mut monitor = ElementMonitor::new(&element.id, &element.element_type)
                .with_formatting(false, transform.formats_output());
            monitor.register_input_recorder(input.clone());
            monitor.register_output_recorder(output.clone());
            monitors.push(monitor);

            elements.push(TextElement { id: element.id.clone(), transform, input, output });
        }

        debug!(pipeline = %definition.name, elements = monitors.len(), "created text pipeline");
        let pipeline = TextPipeline {
            name: definition.name.clone(),
            splitter_id: splitter.map(|s| s.id.clone()).unwrap_or_default(),
            delimiter: splitter.and_then(|s| s.property("delimiter")).unwrap_or("\n").to_string(),
            source,
            records,
            elements,
            errors,
        };

        Ok(PipelineInstance {
            pipeline: Box::new(pipeline),
            monitors,
            has_record_detector: splitter.is_some(),
        })
    }
}
