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

//! Argument parsing and result rendering for the stepper binary

use std::{collections::BTreeMap, fmt::Write};

use eyre::{eyre, Result};
use stepper_common::{
    MatchType, OutputFilter, OutputState, Severity, SharedStepData, StepResult,
    SteppingFilterSettings,
};

use crate::FilterArgs;

/// Split `KEY=VALUE`, keeping any further `=` in the value.
pub fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

/// Build per-element filter settings from the command line.
pub fn filter_map(args: &FilterArgs) -> Result<BTreeMap<String, SteppingFilterSettings>> {
    let mut filters: BTreeMap<String, SteppingFilterSettings> = BTreeMap::new();

    for (element, level) in &args.severity {
        let severity: Severity = level.parse().map_err(|e: String| eyre!(e))?;
        filters.entry(element.clone()).or_default().skip_to_severity = Some(severity);
    }
    for (element, state) in &args.output {
        let state: OutputState = state.parse().map_err(|e: String| eyre!(e))?;
        filters.entry(element.clone()).or_default().skip_to_output = Some(state);
    }

    let value_filter = |match_type: MatchType, value: &str| {
        let filter = OutputFilter::new(match_type).with_value(value);
        if args.ignore_case {
            filter.ignoring_case()
        } else {
            filter
        }
    };
    for (element, value) in &args.contains {
        filters.entry(element.clone()).or_default().filters.push(value_filter(MatchType::Contains, value));
    }
    for (element, value) in &args.equals {
        filters.entry(element.clone()).or_default().filters.push(value_filter(MatchType::Equals, value));
    }
    for (element, path) in &args.unique {
        if !path.starts_with('/') {
            return Err(eyre!("unique path '{}' must be a JSON pointer starting with '/'", path));
        }
        filters
            .entry(element.clone())
            .or_default()
            .filters
            .push(OutputFilter::new(MatchType::Unique).with_path(path));
    }

    Ok(filters)
}

/// Human readable rendering of a step result.
///
/// With `element` set only that element's output is shown.
pub fn render_result(result: &StepResult, element: Option<&str>) -> String {
    let mut out = String::new();

    match (&result.step_location, result.found_record) {
        (Some(location), true) => {
            let _ = writeln!(out, "record {location}");
        }
        _ if !result.complete => {
            let progress = result
                .progress_location
                .map(|location| location.to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(out, "incomplete, searched up to {progress}");
        }
        _ => {
            let _ = writeln!(out, "no record found");
        }
    }

    if let Some(data) = &result.step_data {
        render_step_data(&mut out, data, element);
    }

    for error in &result.general_errors {
        let _ = writeln!(out, "error: {error}");
    }
    if result.segmented_data {
        let _ = writeln!(out, "note: part is segmented");
    }

    out
}

fn render_step_data(out: &mut String, data: &SharedStepData, element: Option<&str>) {
    if let Some(id) = element {
        if let Some(output) = data.element(id).and_then(|e| e.output.as_deref()) {
            let _ = writeln!(out, "  {output}");
        }
        return;
    }

    for (id, element) in &data.element_map {
        let _ = writeln!(out, "  [{id}] {}", element.element_type);
        if let Some(input) = &element.input {
            let _ = writeln!(out, "    in:  {input}");
        }
        if let Some(output) = &element.output {
            let _ = writeln!(out, "    out: {output}");
        }
        if let Some(indicators) = &element.indicators {
            for error in &indicators.error_list {
                let _ = writeln!(out, "    {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use stepper_common::{SharedElementData, StepLocation};

    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("out=a=b").unwrap(), ("out".to_string(), "a=b".to_string()));
        assert_eq!(parse_assignment("out=").unwrap(), ("out".to_string(), String::new()));
        assert!(parse_assignment("out").is_err());
        assert!(parse_assignment("=value").is_err());
    }

    #[test]
    fn test_filter_map() {
        let args = FilterArgs {
            severity: vec![("parse".to_string(), "error".to_string())],
            contains: vec![("out".to_string(), "Alice".to_string())],
            unique: vec![("out".to_string(), "/user".to_string())],
            ignore_case: true,
            ..Default::default()
        };

        let filters = filter_map(&args).unwrap();

        assert_eq!(filters["parse"].skip_to_severity, Some(Severity::Error));
        let out = &filters["out"];
        assert_eq!(out.filters.len(), 2);
        assert!(out.filters[0].ignore_case);
        assert_eq!(out.filters[1].match_type, MatchType::Unique);
        assert_eq!(out.filters[1].path.as_deref(), Some("/user"));
    }

    #[test]
    fn test_filter_map_rejects_bad_values() {
        let args = FilterArgs {
            severity: vec![("parse".to_string(), "loud".to_string())],
            ..Default::default()
        };
        assert!(filter_map(&args).is_err());

        let args = FilterArgs {
            unique: vec![("out".to_string(), "user".to_string())],
            ..Default::default()
        };
        assert!(filter_map(&args).is_err());
    }

    #[test]
    fn test_render_result() {
        let mut data = SharedStepData::default();
        data.element_map.insert(
            "out".to_string(),
            SharedElementData {
                element_type: "writer".to_string(),
                output: Some("HELLO".to_string()),
                ..Default::default()
            },
        );
        let result = StepResult {
            step_location: Some(StepLocation::new(1, 1, 2)),
            step_data: Some(data),
            found_record: true,
            complete: true,
            ..Default::default()
        };

        let rendered = render_result(&result, None);
        assert!(rendered.starts_with("record 1:1:2"));
        assert!(rendered.contains("out: HELLO"));
        assert_eq!(render_result(&result, Some("out")), "record 1:1:2\n  HELLO\n");

        let incomplete = StepResult {
            progress_location: Some(StepLocation::new(3, 1, 7)),
            ..Default::default()
        };
        assert_eq!(render_result(&incomplete, None), "incomplete, searched up to 3:1:7\n");
    }
}
