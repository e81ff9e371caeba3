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

//! Diagnostic markers collected for pipeline elements.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Location;

/// Maximum number of distinct errors an [`Indicators`] set retains; counts stay exact.
pub const MAX_STORED_ERRORS: usize = 100;

/// Severity of a diagnostic, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Severity {
    /// Informational message
    #[serde(rename = "INFO")]
    Info,
    /// Something looks wrong but processing carried on
    #[serde(rename = "WARN")]
    Warning,
    /// The record could not be processed correctly
    #[serde(rename = "ERROR")]
    Error,
    /// Processing could not continue
    #[serde(rename = "FATAL")]
    Fatal,
}

impl Severity {
    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "FATAL" => Ok(Self::Fatal),
            _ => Err(format!("unknown severity '{s}'")),
        }
    }
}

/// A single diagnostic raised by a pipeline element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredError {
    /// How bad it is
    pub severity: Severity,
    /// Where in the input it was raised, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Element that raised it
    pub element_id: String,
    /// Message text
    pub message: String,
}

impl fmt::Display for StoredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(
                f,
                "{} [{}] {}: {}",
                self.severity, location, self.element_id, self.message
            ),
            None => write!(f, "{} {}: {}", self.severity, self.element_id, self.message),
        }
    }
}

/// The diagnostics collected for one element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicators {
    /// Number of diagnostics seen per severity
    pub error_count: BTreeMap<Severity, usize>,
    /// Distinct diagnostics, oldest first, capped at [`MAX_STORED_ERRORS`]
    pub error_list: Vec<StoredError>,
}

impl Indicators {
    /// Empty indicator set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic.
    pub fn add(&mut self, error: StoredError) {
        *self.error_count.entry(error.severity).or_default() += 1;

        if self.error_list.len() < MAX_STORED_ERRORS && !self.error_list.contains(&error) {
            self.error_list.push(error);
        }
    }

    /// Highest severity seen, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.error_count.iter().filter(|(_, count)| **count > 0).map(|(s, _)| *s).max()
    }

    /// Number of diagnostics of the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.error_count.get(&severity).copied().unwrap_or_default()
    }

    /// Whether no diagnostic has been recorded.
    pub fn is_empty(&self) -> bool {
        self.error_count.values().all(|count| *count == 0)
    }

    /// Merge two optional indicator sets, keeping the errors of `first` ahead of `second`.
    pub fn combine(first: Option<&Self>, second: Option<&Self>) -> Option<Self> {
        match (first, second) {
            (None, None) => None,
            (Some(one), None) | (None, Some(one)) => Some(one.clone()),
            (Some(first), Some(second)) => {
                let mut combined = first.clone();
                for (severity, count) in &second.error_count {
                    *combined.error_count.entry(*severity).or_default() += count;
                }
                for error in &second.error_list {
                    if combined.error_list.len() >= MAX_STORED_ERRORS {
                        break;
                    }
                    if !combined.error_list.contains(error) {
                        combined.error_list.push(error.clone());
                    }
                }
                Some(combined)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(severity: Severity, message: &str) -> StoredError {
        StoredError {
            severity,
            location: Some(Location::new(1, 1)),
            element_id: "parser".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_severity_ordering_and_parsing() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Error < Severity::Fatal);
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("Warning".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("FATAL".parse::<Severity>().unwrap(), Severity::Fatal);
        assert!("loud".parse::<Severity>().is_err());
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"WARN\"");
    }

    #[test]
    fn test_add_counts_every_error_but_stores_distinct_ones() {
        let mut indicators = Indicators::new();
        assert!(indicators.is_empty());
        assert_eq!(indicators.max_severity(), None);

        indicators.add(error(Severity::Warning, "odd"));
        indicators.add(error(Severity::Warning, "odd"));
        indicators.add(error(Severity::Error, "bad"));

        assert_eq!(indicators.count(Severity::Warning), 2);
        assert_eq!(indicators.count(Severity::Error), 1);
        assert_eq!(indicators.error_list.len(), 2);
        assert_eq!(indicators.max_severity(), Some(Severity::Error));
    }

    #[test]
    fn test_stored_errors_are_capped() {
        let mut indicators = Indicators::new();
        for i in 0..(MAX_STORED_ERRORS + 10) {
            indicators.add(error(Severity::Info, &format!("message {i}")));
        }
        assert_eq!(indicators.error_list.len(), MAX_STORED_ERRORS);
        assert_eq!(indicators.count(Severity::Info), MAX_STORED_ERRORS + 10);
    }

    #[test]
    fn test_combine() {
        let mut first = Indicators::new();
        first.add(error(Severity::Warning, "start"));
        let mut second = Indicators::new();
        second.add(error(Severity::Fatal, "record"));
        second.add(error(Severity::Warning, "start"));

        assert_eq!(Indicators::combine(None, None), None);
        assert_eq!(Indicators::combine(Some(&first), None), Some(first.clone()));
        assert_eq!(Indicators::combine(None, Some(&second)), Some(second.clone()));

        let combined = Indicators::combine(Some(&first), Some(&second)).unwrap();
        assert_eq!(combined.count(Severity::Warning), 2);
        assert_eq!(combined.count(Severity::Fatal), 1);
        assert_eq!(combined.error_list.len(), 2);
        assert_eq!(combined.error_list[0].message, "start");
        assert_eq!(combined.max_severity(), Some(Severity::Fatal));
    }
}
