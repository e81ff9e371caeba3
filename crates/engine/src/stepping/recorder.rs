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

//! Capture of the data flowing into and out of pipeline elements.

use std::fmt::Debug;

use parking_lot::Mutex;
use stepper_common::TextRange;

use crate::error::RecorderError;

/// A capture sink attached to one side of a pipeline element.
pub trait Recorder: Debug + Send + Sync {
    /// Data captured for the current record, `None` when nothing was captured.
    fn data(&self, highlight: Option<&TextRange>) -> Result<Option<String>, RecorderError>;

    /// Forget the data of the current record.
    fn clear(&self, highlight: Option<&TextRange>);
}

/// What a [`BufferRecorder`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    /// Everything written since the last clear
    Record,
    /// The whole text of the part, read back through the highlight of the record
    Source,
}

/// [`Recorder`] backed by an in-memory byte buffer.
#[derive(Debug)]
pub struct BufferRecorder {
    mode: RecordMode,
    buffer: Mutex<Vec<u8>>,
}

impl BufferRecorder {
    /// An empty recorder.
    pub fn new(mode: RecordMode) -> Self {
        Self { mode, buffer: Mutex::new(Vec::new()) }
    }

    /// Append bytes.
    pub fn write(&self, bytes: &[u8]) {
        self.buffer.lock().extend_from_slice(bytes);
    }

    /// Replace the buffer with the text of a new part.
    pub fn set_source(&self, text: &str) {
        let mut buffer = self.buffer.lock();
        buffer.clear();
        buffer.extend_from_slice(text.as_bytes());
    }

    /// Drop everything held, whatever the mode.
    pub fn reset(&self) {
        self.buffer.lock().clear();
    }
}

impl Recorder for BufferRecorder {
    fn data(&self, highlight: Option<&TextRange>) -> Result<Option<String>, RecorderError> {
        let buffer = self.buffer.lock();
        if buffer.is_empty() {
            return Ok(None);
        }

        let text = String::from_utf8(buffer.clone())?;
        match (self.mode, highlight) {
            (RecordMode::Source, Some(range)) => Ok(Some(extract_range(&text, range))),
            _ => Ok(Some(text)),
        }
    }

    fn clear(&self, _highlight: Option<&TextRange>) {
        // The source of a part stays until the next part replaces it.
        if self.mode == RecordMode::Record {
            self.buffer.lock().clear();
        }
    }
}

/// The text covered by `range`; lines and columns are 1-based and inclusive.
pub fn extract_range(text: &str, range: &TextRange) -> String {
    let mut extracted = String::new();
    for (index, line) in text.split('\n').enumerate() {
        let line_no = index as i32 + 1;
        if line_no < range.from.line_no {
            continue;
        }
        if line_no > range.to.line_no {
            break;
        }

        let chars: Vec<char> = line.chars().collect();
        let start = if line_no == range.from.line_no { range.from.col_no.max(1) as usize - 1 } else { 0 };
        let end = if line_no == range.to.line_no {
            (range.to.col_no.max(0) as usize).min(chars.len())
        } else {
            chars.len()
        };

        if line_no > range.from.line_no {
            extracted.push('\n');
        }
        if start < end {
            extracted.extend(&chars[start..end]);
        }
    }
    extracted
}

#[cfg(test)]
mod tests {
    use stepper_common::Location;
    use tracing::info;

    use super::*;

    #[test]
    fn test_record_mode_clears() {
        stepper_common::logging::ensure_test_logging(None);
        info!("Testing record mode recorder");

        let recorder = BufferRecorder::new(RecordMode::Record);
        assert_eq!(recorder.data(None).unwrap(), None);

        recorder.write(b"hello ");
        recorder.write(b"world");
        assert_eq!(recorder.data(None).unwrap().as_deref(), Some("hello world"));

        recorder.clear(None);
        assert_eq!(recorder.data(None).unwrap(), None);
    }

    #[test]
    fn test_source_mode_reads_through_highlight() {
        stepper_common::logging::ensure_test_logging(None);
        info!("Testing source mode recorder");

        let recorder = BufferRecorder::new(RecordMode::Source);
        recorder.set_source("alpha\nbeta\ngamma");
        let second = TextRange::new(Location::new(2, 1), Location::new(2, 4));

        assert_eq!(recorder.data(Some(&second)).unwrap().as_deref(), Some("beta"));
        assert_eq!(recorder.data(None).unwrap().as_deref(), Some("alpha\nbeta\ngamma"));

        recorder.clear(Some(&second));
        assert_eq!(recorder.data(Some(&second)).unwrap().as_deref(), Some("beta"));

        recorder.reset();
        assert_eq!(recorder.data(Some(&second)).unwrap(), None);
    }

    #[test]
    fn test_invalid_text_is_an_error() {
        stepper_common::logging::ensure_test_logging(None);
        info!("Testing recorder read failure");

        let recorder = BufferRecorder::new(RecordMode::Record);
        recorder.write(&[0xff, 0xfe]);
        assert!(matches!(recorder.data(None), Err(RecorderError::InvalidText(_))));
    }

    #[test]
    fn test_extract_range() {
        stepper_common::logging::ensure_test_logging(None);
        info!("Testing text range extraction");

        let text = "one\ntwo three\nfour";
        let range = |from: (i32, i32), to: (i32, i32)| {
            TextRange::new(Location::new(from.0, from.1), Location::new(to.0, to.1))
        };

        assert_eq!(extract_range(text, &range((1, 1), (1, 3))), "one");
        assert_eq!(extract_range(text, &range((2, 5), (2, 9))), "three");
        assert_eq!(extract_range(text, &range((1, 2), (2, 3))), "ne\ntwo");
        assert_eq!(extract_range(text, &range((3, 1), (3, 100))), "four");
        assert_eq!(extract_range(text, &range((9, 1), (9, 2))), "");
    }
}
