//! Section numbering and TOC entries.
//!
//! Labels come from a per-level counter: advancing to level L pads the counter
//! with zeros up to L, truncates it to exactly L entries and bumps the last
//! one. TOC entries are derived from a header once, when it is added, and are
//! never recomputed.

use serde::{Deserialize, Serialize};

use docforge_markdown::heading_anchor;
use docforge_shared::{DocForgeError, Result};

/// Deepest supported header level.
pub const HEADER_MAX_LEVEL: u8 = 6;

// ---------------------------------------------------------------------------
// SectionCounter
// ---------------------------------------------------------------------------

/// Hierarchical section counter, e.g. `[2, 3]` while inside section 2.3.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionCounter {
    levels: Vec<u32>,
}

impl SectionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to a header at `level` and return its label (`"1.2.1"`).
    ///
    /// Fails without touching the counter if `level` is outside `1..=6`.
    pub fn advance(&mut self, level: u8) -> Result<String> {
        check_level(level)?;

        let depth = usize::from(level);
        if self.levels.len() < depth {
            self.levels.resize(depth, 0);
        }
        self.levels.truncate(depth);
        if let Some(last) = self.levels.last_mut() {
            *last += 1;
        }

        Ok(self.label())
    }

    /// Current counter entries joined with `.`.
    pub fn label(&self) -> String {
        self.levels
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn levels(&self) -> &[u32] {
        &self.levels
    }
}

/// Validate a header level against `1..=HEADER_MAX_LEVEL`.
pub fn check_level(level: u8) -> Result<()> {
    if level == 0 {
        return Err(DocForgeError::validation("Header level must be at least 1."));
    }
    if level > HEADER_MAX_LEVEL {
        return Err(DocForgeError::validation(format!(
            "Header level cannot exceed {HEADER_MAX_LEVEL}."
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TocEntry
// ---------------------------------------------------------------------------

/// One line of the table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Numbered header text, e.g. `"1.1 Details"`.
    pub label: String,
    /// Indent depth (`level - 1`).
    pub depth: usize,
    /// Link target, e.g. `"11-details"`.
    pub anchor: String,
}

impl TocEntry {
    /// Derive the entry for a numbered header at `level`.
    pub fn for_header(header_text: &str, level: u8) -> Self {
        Self {
            label: header_text.to_string(),
            depth: usize::from(level.saturating_sub(1)),
            anchor: heading_anchor(header_text),
        }
    }

    /// Markdown list line: `"  - [1.1 Details](#11-details)"`.
    pub fn markdown_line(&self) -> String {
        format!(
            "{}- [{}](#{})",
            "  ".repeat(self.depth),
            self.label,
            self.anchor
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(levels: &[u8]) -> Vec<String> {
        let mut counter = SectionCounter::new();
        levels.iter().map(|l| counter.advance(*l).unwrap()).collect()
    }

    #[test]
    fn sibling_and_nested_numbering() {
        assert_eq!(labels(&[1, 2, 2, 1, 2]), ["1", "1.1", "1.2", "2", "2.1"]);
    }

    #[test]
    fn deeper_counters_are_discarded_on_return() {
        assert_eq!(
            labels(&[1, 2, 3, 3, 2, 3]),
            ["1", "1.1", "1.1.1", "1.1.2", "1.2", "1.2.1"]
        );
    }

    #[test]
    fn skipped_levels_are_zero_padded() {
        assert_eq!(labels(&[3]), ["0.0.1"]);
        assert_eq!(labels(&[1, 4, 2]), ["1", "1.0.0.1", "1.1"]);
    }

    #[test]
    fn invalid_levels_leave_counter_untouched() {
        let mut counter = SectionCounter::new();
        counter.advance(1).unwrap();
        counter.advance(2).unwrap();

        for level in [0, 7, 200] {
            let err = counter.advance(level).unwrap_err();
            assert!(matches!(err, DocForgeError::Validation { .. }));
        }
        assert_eq!(counter.levels(), &[1, 1]);
        assert_eq!(counter.advance(2).unwrap(), "1.2");
    }

    #[test]
    fn every_supported_level_succeeds() {
        for level in 1..=HEADER_MAX_LEVEL {
            assert!(SectionCounter::new().advance(level).is_ok());
        }
    }

    #[test]
    fn max_level_message() {
        let err = check_level(7).unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error: Header level cannot exceed 6."
        );
    }

    #[test]
    fn entry_line_format() {
        let entry = TocEntry::for_header("1 Intro", 1);
        assert_eq!(entry.depth, 0);
        assert_eq!(entry.markdown_line(), "- [1 Intro](#1-intro)");

        let nested = TocEntry::for_header("1.2.1 Deep Dive", 3);
        assert_eq!(nested.markdown_line(), "    - [1.2.1 Deep Dive](#121-deep-dive)");
    }
}
