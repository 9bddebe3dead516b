use serde::{Deserialize, Serialize};

use crate::format::InputFormat;
use crate::outcome::Outcome;
use crate::overlay::OptionsOverlay;

/// One row of the matrix: a format, its option overlay, and the expected
/// outcome.
///
/// The format is kept as the identifier the case was declared with and only
/// resolved when the case runs, so an unsupported format surfaces as that
/// case's configuration failure rather than breaking the whole matrix load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OptionsOverlay>,
    #[serde(default)]
    pub expected: Outcome,
}

impl TestCase {
    pub fn new(name: impl Into<String>, format: InputFormat) -> Self {
        Self::with_format_id(name, format.name())
    }

    /// Case for a raw format identifier, which may be unsupported.
    pub fn with_format_id(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            overlay: None,
            expected: Outcome::clean(),
        }
    }

    pub fn overlay(mut self, overlay: OptionsOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn expect(mut self, expected: impl Into<Outcome>) -> Self {
        self.expected = expected.into();
        self
    }
}
