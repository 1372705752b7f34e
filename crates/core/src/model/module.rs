use thiserror::Error;

use crate::model::ModuleNumber;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModuleError {
    #[error("module title must not be empty")]
    EmptyTitle,
}

/// Static catalog entry for one unit of study content plus its quiz.
///
/// Read-only at runtime; the catalog is seeded once at initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    number: ModuleNumber,
    title: String,
    content_reference: String,
}

impl ModuleEntry {
    /// Create a catalog entry.
    ///
    /// `content_reference` points at the study material for this module
    /// (a file path or URI); the core never dereferences it.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::EmptyTitle` if the title is blank.
    pub fn new(
        number: ModuleNumber,
        title: impl Into<String>,
        content_reference: impl Into<String>,
    ) -> Result<Self, ModuleError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ModuleError::EmptyTitle);
        }
        Ok(Self {
            number,
            title,
            content_reference: content_reference.into(),
        })
    }

    #[must_use]
    pub fn number(&self) -> ModuleNumber {
        self.number
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content_reference(&self) -> &str {
        &self.content_reference
    }
}
