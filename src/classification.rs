//! Fixed classification of a file entity.

use serde::Serialize;

/// Hidden x temporary, as one closed variant.
///
/// Decides end-of-life behaviour: temporary classes delete their backing file
/// when the handle is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FileClass {
    Normal,
    Hidden,
    Temporary,
    HiddenTemporary,
}

impl FileClass {
    #[must_use]
    pub fn from_flags(hidden: bool, temporary: bool) -> Self {
        match (hidden, temporary) {
            (false, false) => Self::Normal,
            (true, false) => Self::Hidden,
            (false, true) => Self::Temporary,
            (true, true) => Self::HiddenTemporary,
        }
    }

    /// Classify from a file name and the temporary flag.
    #[must_use]
    pub fn classify(basename: &str, temporary: bool) -> Self {
        Self::from_flags(basename.starts_with('.'), temporary)
    }

    #[must_use]
    pub fn is_hidden(self) -> bool {
        matches!(self, Self::Hidden | Self::HiddenTemporary)
    }

    #[must_use]
    pub fn is_temporary(self) -> bool {
        matches!(self, Self::Temporary | Self::HiddenTemporary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(FileClass::classify("a.txt", false), FileClass::Normal);
        assert_eq!(FileClass::classify(".env", false), FileClass::Hidden);
        assert_eq!(FileClass::classify("a.txt", true), FileClass::Temporary);
        assert_eq!(FileClass::classify(".env", true), FileClass::HiddenTemporary);
    }

    #[test]
    fn test_predicates() {
        assert!(FileClass::HiddenTemporary.is_hidden());
        assert!(FileClass::HiddenTemporary.is_temporary());
        assert!(!FileClass::Normal.is_temporary());
        assert!(!FileClass::Temporary.is_hidden());
    }
}
