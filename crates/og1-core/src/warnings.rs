use std::collections::HashSet;
use std::fmt;

/// A non-fatal observation raised while converting a mission. Warnings never
/// abort processing; callers collect them and surface them alongside the
/// converted dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionWarning {
    /// A variable already carried an attribute whose value disagrees with the
    /// controlled vocabulary. The existing value is kept.
    AttributeConflict {
        variable: String,
        attribute: String,
        existing: String,
        expected: String,
    },
    /// Two dives reported different values for the same dataset attribute.
    /// The first value seen wins.
    DatasetAttributeConflict {
        attribute: String,
        existing: String,
        replacement: String,
    },
    /// Renaming a variable would overwrite a column that already exists, so
    /// the source column keeps its original name.
    NameCollision { source: String, target: String },
    /// A dimension, variable, or sensor had no entry in the vocabulary.
    MissingVocabulary { context: String },
    /// Every pressure sample in a dive was missing, so no profile numbers or
    /// phases could be assigned for it.
    PressureAllMissing { dive_number: f64 },
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionWarning::AttributeConflict {
                variable,
                attribute,
                existing,
                expected,
            } => write!(
                f,
                "attribute mismatch for {variable}.{attribute}: dataset has '{existing}', vocabulary expects '{expected}'"
            ),
            ConversionWarning::DatasetAttributeConflict {
                attribute,
                existing,
                replacement,
            } => write!(
                f,
                "dataset attribute {attribute} differs between dives: keeping '{existing}', ignoring '{replacement}'"
            ),
            ConversionWarning::NameCollision { source, target } => write!(
                f,
                "cannot rename {source} to {target}: target column already exists"
            ),
            ConversionWarning::MissingVocabulary { context } => {
                write!(f, "no vocabulary entry for {context}")
            }
            ConversionWarning::PressureAllMissing { dive_number } => write!(
                f,
                "dive {dive_number} has no valid pressure samples; profile assignment skipped"
            ),
        }
    }
}

/// An ordered collection of warnings that drops duplicates. Two warnings are
/// duplicates when they render to the same message, which collapses repeats of
/// the same vocabulary disagreement across dives.
#[derive(Debug, Default, Clone)]
pub struct WarningSet {
    seen: HashSet<String>,
    items: Vec<ConversionWarning>,
}

impl WarningSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a warning unless an identical message was already recorded.
    /// Returns true when the warning was kept.
    pub fn push(&mut self, warning: ConversionWarning) -> bool {
        let rendered = warning.to_string();
        if self.seen.insert(rendered) {
            self.items.push(warning);
            true
        } else {
            false
        }
    }

    pub fn extend(&mut self, other: WarningSet) {
        for warning in other.items {
            self.push(warning);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversionWarning> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<ConversionWarning> {
        self.items
    }
}
