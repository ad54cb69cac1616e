use polars::prelude::*;

use crate::error::Result;
use crate::model::{AttrValue, MeasurementStream};
use crate::vocabulary::Vocabulary;
use crate::warnings::{ConversionWarning, WarningSet};

// Suffix variants recognized on every source name, longest first so
// `temperature_raw_qc` strips to `temperature` rather than stopping at
// `temperature_raw`.
const SUFFIX_VARIANTS: [(&str, &str); 4] = [
    ("_raw_qc", "_RAW_QC"),
    ("_raw", "_RAW"),
    ("_qc", "_QC"),
    ("", ""),
];

/// Renames the measurement dimension to its canonical name. An axis that is
/// neither a known source dimension nor already canonical gets a warning and
/// is left alone.
pub fn rename_measurement_axis(
    stream: &mut MeasurementStream,
    vocab: &Vocabulary,
    warnings: &mut WarningSet,
) {
    if let Some(canonical) = vocab.canonical_dimension(&stream.axis) {
        stream.axis = canonical.to_string();
    } else if !vocab
        .dimension_renames
        .values()
        .any(|target| target == &stream.axis)
    {
        warnings.push(ConversionWarning::MissingVocabulary {
            context: format!("dimension {}", stream.axis),
        });
    }
}

/// Renames variables to their canonical names, carrying the `_qc`, `_raw`,
/// and `_raw_qc` suffixes over in upper case. A rename whose target column
/// already exists is skipped with a warning and the source keeps its name.
/// Names with no vocabulary entry pass through unchanged.
pub fn rename_variables(
    stream: &mut MeasurementStream,
    vocab: &Vocabulary,
    warnings: &mut WarningSet,
) -> Result<()> {
    for column in stream.variables() {
        for (suffix, canonical_suffix) in SUFFIX_VARIANTS {
            let Some(base) = column.strip_suffix(suffix) else {
                continue;
            };
            let Some(target_base) = vocab.canonical_name(base) else {
                continue;
            };
            let target = format!("{target_base}{canonical_suffix}");
            if target == column {
                break;
            }
            if stream.has_variable(&target) {
                warnings.push(ConversionWarning::NameCollision {
                    source: column.clone(),
                    target,
                });
            } else {
                stream.rename_variable(&column, &target)?;
            }
            break;
        }
    }
    Ok(())
}

/// Fills in vocabulary attributes for every recognized variable. Attributes
/// already present are kept as-is, except that unit-style strings are first
/// rewritten to their canonical spelling; a kept value that still disagrees
/// with the vocabulary produces a warning.
pub fn apply_vocabulary_attrs(
    stream: &mut MeasurementStream,
    vocab: &Vocabulary,
    warnings: &mut WarningSet,
) {
    for variable in stream.variables() {
        let Some(expected_attrs) = vocab.variable_attrs.get(&variable) else {
            continue;
        };
        for (attr, expected) in expected_attrs {
            let current = stream
                .attrs(&variable)
                .and_then(|attrs| attrs.get(attr))
                .cloned();
            match current {
                Some(mut value) => {
                    if let Some(text) = value.as_str() {
                        let formatted = vocab.reformat_unit(text);
                        if formatted != text {
                            value = AttrValue::from(formatted);
                            stream.set_attr(&variable, attr, value.clone());
                        }
                    }
                    if &value != expected {
                        warnings.push(ConversionWarning::AttributeConflict {
                            variable: variable.clone(),
                            attribute: attr.clone(),
                            existing: value.to_string(),
                            expected: expected.to_string(),
                        });
                    }
                }
                None => {
                    stream.set_attr(&variable, attr, expected.clone());
                }
            }
        }
    }
}

/// Rescales variables whose unit has a conversion landing on a preferred
/// unit, updating the `units` attribute to match. Returns how many variables
/// were converted. Non-numeric columns are never touched.
pub fn convert_units(stream: &mut MeasurementStream, vocab: &Vocabulary) -> Result<usize> {
    let mut converted = 0;
    for variable in stream.variables() {
        let Some(unit) = stream.unit(&variable).map(|s| s.to_string()) else {
            continue;
        };
        let Some(conversion) = vocab.conversion_to_preferred(&unit) else {
            continue;
        };
        let series = stream.frame.column(&variable)?.as_materialized_series();
        if !matches!(
            series.dtype(),
            DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32
        ) {
            continue;
        }
        let series = if series.dtype() == &DataType::Float64 {
            series.clone()
        } else {
            series.cast(&DataType::Float64)?
        };
        let scaled = &series * conversion.factor;
        let target_unit = conversion.target_unit.clone();
        stream.frame.with_column(scaled)?;
        stream.set_attr(&variable, "units", target_unit);
        converted += 1;
    }
    Ok(converted)
}

/// Runs the full normalization pass over one dive's measurement stream:
/// axis rename, variable renames, attribute fill-in, then unit conversion.
pub fn normalize_stream(
    stream: &mut MeasurementStream,
    vocab: &Vocabulary,
    warnings: &mut WarningSet,
) -> Result<()> {
    rename_measurement_axis(stream, vocab, warnings);
    rename_variables(stream, vocab, warnings)?;
    apply_vocabulary_attrs(stream, vocab, warnings);
    convert_units(stream, vocab)?;
    Ok(())
}
