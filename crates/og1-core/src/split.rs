use std::collections::HashMap;

use crate::model::RawField;
use crate::vocabulary::Vocabulary;

/// The fields of one dive, bucketed by dimension signature. Scalars land
/// under the empty signature; each instrument axis gets its own bucket.
#[derive(Debug, Default)]
pub struct GroupedFields {
    groups: HashMap<Vec<String>, Vec<RawField>>,
}

impl GroupedFields {
    pub fn group(&self, dims: &[String]) -> Option<&[RawField]> {
        self.groups.get(dims).map(|fields| fields.as_slice())
    }

    pub fn take(&mut self, dims: &[String]) -> Option<Vec<RawField>> {
        self.groups.remove(dims)
    }

    /// Removes and returns the bucket for a single-dimension signature.
    pub fn take_axis(&mut self, axis: &str) -> Option<Vec<RawField>> {
        let key = vec![axis.to_string()];
        self.groups.remove(&key)
    }

    pub fn take_scalars(&mut self) -> Vec<RawField> {
        self.groups.remove(&Vec::new()).unwrap_or_default()
    }

    /// Dimension signatures present, sorted for deterministic iteration.
    pub fn signatures(&self) -> Vec<Vec<String>> {
        let mut keys: Vec<Vec<String>> = self.groups.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Buckets fields by their exact dimension signature. Field order within a
/// bucket follows the input order.
pub fn split_by_dims(fields: Vec<RawField>) -> GroupedFields {
    let mut groups: HashMap<Vec<String>, Vec<RawField>> = HashMap::new();
    for field in fields {
        groups.entry(field.dims.clone()).or_default().push(field);
    }
    GroupedFields { groups }
}

/// Dimensionless fields sorted into calibration constants, log values, and
/// everything else.
#[derive(Debug, Default)]
pub struct ScalarSplit {
    pub calibration: Vec<RawField>,
    pub log: Vec<RawField>,
    pub other: Vec<RawField>,
}

/// Splits the scalar bucket into the three scalar families. Calibration
/// constants lose their prefix, so `sg_cal_volmax` becomes `volmax`.
pub fn split_scalars(fields: Vec<RawField>, vocab: &Vocabulary) -> ScalarSplit {
    let mut split = ScalarSplit::default();
    for mut field in fields {
        if field.name.starts_with(&vocab.calibration_prefix) {
            let stripped = field.name[vocab.calibration_prefix.len()..]
                .trim_start_matches('_')
                .to_string();
            if !stripped.is_empty() {
                field.name = stripped;
            }
            split.calibration.push(field);
        } else if field.name.starts_with(&vocab.log_prefix) {
            split.log.push(field);
        } else {
            split.other.push(field);
        }
    }
    split
}
