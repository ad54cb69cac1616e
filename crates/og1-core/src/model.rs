use std::collections::BTreeMap;
use std::fmt;

use polars::prelude::*;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{PipelineError, Result};

/// A single metadata attribute value. Basestation attributes are a mix of
/// strings and numbers, so this keeps the distinction instead of stringifying
/// everything up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            AttrValue::Text(_) => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

/// Per-variable attributes keyed by attribute name.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// An insertion-ordered attribute map. Dataset attributes have a canonical
/// ordering in the output file, so unlike [`AttrMap`] this preserves the order
/// in which keys were first set. Setting an existing key overwrites its value
/// in place without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataSet {
    entries: Vec<(String, AttrValue)>,
}

impl MetadataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, AttrValue)> for MetadataSet {
    fn from_iter<T: IntoIterator<Item = (String, AttrValue)>>(iter: T) -> Self {
        let mut set = MetadataSet::new();
        for (key, value) in iter {
            set.set(key, value);
        }
        set
    }
}

impl Serialize for MetadataSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MetadataSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SetVisitor;

        impl<'de> Visitor<'de> for SetVisitor {
            type Value = MetadataSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a map of attribute values")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<MetadataSet, A::Error> {
                let mut set = MetadataSet::new();
                while let Some((key, value)) = access.next_entry::<String, AttrValue>()? {
                    set.set(key, value);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(SetVisitor)
    }
}

/// The sample values of one field. Missing float samples are carried as NaN,
/// matching how the basestation files encode gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FieldValuesRepr", into = "FieldValuesRepr")]
pub enum FieldValues {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Text(Vec<String>),
}

// JSON cannot represent NaN, so the serialized form uses nulls for
// non-finite floats.
#[derive(Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "snake_case")]
enum FieldValuesRepr {
    Float(Vec<Option<f64>>),
    Int(Vec<i64>),
    Text(Vec<String>),
}

impl From<FieldValuesRepr> for FieldValues {
    fn from(repr: FieldValuesRepr) -> Self {
        match repr {
            FieldValuesRepr::Float(values) => {
                FieldValues::Float(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            }
            FieldValuesRepr::Int(values) => FieldValues::Int(values),
            FieldValuesRepr::Text(values) => FieldValues::Text(values),
        }
    }
}

impl From<FieldValues> for FieldValuesRepr {
    fn from(values: FieldValues) -> Self {
        match values {
            FieldValues::Float(values) => FieldValuesRepr::Float(
                values
                    .into_iter()
                    .map(|v| if v.is_finite() { Some(v) } else { None })
                    .collect(),
            ),
            FieldValues::Int(values) => FieldValuesRepr::Int(values),
            FieldValues::Text(values) => FieldValuesRepr::Text(values),
        }
    }
}

impl FieldValues {
    pub fn len(&self) -> usize {
        match self {
            FieldValues::Float(v) => v.len(),
            FieldValues::Int(v) => v.len(),
            FieldValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            FieldValues::Float(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn to_series(&self, name: &str) -> Series {
        match self {
            FieldValues::Float(values) => Series::new(name.into(), values.clone()),
            FieldValues::Int(values) => Series::new(name.into(), values.clone()),
            FieldValues::Text(values) => Series::new(name.into(), values.clone()),
        }
    }

    pub fn from_series(series: &Series) -> Result<Self> {
        match series.dtype() {
            DataType::Float64 | DataType::Float32 => {
                let cast = series.cast(&DataType::Float64)?;
                let values = cast.f64()?;
                Ok(FieldValues::Float(
                    values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect(),
                ))
            }
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => {
                let cast = series.cast(&DataType::Int64)?;
                let values = cast.i64()?;
                let mut out = Vec::with_capacity(values.len());
                for value in values.into_iter() {
                    out.push(value.ok_or_else(|| {
                        PipelineError::Processing(format!(
                            "null integer sample in column '{}'",
                            series.name()
                        ))
                    })?);
                }
                Ok(FieldValues::Int(out))
            }
            DataType::String => {
                let values = series.str()?;
                Ok(FieldValues::Text(
                    values
                        .into_iter()
                        .map(|v| v.unwrap_or("").to_string())
                        .collect(),
                ))
            }
            other => Err(PipelineError::Processing(format!(
                "unsupported dtype {other} for column '{}'",
                series.name()
            ))),
        }
    }
}

/// One field as read from a basestation dive file: a name, the dimensions it
/// is defined over (empty for scalars), its samples, and its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub name: String,
    pub dims: Vec<String>,
    pub values: FieldValues,
    pub attrs: AttrMap,
}

impl RawField {
    pub fn scalar(name: impl Into<String>, values: FieldValues) -> Self {
        Self {
            name: name.into(),
            dims: Vec::new(),
            values,
            attrs: AttrMap::new(),
        }
    }

    pub fn vector(name: impl Into<String>, dim: impl Into<String>, values: FieldValues) -> Self {
        Self {
            name: name.into(),
            dims: vec![dim.into()],
            values,
            attrs: AttrMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }
}

/// An instrument attached to the glider, as reported by the basestation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDescriptor {
    /// The dataset attribute the descriptor was parsed from.
    pub source_attribute: String,
    pub make_model: String,
    pub serial_number: Option<String>,
    pub calibration_date: Option<String>,
    pub calibration_parameters: Option<String>,
}

/// Everything read from a single dive file.
#[derive(Debug, Clone, PartialEq)]
pub struct DiveRecord {
    pub dive_number: i64,
    pub fields: Vec<RawField>,
    pub attributes: MetadataSet,
    pub sensors: Vec<SensorDescriptor>,
}

/// The measurement-axis data of one dive (or a whole mission) as a DataFrame,
/// together with the per-variable attributes that travel with each column.
///
/// Column names and `variable_attrs` keys are kept in sync: use
/// [`MeasurementStream::rename_variable`] instead of renaming on the frame
/// directly.
#[derive(Debug, Clone)]
pub struct MeasurementStream {
    pub axis: String,
    pub frame: DataFrame,
    pub variable_attrs: BTreeMap<String, AttrMap>,
}

impl MeasurementStream {
    /// Builds a stream from the fields that share one dimension. Fails when
    /// field lengths disagree.
    pub fn from_fields(axis: impl Into<String>, fields: &[RawField]) -> Result<Self> {
        let axis = axis.into();
        let mut expected: Option<usize> = None;
        let mut columns: Vec<Column> = Vec::with_capacity(fields.len());
        let mut variable_attrs = BTreeMap::new();

        for field in fields {
            let len = field.len();
            match expected {
                None => expected = Some(len),
                Some(want) if want != len => {
                    return Err(PipelineError::LengthMismatch {
                        column: field.name.clone(),
                        expected: want,
                        found: len,
                    });
                }
                _ => {}
            }
            columns.push(field.values.to_series(&field.name).into());
            if !field.attrs.is_empty() {
                variable_attrs.insert(field.name.clone(), field.attrs.clone());
            }
        }

        let frame = DataFrame::new(columns)?;
        Ok(Self {
            axis,
            frame,
            variable_attrs,
        })
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.frame
            .get_column_names()
            .iter()
            .any(|c| c.as_str() == name)
    }

    pub fn variables(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    pub fn attrs(&self, variable: &str) -> Option<&AttrMap> {
        self.variable_attrs.get(variable)
    }

    pub fn set_attr(&mut self, variable: &str, key: &str, value: impl Into<AttrValue>) {
        self.variable_attrs
            .entry(variable.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn set_attr_if_missing(&mut self, variable: &str, key: &str, value: impl Into<AttrValue>) {
        self.variable_attrs
            .entry(variable.to_string())
            .or_default()
            .entry(key.to_string())
            .or_insert_with(|| value.into());
    }

    /// The current `units` attribute of a variable, if it has one.
    pub fn unit(&self, variable: &str) -> Option<&str> {
        self.variable_attrs
            .get(variable)?
            .get("units")
            .and_then(|v| v.as_str())
    }

    pub fn rename_variable(&mut self, from: &str, to: &str) -> Result<()> {
        self.frame.rename(from, to.into())?;
        if let Some(attrs) = self.variable_attrs.remove(from) {
            self.variable_attrs.insert(to.to_string(), attrs);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_set_keeps_first_position_on_overwrite() {
        let mut set = MetadataSet::new();
        set.set("title", "first");
        set.set("platform", "sub-surface gliders");
        set.set("title", "second");
        let keys: Vec<&str> = set.keys().collect();
        assert_eq!(keys, vec!["title", "platform"]);
        assert_eq!(set.get_str("title"), Some("second"));
    }

    #[test]
    fn metadata_set_round_trips_through_json_in_order(
    ) -> std::result::Result<(), serde_json::Error> {
        let mut set = MetadataSet::new();
        set.set("title", "OceanGliders trajectory file");
        set.set("dive_number", 12i64);
        set.set("magnetic_variation", -13.5);
        let json = serde_json::to_string(&set)?;
        let back: MetadataSet = serde_json::from_str(&json)?;
        assert_eq!(back, set);
        let keys: Vec<&str> = back.keys().collect();
        assert_eq!(keys, vec!["title", "dive_number", "magnetic_variation"]);
        Ok(())
    }

    #[test]
    fn field_values_serialize_nan_as_null() {
        let values = FieldValues::Float(vec![1.0, f64::NAN, 3.0]);
        let json = serde_json::to_string(&values).expect("serialize");
        assert!(json.contains("null"));
        let back: FieldValues = serde_json::from_str(&json).expect("deserialize");
        match back {
            FieldValues::Float(v) => {
                assert_eq!(v[0], 1.0);
                assert!(v[1].is_nan());
                assert_eq!(v[2], 3.0);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn stream_rejects_mismatched_lengths() {
        let fields = vec![
            RawField::vector(
                "pressure",
                "sg_data_point",
                FieldValues::Float(vec![1.0, 2.0]),
            ),
            RawField::vector(
                "temperature",
                "sg_data_point",
                FieldValues::Float(vec![1.0]),
            ),
        ];
        let err = MeasurementStream::from_fields("sg_data_point", &fields).unwrap_err();
        assert!(matches!(
            err,
            crate::error::PipelineError::LengthMismatch { .. }
        ));
    }

    #[test]
    fn rename_moves_attributes_with_the_column() {
        let fields = vec![RawField::vector(
            "temperature",
            "sg_data_point",
            FieldValues::Float(vec![10.0, 11.0]),
        )
        .with_attr("units", "degrees_Celsius")];
        let mut stream = MeasurementStream::from_fields("sg_data_point", &fields).expect("stream");
        stream.rename_variable("temperature", "TEMP").expect("rename");
        assert!(stream.has_variable("TEMP"));
        assert!(!stream.has_variable("temperature"));
        assert_eq!(stream.unit("TEMP"), Some("degrees_Celsius"));
    }
}
