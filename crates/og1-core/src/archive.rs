use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Write};

use ::zip::{write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{AttrMap, DiveRecord, FieldValues, MetadataSet, RawField, SensorDescriptor};
use crate::pipeline::{MissionDataset, SkippedDive};
use crate::sensors::SensorEntry;

pub const DIVE_FORMAT: &str = "og1-dive/1";
pub const MISSION_FORMAT: &str = "og1-mission/1";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Polars operation failed: {0}")]
    Polars(#[from] PolarsError),
    #[error("JSON operation failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ZIP operation failed: {0}")]
    Zip(#[from] ::zip::result::ZipError),
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Manifest is missing or corrupt")]
    MissingManifest,
    #[error("Data file '{0}' is missing from archive")]
    MissingDataFile(String),
    #[error("Column '{column}' is missing from '{file}'")]
    MissingColumn { file: String, column: String },
    #[error("Unsupported archive format '{0}'")]
    UnsupportedFormat(String),
    #[error("Data processing error: {0}")]
    Processing(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct DiveManifest {
    format: String,
    dive_number: i64,
    attributes: MetadataSet,
    sensors: Vec<SensorDescriptor>,
    fields: Vec<ManifestField>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestField {
    name: String,
    dims: Vec<String>,
    #[serde(default)]
    attrs: AttrMap,
    /// Inline samples; used for scalars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    values: Option<FieldValues>,
    /// Parquet file inside the archive holding this field as a column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_path: Option<String>,
}

/// Serializes one dive to a zip archive: a `manifest.json` describing every
/// field, with scalar values inline and each dimension group written as a
/// parquet file.
pub fn write_dive_archive(record: &DiveRecord) -> Result<Vec<u8>, ArchiveError> {
    // Deterministic file naming: one parquet per dimension signature, in
    // sorted signature order.
    let mut groups: BTreeMap<Vec<String>, Vec<&RawField>> = BTreeMap::new();
    for field in &record.fields {
        if !field.dims.is_empty() {
            groups.entry(field.dims.clone()).or_default().push(field);
        }
    }
    let paths: HashMap<Vec<String>, String> = groups
        .keys()
        .enumerate()
        .map(|(index, dims)| (dims.clone(), format!("group_{index}.parquet")))
        .collect();

    let fields = record
        .fields
        .iter()
        .map(|field| {
            if field.dims.is_empty() {
                ManifestField {
                    name: field.name.clone(),
                    dims: field.dims.clone(),
                    attrs: field.attrs.clone(),
                    values: Some(field.values.clone()),
                    data_path: None,
                }
            } else {
                ManifestField {
                    name: field.name.clone(),
                    dims: field.dims.clone(),
                    attrs: field.attrs.clone(),
                    values: None,
                    data_path: paths.get(&field.dims).cloned(),
                }
            }
        })
        .collect();

    let manifest = DiveManifest {
        format: DIVE_FORMAT.to_string(),
        dive_number: record.dive_number,
        attributes: record.attributes.clone(),
        sensors: record.sensors.clone(),
        fields,
    };
    let manifest_bytes = serde_json::to_vec(&manifest)?;

    let cursor = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(cursor);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("manifest.json", options)?;
    zip.write_all(&manifest_bytes)?;

    for (dims, group) in &groups {
        let columns: Vec<Column> = group
            .iter()
            .map(|field| field.values.to_series(&field.name).into())
            .collect();
        let mut frame = DataFrame::new(columns)?;
        let mut buffer = Vec::new();
        ParquetWriter::new(&mut buffer).finish(&mut frame)?;
        let path = paths
            .get(dims)
            .ok_or_else(|| ArchiveError::MissingDataFile(format!("{dims:?}")))?;
        zip.start_file(path, options)?;
        zip.write_all(&buffer)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Reads a dive archive back into a [`DiveRecord`], restoring field order,
/// dimensions, and attributes from the manifest.
pub fn read_dive_archive(zip_bytes: &[u8]) -> Result<DiveRecord, ArchiveError> {
    let cursor = Cursor::new(zip_bytes);
    let mut archive = ZipArchive::new(cursor)?;

    let manifest: DiveManifest = {
        let mut manifest_file = archive
            .by_name("manifest.json")
            .map_err(|_| ArchiveError::MissingManifest)?;
        let mut manifest_bytes = Vec::new();
        manifest_file.read_to_end(&mut manifest_bytes)?;
        serde_json::from_slice(&manifest_bytes)?
    };
    if manifest.format != DIVE_FORMAT {
        return Err(ArchiveError::UnsupportedFormat(manifest.format));
    }

    let mut frames: HashMap<String, DataFrame> = HashMap::new();
    for field in &manifest.fields {
        let Some(path) = &field.data_path else {
            continue;
        };
        if frames.contains_key(path) {
            continue;
        }
        let mut file = archive
            .by_name(path)
            .map_err(|_| ArchiveError::MissingDataFile(path.clone()))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let frame = ParquetReader::new(Cursor::new(bytes)).finish()?;
        frames.insert(path.clone(), frame);
    }

    let mut fields = Vec::with_capacity(manifest.fields.len());
    for entry in manifest.fields {
        let values = match (entry.values, &entry.data_path) {
            (Some(values), _) => values,
            (None, Some(path)) => {
                let frame = frames
                    .get(path)
                    .ok_or_else(|| ArchiveError::MissingDataFile(path.clone()))?;
                let column = frame.column(&entry.name).map_err(|_| {
                    ArchiveError::MissingColumn {
                        file: path.clone(),
                        column: entry.name.clone(),
                    }
                })?;
                FieldValues::from_series(column.as_materialized_series())
                    .map_err(|e| ArchiveError::Processing(e.to_string()))?
            }
            (None, None) => {
                return Err(ArchiveError::Processing(format!(
                    "field '{}' has neither inline values nor a data path",
                    entry.name
                )));
            }
        };
        fields.push(RawField {
            name: entry.name,
            dims: entry.dims,
            values,
            attrs: entry.attrs,
        });
    }

    Ok(DiveRecord {
        dive_number: manifest.dive_number,
        fields,
        attributes: manifest.attributes,
        sensors: manifest.sensors,
    })
}

/// The manifest of a converted mission archive.
#[derive(Debug, Serialize, Deserialize)]
pub struct MissionManifest {
    pub format: String,
    pub id: Uuid,
    pub created: DateTime<Utc>,
    pub axis: String,
    pub data_path: String,
    pub variables: Vec<VariableEntry>,
    pub attributes: MetadataSet,
    pub sensors: Vec<SensorEntry>,
    pub warnings: Vec<String>,
    pub skipped_dives: Vec<SkippedDive>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VariableEntry {
    pub name: String,
    #[serde(default)]
    pub attrs: AttrMap,
}

/// A mission archive read back from disk.
#[derive(Debug)]
pub struct MissionArchive {
    pub manifest: MissionManifest,
    pub frame: DataFrame,
}

/// Serializes a converted mission: `manifest.json` with the dataset
/// attributes, per-variable attributes, sensors, warnings, and skipped
/// dives, plus the full measurement table as `measurements.parquet`.
pub fn write_mission_archive(
    dataset: &MissionDataset,
    id: Uuid,
    created: DateTime<Utc>,
) -> Result<Vec<u8>, ArchiveError> {
    let variables = dataset
        .stream
        .variables()
        .into_iter()
        .map(|name| {
            let attrs = dataset
                .stream
                .attrs(&name)
                .cloned()
                .unwrap_or_default();
            VariableEntry { name, attrs }
        })
        .collect();

    let manifest = MissionManifest {
        format: MISSION_FORMAT.to_string(),
        id,
        created,
        axis: dataset.stream.axis.clone(),
        data_path: "measurements.parquet".to_string(),
        variables,
        attributes: dataset.attributes.clone(),
        sensors: dataset.sensors.clone(),
        warnings: dataset.warnings.iter().map(|w| w.to_string()).collect(),
        skipped_dives: dataset.skipped.clone(),
    };
    let manifest_bytes = serde_json::to_vec(&manifest)?;

    let cursor = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(cursor);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("manifest.json", options)?;
    zip.write_all(&manifest_bytes)?;

    let mut frame = dataset.stream.frame.clone();
    let mut buffer = Vec::new();
    ParquetWriter::new(&mut buffer).finish(&mut frame)?;
    zip.start_file(&manifest.data_path, options)?;
    zip.write_all(&buffer)?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

pub fn read_mission_archive(zip_bytes: &[u8]) -> Result<MissionArchive, ArchiveError> {
    let cursor = Cursor::new(zip_bytes);
    let mut archive = ZipArchive::new(cursor)?;

    let manifest: MissionManifest = {
        let mut manifest_file = archive
            .by_name("manifest.json")
            .map_err(|_| ArchiveError::MissingManifest)?;
        let mut manifest_bytes = Vec::new();
        manifest_file.read_to_end(&mut manifest_bytes)?;
        serde_json::from_slice(&manifest_bytes)?
    };
    if manifest.format != MISSION_FORMAT {
        return Err(ArchiveError::UnsupportedFormat(manifest.format));
    }

    let frame = {
        let mut file = archive
            .by_name(&manifest.data_path)
            .map_err(|_| ArchiveError::MissingDataFile(manifest.data_path.clone()))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        ParquetReader::new(Cursor::new(bytes)).finish()?
    };

    Ok(MissionArchive { manifest, frame })
}
