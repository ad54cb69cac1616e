use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attributes::{build_dataset_attributes, AttributeConfig};
use crate::depth::attach_depth;
use crate::dive_state::assign_dive_state;
use crate::error::{PipelineError, Result};
use crate::gps_fusion::merge_gps_fixes;
use crate::model::{
    AttrMap, DiveRecord, MeasurementStream, MetadataSet, RawField, SensorDescriptor,
};
use crate::normalize::normalize_stream;
use crate::sensors::{render_sensors, wire_sensor_references, SensorEntry};
use crate::split::{split_by_dims, split_scalars, GroupedFields};
use crate::vocabulary::Vocabulary;
use crate::warnings::WarningSet;

/// One dive converted to OG1 form, plus the scalar groups peeled off along
/// the way.
#[derive(Debug)]
pub struct ProcessedDive {
    pub dive_number: i64,
    pub stream: MeasurementStream,
    pub attributes: MetadataSet,
    pub sensors: Vec<SensorDescriptor>,
    pub calibration: Vec<RawField>,
    pub log_scalars: Vec<RawField>,
    pub other_scalars: Vec<RawField>,
    pub warnings: WarningSet,
}

/// A dive that failed conversion and was left out of the mission dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedDive {
    pub dive_number: i64,
    pub reason: String,
}

/// The assembled mission: every processed dive concatenated on the
/// measurement axis, with merged dataset attributes and rendered sensors.
#[derive(Debug)]
pub struct MissionDataset {
    pub stream: MeasurementStream,
    pub attributes: MetadataSet,
    pub sensors: Vec<SensorEntry>,
    pub warnings: WarningSet,
    pub skipped: Vec<SkippedDive>,
}

/// Converts a single dive record: groups its fields by dimension signature,
/// normalizes names, units, and attributes on the measurement group, merges
/// the surface GPS fixes, then derives dive state and depth.
pub fn process_dive(record: DiveRecord, vocab: &Vocabulary) -> Result<ProcessedDive> {
    let DiveRecord {
        dive_number,
        fields,
        attributes,
        sensors,
    } = record;
    let mut warnings = WarningSet::new();

    let mut groups = split_by_dims(fields);
    let scalars = split_scalars(groups.take_scalars(), vocab);
    let gps_fields = groups.take_axis(&vocab.gps.axis);

    let axis = measurement_axis(&groups, vocab)?;
    let measurement_fields = groups.take_axis(&axis).ok_or_else(|| {
        PipelineError::MissingMeasurementAxis {
            found: vec![axis.clone()],
        }
    })?;
    let mut stream = MeasurementStream::from_fields(axis, &measurement_fields)?;

    normalize_stream(&mut stream, vocab, &mut warnings)?;

    match &gps_fields {
        Some(fixes) => {
            let merged = merge_gps_fixes(&mut stream, fixes, vocab)?;
            debug!("dive {dive_number}: merged {merged} GPS fixes");
        }
        None => debug!("dive {dive_number}: no GPS fix group"),
    }

    stamp_dive_number(&mut stream, dive_number)?;
    assign_dive_state(&mut stream, &mut warnings)?;
    attach_depth(&mut stream)?;

    Ok(ProcessedDive {
        dive_number,
        stream,
        attributes,
        sensors,
        calibration: scalars.calibration,
        log_scalars: scalars.log,
        other_scalars: scalars.other,
        warnings,
    })
}

/// Converts a whole mission. Dives that fail are dropped with a warning and
/// reported in the result; the survivors are concatenated in input order and
/// re-sorted by TIME. Dataset attributes are reconciled across the dives
/// using `config`, with `now` as the modification timestamp.
pub fn process_mission(
    records: Vec<DiveRecord>,
    vocab: &Vocabulary,
    config: &AttributeConfig,
    now: DateTime<Utc>,
) -> Result<MissionDataset> {
    let mut processed = Vec::new();
    let mut skipped = Vec::new();
    for record in records {
        let dive_number = record.dive_number;
        match process_dive(record, vocab) {
            Ok(dive) => processed.push(dive),
            Err(err) => {
                tracing::warn!("skipping dive {dive_number}: {err}");
                skipped.push(SkippedDive {
                    dive_number,
                    reason: err.to_string(),
                });
            }
        }
    }
    if processed.is_empty() {
        return Err(PipelineError::Processing(
            "no dive records could be processed".to_string(),
        ));
    }
    if !processed.iter().any(|dive| dive.stream.has_variable("TIME")) {
        return Err(PipelineError::MissingField {
            field: "TIME".to_string(),
            stage: "mission assembly",
        });
    }

    let frames: Vec<LazyFrame> = processed
        .iter()
        .map(|dive| dive.stream.frame.clone().lazy())
        .collect();
    let combined = concat(
        &frames,
        UnionArgs {
            diagonal: true,
            ..Default::default()
        },
    )?
    .sort(
        ["TIME"],
        SortMultipleOptions::default()
            .with_maintain_order(true)
            .with_nulls_last(true),
    )
    .collect()?;

    // First dive wins for per-variable attributes, matching the dataset
    // attribute merge.
    let mut variable_attrs: BTreeMap<String, AttrMap> = BTreeMap::new();
    for dive in &processed {
        for (name, attrs) in &dive.stream.variable_attrs {
            variable_attrs
                .entry(name.clone())
                .or_insert_with(|| attrs.clone());
        }
    }
    let mut stream = MeasurementStream {
        axis: processed[0].stream.axis.clone(),
        frame: combined,
        variable_attrs,
    };

    let mut warnings = WarningSet::new();
    for dive in &mut processed {
        warnings.extend(std::mem::take(&mut dive.warnings));
    }

    let mut seen = HashSet::new();
    let mut descriptors = Vec::new();
    for dive in &processed {
        for sensor in &dive.sensors {
            let key = (sensor.make_model.clone(), sensor.serial_number.clone());
            if seen.insert(key) {
                descriptors.push(sensor.clone());
            }
        }
    }
    let sensors = render_sensors(&descriptors, vocab, &mut warnings);
    wire_sensor_references(&mut stream, &sensors, vocab);

    let sources: Vec<&MetadataSet> = processed.iter().map(|dive| &dive.attributes).collect();
    let attributes = build_dataset_attributes(&sources, config, now, &mut warnings);

    info!(
        rows = stream.len(),
        variables = stream.frame.width(),
        dives = processed.len(),
        skipped = skipped.len(),
        "assembled mission dataset"
    );

    Ok(MissionDataset {
        stream,
        attributes,
        sensors,
        warnings,
        skipped,
    })
}

fn measurement_axis(groups: &GroupedFields, vocab: &Vocabulary) -> Result<String> {
    let signatures = groups.signatures();
    for signature in &signatures {
        if signature.len() == 1 && vocab.canonical_dimension(&signature[0]).is_some() {
            return Ok(signature[0].clone());
        }
    }
    // Already-canonical input, e.g. a rerun over converted data.
    for signature in &signatures {
        if signature.len() == 1
            && vocab
                .dimension_renames
                .values()
                .any(|target| target == &signature[0])
        {
            return Ok(signature[0].clone());
        }
    }
    Err(PipelineError::MissingMeasurementAxis {
        found: signatures
            .iter()
            .map(|signature| signature.join("/"))
            .collect(),
    })
}

fn stamp_dive_number(stream: &mut MeasurementStream, dive_number: i64) -> Result<()> {
    let rows = stream.len();
    let series = Series::new("divenum".into(), vec![dive_number; rows]);
    stream.frame.with_column(series)?;
    Ok(())
}
