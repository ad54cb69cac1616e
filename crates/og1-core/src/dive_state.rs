use polars::prelude::*;

use crate::error::{PipelineError, Result};
use crate::model::MeasurementStream;
use crate::warnings::{ConversionWarning, WarningSet};

// Column names probed, in order, for the per-row dive number.
const DIVE_NUMBER_COLUMNS: [&str; 3] = ["dive_number", "divenum", "dive_num"];

pub const PHASE_ASCENT: i32 = 1;
pub const PHASE_DESCENT: i32 = 2;
pub const PHASE_SURFACE: i32 = 3;

/// The rows belonging to one dive: the first and last index where its number
/// appears.
#[derive(Debug)]
struct DiveRange {
    dive: f64,
    start: usize,
    end: usize,
}

/// Derives `dive_num_cast`, `PROFILE_NUMBER`, `PHASE`, and `PHASE_QC` from
/// the per-row dive number and pressure.
///
/// Within each dive, rows through the first occurrence of the maximum
/// pressure keep the dive number and count as descent; rows after it get the
/// dive number plus 0.5 and count as ascent. `PROFILE_NUMBER` is
/// `2 * dive_num_cast - 1`, so descents are odd and ascents even. When
/// `TIME_GPS` is present, the rows from the first through the second valid
/// fix of each dive are reassigned to the surface phase.
///
/// A dive whose pressure samples are all missing keeps nulls in every derived
/// column and is reported through `warnings`.
pub fn assign_dive_state(
    stream: &mut MeasurementStream,
    warnings: &mut WarningSet,
) -> Result<()> {
    let dive_column = DIVE_NUMBER_COLUMNS
        .iter()
        .find(|column| stream.has_variable(column))
        .copied()
        .ok_or(PipelineError::MissingDiveNumber)?;
    if !stream.has_variable("PRES") {
        return Err(PipelineError::MissingField {
            field: "PRES".to_string(),
            stage: "dive state",
        });
    }

    let dives = float_values(&stream.frame, dive_column)?;
    let pressures = float_values(&stream.frame, "PRES")?;
    let gps_times = if stream.has_variable("TIME_GPS") {
        Some(float_values(&stream.frame, "TIME_GPS")?)
    } else {
        None
    };

    let rows = stream.frame.height();
    let mut cast: Vec<Option<f64>> = vec![None; rows];
    let mut phase: Vec<Option<i32>> = vec![None; rows];

    for range in dive_ranges(&dives) {
        let Some(peak_offset) = first_pressure_peak(&pressures[range.start..=range.end]) else {
            warnings.push(ConversionWarning::PressureAllMissing {
                dive_number: range.dive,
            });
            continue;
        };
        let pmax_index = range.start + peak_offset;

        for index in range.start..=pmax_index {
            cast[index] = Some(range.dive);
            phase[index] = Some(PHASE_DESCENT);
        }
        for index in pmax_index + 1..=range.end {
            cast[index] = Some(range.dive + 0.5);
            phase[index] = Some(PHASE_ASCENT);
        }

        if let Some(times) = &gps_times {
            let mut valid = (range.start..=range.end)
                .filter(|&index| times[index].map(|t| !t.is_nan()).unwrap_or(false));
            if let (Some(first), Some(second)) = (valid.next(), valid.next()) {
                for index in first..=second {
                    phase[index] = Some(PHASE_SURFACE);
                }
            }
        }
    }

    let profile: Vec<Option<f64>> = cast
        .iter()
        .map(|value| value.map(|cast| 2.0 * cast - 1.0))
        .collect();

    let cast_series = Series::new("dive_num_cast".into(), cast);
    let profile_series = Series::new("PROFILE_NUMBER".into(), profile);
    let phase_series = Series::new("PHASE".into(), phase).cast(&DataType::Int8)?;
    let phase_qc_series =
        Series::new("PHASE_QC".into(), vec![0i32; rows]).cast(&DataType::Int8)?;

    stream.frame.hstack_mut(&[
        cast_series.into(),
        profile_series.into(),
        phase_series.into(),
        phase_qc_series.into(),
    ])?;

    stream.set_attr(
        "dive_num_cast",
        "long_name",
        "dive number, incremented by 0.5 on the ascent",
    );
    stream.set_attr("PROFILE_NUMBER", "long_name", "profile index");
    stream.set_attr("PROFILE_NUMBER", "units", "1");
    stream.set_attr("PHASE", "long_name", "behavior of the glider at sea");
    stream.set_attr(
        "PHASE",
        "phase_vocabulary",
        "https://github.com/OceanGlidersCommunity/OG-format-user-manual/blob/main/vocabularyCollection/phase.md",
    );
    stream.set_attr("PHASE_QC", "long_name", "quality flag of PHASE");

    Ok(())
}

fn float_values(frame: &DataFrame, column: &str) -> Result<Vec<Option<f64>>> {
    let cast = frame
        .column(column)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

fn dive_ranges(dives: &[Option<f64>]) -> Vec<DiveRange> {
    let mut ranges: Vec<DiveRange> = Vec::new();
    for (index, dive) in dives.iter().enumerate() {
        let Some(dive) = dive else { continue };
        if dive.is_nan() {
            continue;
        }
        match ranges.iter_mut().find(|range| range.dive == *dive) {
            Some(range) => range.end = index,
            None => ranges.push(DiveRange {
                dive: *dive,
                start: index,
                end: index,
            }),
        }
    }
    ranges.sort_by(|a, b| a.dive.total_cmp(&b.dive));
    ranges
}

// First occurrence of the maximum, ignoring missing samples.
fn first_pressure_peak(pressures: &[Option<f64>]) -> Option<usize> {
    let mut peak: Option<(usize, f64)> = None;
    for (index, value) in pressures.iter().enumerate() {
        let Some(value) = value else { continue };
        if value.is_nan() {
            continue;
        }
        match peak {
            Some((_, best)) if *value <= best => {}
            _ => peak = Some((index, *value)),
        }
    }
    peak.map(|(index, _)| index)
}
