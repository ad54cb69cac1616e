use polars::prelude::*;

use crate::error::{PipelineError, Result};
use crate::model::{MeasurementStream, RawField};
use crate::vocabulary::Vocabulary;

/// Merges the surface GPS fixes of one dive into its measurement stream.
///
/// Each fix becomes a new row carrying LATITUDE, LONGITUDE, TIME, a zero
/// DEPTH, and the fix repeated as LATITUDE_GPS / LONGITUDE_GPS / TIME_GPS.
/// Columns the fixes do not provide are null on fix rows, and the GPS-only
/// columns are null on measurement rows. The result is sorted by TIME with a
/// stable order, so a fix that shares its timestamp with a measurement lands
/// after it.
///
/// Returns the number of fixes merged.
pub fn merge_gps_fixes(
    stream: &mut MeasurementStream,
    gps_fields: &[RawField],
    vocab: &Vocabulary,
) -> Result<usize> {
    let latitude = float_field(gps_fields, &vocab.gps.latitude)?;
    let longitude = float_field(gps_fields, &vocab.gps.longitude)?;
    let time = float_field(gps_fields, &vocab.gps.time)?;

    let fixes = latitude.len();
    if longitude.len() != fixes {
        return Err(PipelineError::LengthMismatch {
            column: vocab.gps.longitude.clone(),
            expected: fixes,
            found: longitude.len(),
        });
    }
    if time.len() != fixes {
        return Err(PipelineError::LengthMismatch {
            column: vocab.gps.time.clone(),
            expected: fixes,
            found: time.len(),
        });
    }
    if fixes == 0 {
        return Ok(0);
    }
    if !stream.has_variable("TIME") {
        return Err(PipelineError::MissingField {
            field: "TIME".to_string(),
            stage: "gps fusion",
        });
    }

    let fix_frame = df![
        "LATITUDE" => latitude.to_vec(),
        "LONGITUDE" => longitude.to_vec(),
        "TIME" => time.to_vec(),
        "DEPTH" => vec![0.0f64; fixes],
        "LATITUDE_GPS" => latitude.to_vec(),
        "LONGITUDE_GPS" => longitude.to_vec(),
        "TIME_GPS" => time.to_vec(),
    ]?;

    let merged = concat(
        &[stream.frame.clone().lazy(), fix_frame.lazy()],
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

    stream.frame = merged;

    stream.set_attr_if_missing("DEPTH", "units", "m");
    stream.set_attr_if_missing("DEPTH", "positive", "down");
    stream.set_attr_if_missing("LATITUDE_GPS", "units", "degrees_north");
    stream.set_attr_if_missing("LATITUDE_GPS", "long_name", "latitude of each GPS location");
    stream.set_attr_if_missing("LONGITUDE_GPS", "units", "degrees_east");
    stream.set_attr_if_missing(
        "LONGITUDE_GPS",
        "long_name",
        "longitude of each GPS location",
    );
    stream.set_attr_if_missing(
        "TIME_GPS",
        "units",
        "seconds since 1970-01-01T00:00:00Z",
    );
    stream.set_attr_if_missing("TIME_GPS", "long_name", "time of each GPS location");

    Ok(fixes)
}

fn float_field<'a>(fields: &'a [RawField], name: &str) -> Result<&'a [f64]> {
    let field = fields
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| PipelineError::MissingField {
            field: name.to_string(),
            stage: "gps fusion",
        })?;
    field.values.as_floats().ok_or_else(|| {
        PipelineError::Processing(format!("GPS field '{name}' is not numeric"))
    })
}
