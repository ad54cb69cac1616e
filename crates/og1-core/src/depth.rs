use polars::prelude::*;

use crate::error::{PipelineError, Result};
use crate::model::MeasurementStream;

/// Depth in meters (positive down) from sea pressure in dbar, using the
/// UNESCO / Fofonoff-Millard formula with the standard-ocean specific volume
/// anomaly taken as zero.
pub fn depth_from_pressure(pressure_dbar: f64, latitude_deg: f64) -> f64 {
    let x = latitude_deg.to_radians().sin();
    let x = x * x;
    let gravity = 9.780318 * (1.0 + (5.2788e-3 + 2.36e-5 * x) * x) + 1.092e-6 * pressure_dbar;
    ((((-1.82e-15 * pressure_dbar + 2.279e-10) * pressure_dbar - 2.2512e-5) * pressure_dbar
        + 9.72659)
        * pressure_dbar)
        / gravity
}

/// Adds a `DEPTH_Z` column, the measurement depth with positive up, so
/// in-water samples are negative. Rows with a missing pressure or latitude
/// get a null.
///
/// Requires `PRES`, `LATITUDE`, and `LONGITUDE` to be present.
pub fn attach_depth(stream: &mut MeasurementStream) -> Result<()> {
    for required in ["PRES", "LATITUDE", "LONGITUDE"] {
        if !stream.has_variable(required) {
            return Err(PipelineError::MissingField {
                field: required.to_string(),
                stage: "depth derivation",
            });
        }
    }

    let pressures = float_values(&stream.frame, "PRES")?;
    let latitudes = float_values(&stream.frame, "LATITUDE")?;

    let depth_z: Vec<Option<f64>> = pressures
        .iter()
        .zip(latitudes.iter())
        .map(|(pressure, latitude)| match (pressure, latitude) {
            (Some(p), Some(lat)) if !p.is_nan() && !lat.is_nan() => {
                Some(-depth_from_pressure(*p, *lat))
            }
            _ => None,
        })
        .collect();

    let series = Series::new("DEPTH_Z".into(), depth_z);
    stream.frame.hstack_mut(&[series.into()])?;

    stream.set_attr("DEPTH_Z", "units", "m");
    stream.set_attr("DEPTH_Z", "positive", "up");
    stream.set_attr("DEPTH_Z", "standard_name", "depth");
    stream.set_attr(
        "DEPTH_Z",
        "comment",
        "Depth calculated from pressure, positive up.",
    );

    Ok(())
}

fn float_values(frame: &DataFrame, column: &str) -> Result<Vec<Option<f64>>> {
    let cast = frame
        .column(column)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}
