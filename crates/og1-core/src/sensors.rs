use serde::{Deserialize, Serialize};

use crate::model::{AttrMap, AttrValue, MeasurementStream, SensorDescriptor};
use crate::vocabulary::Vocabulary;
use crate::warnings::{ConversionWarning, WarningSet};

/// A sensor rendered for the output file: its variable name (for example
/// `SENSOR_CTD_1234`) and its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEntry {
    pub name: String,
    pub attrs: AttrMap,
}

/// Renders sensor descriptors against the sensor vocabulary. A model missing
/// from the vocabulary still produces an entry, built from the descriptor
/// alone, plus a warning.
pub fn render_sensors(
    descriptors: &[SensorDescriptor],
    vocab: &Vocabulary,
    warnings: &mut WarningSet,
) -> Vec<SensorEntry> {
    let mut entries = Vec::new();
    for descriptor in descriptors {
        let mut attrs = match vocab.sensor_attrs.get(&descriptor.make_model) {
            Some(base) => base.clone(),
            None => {
                warnings.push(ConversionWarning::MissingVocabulary {
                    context: format!("sensor {}", descriptor.make_model),
                });
                let mut minimal = AttrMap::new();
                minimal.insert(
                    "long_name".to_string(),
                    AttrValue::from(descriptor.make_model.as_str()),
                );
                minimal.insert(
                    "sensor_model".to_string(),
                    AttrValue::from(descriptor.make_model.as_str()),
                );
                minimal
            }
        };

        if let Some(serial) = &descriptor.serial_number {
            attrs.insert("serial_number".to_string(), AttrValue::from(serial.as_str()));
            if let Some(AttrValue::Text(long_name)) = attrs.get_mut("long_name") {
                long_name.push(':');
                long_name.push_str(serial);
            }
        }
        if let Some(date) = &descriptor.calibration_date {
            attrs.insert(
                "calibration_date".to_string(),
                AttrValue::from(date.as_str()),
            );
        }
        if let Some(parameters) = &descriptor.calibration_parameters {
            attrs.insert(
                "calibration_parameters".to_string(),
                AttrValue::from(parameters.as_str()),
            );
        }

        let sensor_type = attrs
            .get("sensor_type")
            .and_then(|v| v.as_str())
            .unwrap_or(&descriptor.make_model)
            .to_string();
        let name = sensor_name(&sensor_type, descriptor.serial_number.as_deref());
        entries.push(SensorEntry { name, attrs });
    }
    entries
}

/// Points data variables at the sensor that measured them by setting their
/// `sensor` attribute, using the variable-to-sensor-type table.
pub fn wire_sensor_references(
    stream: &mut MeasurementStream,
    sensors: &[SensorEntry],
    vocab: &Vocabulary,
) {
    for (variable, sensor_type) in &vocab.variable_sensor_types {
        if !stream.has_variable(variable) {
            continue;
        }
        let entry = sensors.iter().find(|sensor| {
            sensor.attrs.get("sensor_type").and_then(|v| v.as_str())
                == Some(sensor_type.as_str())
        });
        if let Some(entry) = entry {
            stream.set_attr(variable, "sensor", entry.name.as_str());
        }
    }
}

fn sensor_name(sensor_type: &str, serial: Option<&str>) -> String {
    let base = match serial {
        Some(serial) => format!("sensor_{sensor_type}_{serial}"),
        None => format!("sensor_{sensor_type}"),
    };
    base.to_uppercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_names_are_uppercased_with_underscores() {
        assert_eq!(
            sensor_name("dissolved gas sensors", Some("43F123")),
            "SENSOR_DISSOLVED_GAS_SENSORS_43F123"
        );
        assert_eq!(sensor_name("CTD", None), "SENSOR_CTD");
    }
}
