use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::model::{AttrMap, AttrValue};

/// A multiplicative unit conversion, keyed in [`Vocabulary::unit_conversions`]
/// by the unit being converted from.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitConversion {
    pub target_unit: String,
    pub factor: f64,
}

/// Where GPS surface fixes live in the basestation file.
#[derive(Debug, Clone, Deserialize)]
pub struct GpsFieldNames {
    /// Dimension name of the GPS group.
    pub axis: String,
    pub latitude: String,
    pub longitude: String,
    pub time: String,
}

/// The controlled vocabulary driving the conversion: dimension and variable
/// renames, per-variable attributes, unit formatting and conversion tables,
/// and sensor metadata. A built-in default covers Seaglider basestation
/// output; deployment-specific adjustments are layered on from TOML.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub dimension_renames: HashMap<String, String>,
    pub field_renames: HashMap<String, String>,
    pub variable_attrs: HashMap<String, AttrMap>,
    pub unit_formats: HashMap<String, String>,
    pub unit_conversions: HashMap<String, UnitConversion>,
    pub preferred_units: Vec<String>,
    pub gps: GpsFieldNames,
    pub calibration_prefix: String,
    pub log_prefix: String,
    pub sensor_attrs: HashMap<String, AttrMap>,
    pub variable_sensor_types: HashMap<String, String>,
}

impl Vocabulary {
    pub fn canonical_dimension(&self, dim: &str) -> Option<&str> {
        self.dimension_renames.get(dim).map(|s| s.as_str())
    }

    pub fn canonical_name(&self, field: &str) -> Option<&str> {
        self.field_renames.get(field).map(|s| s.as_str())
    }

    /// Rewrites a unit string into its canonical spelling, or returns it
    /// unchanged when no rewrite is known.
    pub fn reformat_unit<'a>(&'a self, unit: &'a str) -> &'a str {
        self.unit_formats
            .get(unit)
            .map(|s| s.as_str())
            .unwrap_or(unit)
    }

    /// The conversion to apply for a unit, but only when the conversion lands
    /// on a preferred unit. Conversions to non-preferred units never fire.
    pub fn conversion_to_preferred(&self, unit: &str) -> Option<&UnitConversion> {
        let conversion = self.unit_conversions.get(unit)?;
        if self
            .preferred_units
            .iter()
            .any(|u| u == &conversion.target_unit)
        {
            Some(conversion)
        } else {
            None
        }
    }

    /// Layers deployment-specific overrides from a TOML document over this
    /// vocabulary. Map-valued sections extend the existing tables; list and
    /// struct values replace them wholesale.
    pub fn with_overrides(mut self, overrides: VocabularyOverrides) -> Self {
        self.dimension_renames.extend(overrides.dimension_renames);
        self.field_renames.extend(overrides.field_renames);
        self.unit_formats.extend(overrides.unit_formats);
        self.unit_conversions.extend(overrides.unit_conversions);
        if let Some(preferred) = overrides.preferred_units {
            self.preferred_units = preferred;
        }
        if let Some(gps) = overrides.gps {
            self.gps = gps;
        }
        for (variable, attrs) in overrides.variable_attrs {
            self.variable_attrs.entry(variable).or_default().extend(attrs);
        }
        for (model, attrs) in overrides.sensor_attrs {
            self.sensor_attrs.entry(model).or_default().extend(attrs);
        }
        self.variable_sensor_types
            .extend(overrides.variable_sensor_types);
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let overrides: VocabularyOverrides = toml::from_str(text)?;
        Ok(default_vocabulary().clone().with_overrides(overrides))
    }
}

/// The TOML-facing shape of a vocabulary adjustment. Every section is
/// optional.
#[derive(Debug, Default, Deserialize)]
pub struct VocabularyOverrides {
    #[serde(default)]
    pub dimension_renames: HashMap<String, String>,
    #[serde(default)]
    pub field_renames: HashMap<String, String>,
    #[serde(default)]
    pub variable_attrs: HashMap<String, AttrMap>,
    #[serde(default)]
    pub unit_formats: HashMap<String, String>,
    #[serde(default)]
    pub unit_conversions: HashMap<String, UnitConversion>,
    #[serde(default)]
    pub preferred_units: Option<Vec<String>>,
    #[serde(default)]
    pub gps: Option<GpsFieldNames>,
    #[serde(default)]
    pub sensor_attrs: HashMap<String, AttrMap>,
    #[serde(default)]
    pub variable_sensor_types: HashMap<String, String>,
}

fn text_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn attr_map(pairs: Vec<(&str, AttrValue)>) -> AttrMap {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

static DEFAULT_VOCABULARY: Lazy<Vocabulary> = Lazy::new(|| {
    let dimension_renames = text_map(&[("sg_data_point", "N_MEASUREMENTS")]);

    let field_renames = text_map(&[
        ("ctd_time", "TIME"),
        ("latitude", "LATITUDE"),
        ("longitude", "LONGITUDE"),
        ("ctd_depth", "DEPTH"),
        ("pressure", "PRES"),
        ("conductivity", "CNDC"),
        ("temperature", "TEMP"),
        ("salinity", "PSAL"),
        ("vert_speed", "VERT_GLIDER_SPEED"),
        ("horz_speed", "HORZ_GLIDER_SPEED"),
        ("speed", "GLIDER_SPEED"),
        ("glide_angle", "GLIDE_ANGLE"),
        ("heading", "HEADING"),
        ("eng_pitchAng", "PITCH"),
        ("eng_rollAng", "ROLL"),
        ("aanderaa4330_dissolved_oxygen", "DOXY"),
    ]);

    let unit_formats = text_map(&[
        ("m/s", "m s-1"),
        ("cm/s", "cm s-1"),
        ("S/m", "S m-1"),
        ("mS/cm", "mS cm-1"),
        ("meters", "m"),
        ("degrees_Celsius", "Celsius"),
        ("degreesCelsius", "Celsius"),
        ("g/m^3", "g m-3"),
        ("kg/m^3", "kg m-3"),
    ]);

    let unit_conversions: HashMap<String, UnitConversion> = [
        ("cm s-1", "m s-1", 0.01),
        ("m s-1", "cm s-1", 100.0),
        ("cm/s", "m/s", 0.01),
        ("m/s", "cm/s", 100.0),
        ("mS cm-1", "S m-1", 0.1),
        ("S m-1", "mS cm-1", 10.0),
        ("mS/cm", "S/m", 0.1),
        ("S/m", "mS/cm", 10.0),
        ("Pa", "dbar", 0.0001),
        ("dbar", "Pa", 10000.0),
        ("cm", "m", 0.01),
        ("km", "m", 1000.0),
        ("g m-3", "kg m-3", 0.001),
        ("kg m-3", "g m-3", 1000.0),
        ("degrees_Celsius", "Celsius", 1.0),
        ("Celsius", "degrees_Celsius", 1.0),
    ]
    .into_iter()
    .map(|(from, to, factor)| {
        (
            from.to_string(),
            UnitConversion {
                target_unit: to.to_string(),
                factor,
            },
        )
    })
    .collect();

    let mut variable_attrs = HashMap::new();
    variable_attrs.insert(
        "TIME".to_string(),
        attr_map(vec![
            ("units", "seconds since 1970-01-01T00:00:00Z".into()),
            ("calendar", "gregorian".into()),
            ("long_name", "time of measurement".into()),
            ("observation_type", "measured".into()),
            ("standard_name", "time".into()),
        ]),
    );
    variable_attrs.insert(
        "LATITUDE".to_string(),
        attr_map(vec![
            ("units", "degrees_north".into()),
            ("long_name", "latitude".into()),
            ("standard_name", "latitude".into()),
            ("axis", "Y".into()),
            ("valid_min", (-90.0).into()),
            ("valid_max", 90.0.into()),
            ("reference", "WGS84".into()),
            ("observation_type", "measured".into()),
            (
                "coordinate_reference_frame",
                "urn:ogc:crs:EPSG::4326".into(),
            ),
        ]),
    );
    variable_attrs.insert(
        "LONGITUDE".to_string(),
        attr_map(vec![
            ("units", "degrees_east".into()),
            ("long_name", "longitude".into()),
            ("standard_name", "longitude".into()),
            ("axis", "X".into()),
            ("valid_min", (-180.0).into()),
            ("valid_max", 180.0.into()),
            ("reference", "WGS84".into()),
            ("observation_type", "measured".into()),
            (
                "coordinate_reference_frame",
                "urn:ogc:crs:EPSG::4326".into(),
            ),
        ]),
    );
    variable_attrs.insert(
        "DEPTH".to_string(),
        attr_map(vec![
            ("units", "m".into()),
            ("long_name", "glider depth".into()),
            ("standard_name", "depth".into()),
            ("source", "pressure".into()),
            ("observation_type", "calculated".into()),
            ("positive", "down".into()),
            ("reference_datum", "surface".into()),
            ("valid_min", 0.0.into()),
            ("valid_max", 1000.0.into()),
        ]),
    );
    variable_attrs.insert(
        "PRES".to_string(),
        attr_map(vec![
            ("units", "dbar".into()),
            (
                "long_name",
                "Pressure (spatial coordinate) exerted by the water body by profiling pressure sensor and correction to read zero at sea level"
                    .into(),
            ),
            ("standard_name", "sea_water_pressure".into()),
            ("observation_type", "measured".into()),
            ("positive", "down".into()),
            ("reference_datum", "sea-surface".into()),
            ("comment", "ctd pressure sensor".into()),
            ("valid_min", 0.0.into()),
            ("valid_max", 2000.0.into()),
        ]),
    );
    variable_attrs.insert(
        "TEMP".to_string(),
        attr_map(vec![
            ("units", "Celsius".into()),
            (
                "long_name",
                "Temperature of the water body by CTD or STD".into(),
            ),
            ("standard_name", "sea_water_temperature".into()),
            ("observation_type", "measured".into()),
            ("valid_min", (-5.0).into()),
            ("valid_max", 42.0.into()),
        ]),
    );
    variable_attrs.insert(
        "PSAL".to_string(),
        attr_map(vec![
            ("units", "1".into()),
            ("long_name", "water salinity".into()),
            ("standard_name", "sea_water_practical_salinity".into()),
            ("observation_type", "calculated".into()),
            ("valid_min", 0.0.into()),
            ("valid_max", 40.0.into()),
        ]),
    );
    variable_attrs.insert(
        "CNDC".to_string(),
        attr_map(vec![
            ("units", "S m-1".into()),
            (
                "long_name",
                "Electrical conductivity of the water body by CTD".into(),
            ),
            ("standard_name", "sea_water_electrical_conductivity".into()),
            ("observation_type", "measured".into()),
            ("valid_min", 0.0.into()),
            ("valid_max", 8.5.into()),
        ]),
    );
    variable_attrs.insert(
        "DOXY".to_string(),
        attr_map(vec![
            ("units", "mmol m-3".into()),
            ("long_name", "oxygen concentration".into()),
            (
                "standard_name",
                "mole_concentration_of_dissolved_molecular_oxygen_in_sea_water".into(),
            ),
            ("observation_type", "calculated".into()),
            ("valid_min", 0.0.into()),
            ("valid_max", 425.0.into()),
        ]),
    );
    variable_attrs.insert(
        "VERT_GLIDER_SPEED".to_string(),
        attr_map(vec![
            ("units", "m s-1".into()),
            ("long_name", "vertical glider speed".into()),
            ("observation_type", "calculated".into()),
        ]),
    );
    variable_attrs.insert(
        "HORZ_GLIDER_SPEED".to_string(),
        attr_map(vec![
            ("units", "m s-1".into()),
            ("long_name", "horizontal glider speed".into()),
            ("observation_type", "calculated".into()),
        ]),
    );
    variable_attrs.insert(
        "GLIDER_SPEED".to_string(),
        attr_map(vec![
            ("units", "m s-1".into()),
            ("long_name", "glider speed through water".into()),
            ("observation_type", "calculated".into()),
        ]),
    );
    variable_attrs.insert(
        "GLIDE_ANGLE".to_string(),
        attr_map(vec![
            ("units", "degrees".into()),
            ("long_name", "glide angle".into()),
            ("observation_type", "calculated".into()),
        ]),
    );
    variable_attrs.insert(
        "HEADING".to_string(),
        attr_map(vec![
            ("units", "degrees".into()),
            ("long_name", "glider heading angle".into()),
            ("observation_type", "measured".into()),
        ]),
    );
    variable_attrs.insert(
        "PITCH".to_string(),
        attr_map(vec![
            ("units", "degrees".into()),
            ("long_name", "glider pitch angle".into()),
            ("observation_type", "measured".into()),
        ]),
    );
    variable_attrs.insert(
        "ROLL".to_string(),
        attr_map(vec![
            ("units", "degrees".into()),
            ("long_name", "glider roll angle".into()),
            ("observation_type", "measured".into()),
        ]),
    );

    let mut sensor_attrs = HashMap::new();
    sensor_attrs.insert(
        "Seabird unpumped CTD".to_string(),
        attr_map(vec![
            ("sensor_type", "CTD".into()),
            (
                "sensor_type_vocabulary",
                "https://vocab.nerc.ac.uk/collection/L05/current/130/".into(),
            ),
            ("long_name", "Sea-Bird unpumped CTD".into()),
            ("sensor_maker", "Sea-Bird Scientific".into()),
            (
                "sensor_maker_vocabulary",
                "https://vocab.nerc.ac.uk/collection/L35/current/MAN0013/".into(),
            ),
            ("sensor_model", "Sea-Bird unpumped CTD".into()),
        ]),
    );
    sensor_attrs.insert(
        "Seabird SBE43F".to_string(),
        attr_map(vec![
            ("sensor_type", "dissolved gas sensors".into()),
            (
                "sensor_type_vocabulary",
                "https://vocab.nerc.ac.uk/collection/L05/current/351/".into(),
            ),
            ("long_name", "Sea-Bird SBE43F".into()),
            ("sensor_maker", "Sea-Bird Scientific".into()),
            (
                "sensor_maker_vocabulary",
                "https://vocab.nerc.ac.uk/collection/L35/current/MAN0013/".into(),
            ),
            ("sensor_model", "SBE43F".into()),
        ]),
    );
    sensor_attrs.insert(
        "Wetlabs BBFL2VMT".to_string(),
        attr_map(vec![
            ("sensor_type", "fluorometers".into()),
            (
                "sensor_type_vocabulary",
                "https://vocab.nerc.ac.uk/collection/L05/current/113/".into(),
            ),
            ("long_name", "WET Labs ECO Puck BBFL2VMT".into()),
            ("sensor_maker", "WET Labs".into()),
            (
                "sensor_maker_vocabulary",
                "https://vocab.nerc.ac.uk/collection/L35/current/MAN0026/".into(),
            ),
            ("sensor_model", "BBFL2VMT".into()),
        ]),
    );

    let variable_sensor_types = text_map(&[
        ("CNDC", "CTD"),
        ("DOXY", "dissolved gas sensors"),
        ("PRES", "CTD"),
        ("PSAL", "CTD"),
        ("TEMP", "CTD"),
        ("BBP700", "fluorometers"),
        ("CHLA", "fluorometers"),
        ("PRES_ADCP", "ADVs and turbulence probes"),
    ]);

    Vocabulary {
        dimension_renames,
        field_renames,
        variable_attrs,
        unit_formats,
        unit_conversions,
        preferred_units: vec![
            "m s-1".to_string(),
            "dbar".to_string(),
            "S m-1".to_string(),
        ],
        gps: GpsFieldNames {
            axis: "gps_info".to_string(),
            latitude: "log_gps_lat".to_string(),
            longitude: "log_gps_lon".to_string(),
            time: "log_gps_time".to_string(),
        },
        calibration_prefix: "sg_cal".to_string(),
        log_prefix: "log_".to_string(),
        sensor_attrs,
        variable_sensor_types,
    }
});

pub fn default_vocabulary() -> &'static Vocabulary {
    &DEFAULT_VOCABULARY
}
