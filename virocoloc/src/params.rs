use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// The four operator-tunable VSV rejection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParameters {
    /// Maximum minor axis length in pixels.
    pub thickness: f64,
    /// Maximum major/minor axis ratio.
    pub upper_ratio: f64,
    /// Minimum major/minor axis ratio.
    pub lower_ratio: f64,
    /// Maximum area in pixels.
    pub area: f64,
}

impl Default for ThresholdParameters {
    fn default() -> Self {
        Self {
            thickness: 18.0,
            upper_ratio: 5.0,
            lower_ratio: 1.1,
            area: 150.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdField {
    Thickness,
    UpperRatio,
    LowerRatio,
    Area,
}

impl ThresholdField {
    pub const ALL: [ThresholdField; 4] = [
        ThresholdField::Thickness,
        ThresholdField::UpperRatio,
        ThresholdField::LowerRatio,
        ThresholdField::Area,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ThresholdField::Thickness => "thickness",
            ThresholdField::UpperRatio => "upper_ratio",
            ThresholdField::LowerRatio => "lower_ratio",
            ThresholdField::Area => "area",
        }
    }
}

impl fmt::Display for ThresholdField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ThresholdField {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|field| field.name() == normalized)
            .ok_or_else(|| ParameterError::UnknownField(s.to_string()))
    }
}

impl ThresholdParameters {
    pub fn get(&self, field: ThresholdField) -> f64 {
        match field {
            ThresholdField::Thickness => self.thickness,
            ThresholdField::UpperRatio => self.upper_ratio,
            ThresholdField::LowerRatio => self.lower_ratio,
            ThresholdField::Area => self.area,
        }
    }

    /// Parse `text` and store it in `field`. On failure the current value
    /// is left untouched.
    pub fn set_from_text(&mut self, field: ThresholdField, text: &str) -> Result<f64, ParameterError> {
        let value = parse_positive(text).ok_or_else(|| ParameterError::Invalid {
            field,
            text: text.to_string(),
        })?;
        *self.slot_mut(field) = value;
        Ok(value)
    }

    /// Values in persisted order: thickness, upper ratio, lower ratio, area.
    pub fn to_array(&self) -> [f64; 4] {
        [self.thickness, self.upper_ratio, self.lower_ratio, self.area]
    }

    /// Inverse of [`Self::to_array`]. Fails on the first field that is not
    /// a positive finite number.
    pub fn from_array(values: [f64; 4]) -> Result<Self, ParameterError> {
        let mut params = Self::default();
        for (field, value) in ThresholdField::ALL.into_iter().zip(values) {
            if !is_positive(value) {
                return Err(ParameterError::Invalid {
                    field,
                    text: value.to_string(),
                });
            }
            *params.slot_mut(field) = value;
        }
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        Self::from_array(self.to_array()).map(|_| ())
    }

    fn slot_mut(&mut self, field: ThresholdField) -> &mut f64 {
        match field {
            ThresholdField::Thickness => &mut self.thickness,
            ThresholdField::UpperRatio => &mut self.upper_ratio,
            ThresholdField::LowerRatio => &mut self.lower_ratio,
            ThresholdField::Area => &mut self.area,
        }
    }
}

impl fmt::Display for ThresholdParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "thickness={} upper_ratio={} lower_ratio={} area={}",
            self.thickness, self.upper_ratio, self.lower_ratio, self.area
        )
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn parse_positive(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| is_positive(*v))
}

/// Serializes [`ThresholdParameters`] as a bare `[f64; 4]` array.
pub(crate) mod as_array {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::ThresholdParameters;

    pub fn serialize<S: Serializer>(params: &ThresholdParameters, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&params.to_array(), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ThresholdParameters, D::Error> {
        let values = <[f64; 4]>::deserialize(deserializer)?;
        ThresholdParameters::from_array(values).map_err(D::Error::custom)
    }
}
