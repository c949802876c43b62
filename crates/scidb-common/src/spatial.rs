//! Spatial reference metadata: affine grid-to-world transform and CRS identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Affine transform mapping grid cell coordinates to geographic coordinates.
///
/// world_x = x0 + a11 * cell_x + a12 * cell_y
/// world_y = y0 + a21 * cell_x + a22 * cell_y
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub x0: f64,
    pub y0: f64,
    pub a11: f64,
    pub a22: f64,
    pub a12: f64,
    pub a21: f64,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self {
            x0: 0.0,
            y0: 0.0,
            a11: 1.0,
            a22: 1.0,
            a12: 0.0,
            a21: 0.0,
        }
    }
}

impl AffineTransform {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the transform to a grid coordinate.
    pub fn apply(&self, cell_x: f64, cell_y: f64) -> (f64, f64) {
        (
            self.x0 + self.a11 * cell_x + self.a12 * cell_y,
            self.y0 + self.a21 * cell_x + self.a22 * cell_y,
        )
    }

    /// Parse the `x0=..,y0=..,a11=..` serialization used by the backend.
    ///
    /// Coefficients may appear in any order; missing ones keep their
    /// identity default.
    pub fn parse(s: &str) -> Result<Self, AffineParseError> {
        let mut out = Self::default();
        for token in s.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| AffineParseError::MissingSeparator(token.to_string()))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| AffineParseError::BadCoefficient(token.to_string()))?;
            match key.trim() {
                "x0" => out.x0 = value,
                "y0" => out.y0 = value,
                "a11" => out.a11 = value,
                "a22" => out.a22 = value,
                "a12" => out.a12 = value,
                "a21" => out.a21 = value,
                other => return Err(AffineParseError::UnknownCoefficient(other.to_string())),
            }
        }
        Ok(out)
    }
}

impl std::str::FromStr for AffineTransform {
    type Err = AffineParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AffineTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x0={},y0={},a11={},a22={},a12={},a21={}",
            self.x0, self.y0, self.a11, self.a22, self.a12, self.a21
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AffineParseError {
    #[error("Affine coefficient without '=': {0}")]
    MissingSeparator(String),
    #[error("Affine coefficient is not a number: {0}")]
    BadCoefficient(String),
    #[error("Unknown affine coefficient: {0}")]
    UnknownCoefficient(String),
}

/// Spatial reference of an array: which dimensions span x/y and how the
/// grid maps to a coordinate reference system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialReference {
    /// Name of the easting/longitude dimension.
    pub xdim: String,
    /// Name of the northing/latitude dimension.
    pub ydim: String,
    /// Well-known-text CRS definition, empty if unknown.
    pub srtext: String,
    /// Proj4 CRS definition, empty if unknown.
    pub proj4text: String,
    /// CRS authority name, "UNDEFINED" if unknown.
    pub auth_name: String,
    /// CRS authority code, 0 if unknown.
    pub auth_srid: u32,
    pub affine: AffineTransform,
}

impl Default for SpatialReference {
    fn default() -> Self {
        Self {
            xdim: "x".to_string(),
            ydim: "y".to_string(),
            srtext: String::new(),
            proj4text: String::new(),
            auth_name: "UNDEFINED".to_string(),
            auth_srid: 0,
            affine: AffineTransform::default(),
        }
    }
}

impl SpatialReference {
    /// Whether an actual CRS has been assigned (as opposed to the
    /// sentinel default).
    pub fn is_defined(&self) -> bool {
        !self.srtext.is_empty()
    }
}
