//! Array schema entities: attributes, dimensions and the closed set of
//! array kinds the backend distinguishes.

use crate::spatial::SpatialReference;
use crate::temporal::TemporalReference;
use crate::typeid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Sentinel the backend reports for unspecified dimension bounds.
///
/// Bounds equal to (plus or minus) this value must be re-derived from
/// the dimension's start and length.
pub const SCIDB_MAX_DIM_INDEX: i64 = 4_611_686_018_427_387_903;

/// Key/value metadata for one domain (the domain string is currently
/// always empty).
pub type Metadata = BTreeMap<String, String>;

/// One array attribute (a raster band, from the consumer's viewpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SciDBAttribute {
    pub name: String,
    /// SciDB primitive type id, e.g. "uint8" or "double".
    pub type_id: String,
    pub nullable: bool,
    /// Metadata keyed by domain.
    #[serde(default)]
    pub metadata: BTreeMap<String, Metadata>,
}

impl SciDBAttribute {
    pub fn new(name: impl Into<String>, type_id: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_id: type_id.into(),
            nullable,
            metadata: BTreeMap::new(),
        }
    }

    /// Declared NODATA metadata value in the default domain, if any.
    pub fn declared_nodata(&self) -> Option<&str> {
        self.metadata
            .get("")
            .and_then(|md| md.get("NODATA"))
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// No-data value as an AFL literal: the declared NODATA metadata,
    /// falling back to the type default.
    pub fn nodata_literal(&self) -> Option<String> {
        if let Some(v) = self.declared_nodata() {
            return Some(v.to_string());
        }
        typeid::default_nodata_literal(&self.type_id)
    }

    /// Size in bytes of one cell of this attribute.
    pub fn byte_len(&self) -> Option<usize> {
        typeid::byte_len(&self.type_id)
    }
}

/// One array dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SciDBDimension {
    pub name: String,
    pub low: i64,
    pub high: i64,
    /// Integer type id; non-integer dimension types are rejected.
    pub type_id: String,
    pub chunk_size: i64,
    pub start: i64,
    pub length: i64,
}

impl SciDBDimension {
    /// Whether either bound still carries the "unspecified" sentinel.
    pub fn has_unspecified_bounds(&self) -> bool {
        self.low.abs() == SCIDB_MAX_DIM_INDEX || self.high.abs() == SCIDB_MAX_DIM_INDEX
    }

    /// Upper bound rendered for AFL schema strings: "*" when unbounded.
    pub fn high_or_star(&self) -> String {
        if self.high == SCIDB_MAX_DIM_INDEX {
            "*".to_string()
        } else {
            self.high.to_string()
        }
    }
}

/// A named SciDB array: attributes, dimensions and array-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SciDBArray {
    pub name: String,
    pub attrs: Vec<SciDBAttribute>,
    pub dims: Vec<SciDBDimension>,
    /// Array-level metadata keyed by domain.
    #[serde(default)]
    pub metadata: BTreeMap<String, Metadata>,
}

impl SciDBArray {
    /// AFL schema string: `<a:type NULL,...> [d=low:high,chunk,0, ...]`.
    pub fn schema_string(&self) -> String {
        let mut s = String::new();
        s.push('<');
        for (i, a) in self.attrs.iter().enumerate() {
            if i > 0 {
                s.push(',');
            }
            let _ = write!(
                s,
                "{}:{}{}",
                a.name,
                a.type_id,
                if a.nullable { " NULL" } else { "" }
            );
        }
        s.push_str("> [");
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                s.push_str(", ");
            }
            let _ = write!(
                s,
                "{}={}:{},{},0",
                d.name,
                d.low,
                d.high_or_star(),
                d.chunk_size
            );
        }
        s.push(']');
        s
    }

    /// Binary cell format for ingest: `(type1,type2,...)`.
    pub fn format_string(&self) -> String {
        let types: Vec<&str> = self.attrs.iter().map(|a| a.type_id.as_str()).collect();
        format!("({})", types.join(","))
    }

    /// Sum of the attribute cell sizes: bytes per pixel in the binary
    /// ingest format.
    pub fn pixel_bytes(&self) -> usize {
        self.attrs.iter().filter_map(|a| a.byte_len()).sum()
    }

    pub fn dim_index(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.name == name)
    }
}

/// The closed set of array kinds the backend's `setting` tag encodes.
///
/// A plain array carries no reference metadata; a spatial array binds
/// two dimensions to a CRS; a spatio-temporal array additionally binds
/// one dimension to calendar time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayDesc {
    Plain(SciDBArray),
    Spatial {
        array: SciDBArray,
        srs: SpatialReference,
    },
    SpatioTemporal {
        array: SciDBArray,
        srs: SpatialReference,
        trs: TemporalReference,
    },
}

impl ArrayDesc {
    pub fn base(&self) -> &SciDBArray {
        match self {
            ArrayDesc::Plain(a) => a,
            ArrayDesc::Spatial { array, .. } => array,
            ArrayDesc::SpatioTemporal { array, .. } => array,
        }
    }

    pub fn base_mut(&mut self) -> &mut SciDBArray {
        match self {
            ArrayDesc::Plain(a) => a,
            ArrayDesc::Spatial { array, .. } => array,
            ArrayDesc::SpatioTemporal { array, .. } => array,
        }
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn srs(&self) -> Option<&SpatialReference> {
        match self {
            ArrayDesc::Plain(_) => None,
            ArrayDesc::Spatial { srs, .. } => Some(srs),
            ArrayDesc::SpatioTemporal { srs, .. } => Some(srs),
        }
    }

    pub fn trs(&self) -> Option<&TemporalReference> {
        match self {
            ArrayDesc::SpatioTemporal { trs, .. } => Some(trs),
            _ => None,
        }
    }

    /// Index of the x dimension: the SRS dimension name when present,
    /// otherwise a dimension literally named "x", otherwise the second
    /// dimension.
    pub fn x_dim_index(&self) -> Option<usize> {
        let base = self.base();
        if let Some(srs) = self.srs() {
            if let Some(i) = base.dim_index(&srs.xdim) {
                return Some(i);
            }
        }
        base.dim_index("x").or(if base.dims.len() >= 2 {
            Some(1)
        } else {
            None
        })
    }

    /// Index of the y dimension, resolved like [`Self::x_dim_index`]
    /// with the first dimension as positional fallback.
    pub fn y_dim_index(&self) -> Option<usize> {
        let base = self.base();
        if let Some(srs) = self.srs() {
            if let Some(i) = base.dim_index(&srs.ydim) {
                return Some(i);
            }
        }
        base.dim_index("y")
            .or(if !base.dims.is_empty() { Some(0) } else { None })
    }

    pub fn x_dim(&self) -> Option<&SciDBDimension> {
        self.x_dim_index().map(|i| &self.base().dims[i])
    }

    pub fn y_dim(&self) -> Option<&SciDBDimension> {
        self.y_dim_index().map(|i| &self.base().dims[i])
    }

    /// The temporal dimension of a spatio-temporal array.
    pub fn t_dim(&self) -> Option<&SciDBDimension> {
        let trs = self.trs()?;
        self.base()
            .dims
            .iter()
            .find(|d| d.name == trs.tdim)
    }
}

/// Rectangular pixel-space window of a tile transfer, inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileWindow {
    pub x_min: i64,
    pub y_min: i64,
    pub x_max: i64,
    pub y_max: i64,
}

impl TileWindow {
    pub fn new(x_min: i64, y_min: i64, x_max: i64, y_max: i64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn width(&self) -> i64 {
        self.x_max - self.x_min + 1
    }

    pub fn height(&self) -> i64 {
        self.y_max - self.y_min + 1
    }

    pub fn cells(&self) -> i64 {
        self.width() * self.height()
    }

    /// Whether the window lies inside both dimensions' declared bounds.
    pub fn within(&self, x: &SciDBDimension, y: &SciDBDimension) -> bool {
        self.x_min >= x.low
            && self.x_max <= x.high
            && self.x_min <= self.x_max
            && self.y_min >= y.low
            && self.y_max <= y.high
            && self.y_min <= self.y_max
    }

    /// Whether the window covers the full declared extent of both
    /// dimensions (start through start+length-1).
    pub fn covers_full_extent(&self, x: &SciDBDimension, y: &SciDBDimension) -> bool {
        self.x_min == x.start
            && self.y_min == y.start
            && self.x_max == x.start + x.length - 1
            && self.y_max == y.start + y.length - 1
    }
}

/// Summary statistics for one attribute, computed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributeStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stdev: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim(name: &str, low: i64, high: i64, chunk: i64) -> SciDBDimension {
        SciDBDimension {
            name: name.to_string(),
            low,
            high,
            type_id: "int64".to_string(),
            chunk_size: chunk,
            start: low,
            length: high - low + 1,
        }
    }

    fn spatial_desc() -> ArrayDesc {
        ArrayDesc::Spatial {
            array: SciDBArray {
                name: "chicago".to_string(),
                attrs: vec![
                    SciDBAttribute::new("band1", "uint8", false),
                    SciDBAttribute::new("band2", "int16", true),
                ],
                dims: vec![dim("y", 0, 999, 512), dim("x", 0, 1999, 512)],
                metadata: BTreeMap::new(),
            },
            srs: SpatialReference::default(),
        }
    }

    #[test]
    fn test_schema_string() {
        let desc = spatial_desc();
        assert_eq!(
            desc.base().schema_string(),
            "<band1:uint8,band2:int16 NULL> [y=0:999,512,0, x=0:1999,512,0]"
        );
    }

    #[test]
    fn test_schema_string_unbounded() {
        let mut desc = spatial_desc();
        desc.base_mut().dims[1].high = SCIDB_MAX_DIM_INDEX;
        assert!(desc.base().schema_string().contains("x=0:*,512,0"));
    }

    #[test]
    fn test_format_string_and_pixel_bytes() {
        let desc = spatial_desc();
        assert_eq!(desc.base().format_string(), "(uint8,int16)");
        assert_eq!(desc.base().pixel_bytes(), 3);
    }

    #[test]
    fn test_dimension_resolution() {
        let desc = spatial_desc();
        assert_eq!(desc.x_dim_index(), Some(1));
        assert_eq!(desc.y_dim_index(), Some(0));
        assert_eq!(desc.x_dim().unwrap().name, "x");
        assert_eq!(desc.y_dim().unwrap().name, "y");
    }

    #[test]
    fn test_nodata_fallback() {
        let mut attr = SciDBAttribute::new("band1", "uint8", true);
        assert_eq!(attr.nodata_literal().as_deref(), Some("255"));
        attr.metadata
            .entry(String::new())
            .or_default()
            .insert("NODATA".to_string(), "9999".to_string());
        assert_eq!(attr.nodata_literal().as_deref(), Some("9999"));
    }

    #[test]
    fn test_window_bounds() {
        let x = dim("x", 0, 99, 10);
        let y = dim("y", 0, 49, 10);
        assert!(TileWindow::new(0, 0, 99, 49).within(&x, &y));
        assert!(TileWindow::new(0, 0, 99, 49).covers_full_extent(&x, &y));
        assert!(!TileWindow::new(-1, 0, 10, 10).within(&x, &y));
        assert!(!TileWindow::new(0, 0, 100, 49).within(&x, &y));
        assert!(!TileWindow::new(0, 0, 98, 49).covers_full_extent(&x, &y));
    }
}
