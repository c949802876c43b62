//! Common types shared between the SciDB shim client and its raster consumers.

pub mod error;
pub mod params;
pub mod schema;
pub mod spatial;
pub mod temporal;
pub mod typeid;

pub use error::{ShimError, ShimResult, StatusCode};
pub use params::{ArrayKind, ConnectionParameters, CreationParameters, QueryParameters};
pub use schema::{
    ArrayDesc, AttributeStats, Metadata, SciDBArray, SciDBAttribute, SciDBDimension, TileWindow,
    SCIDB_MAX_DIM_INDEX,
};
pub use spatial::{AffineTransform, SpatialReference};
pub use temporal::{TemporalInterval, TemporalReference};
