//! Blocking HTTP client for the SciDB "shim" gateway.
//!
//! The shim exposes coarse primitives (create a session, submit an AFL
//! query, read raw bytes back, release the session); this crate turns
//! high-level raster operations into that request cycle, decoding both
//! delimited-text tables and raw binary buffers, across the two shim
//! protocol generations (before and after SciDB 15.7).

pub mod afl;
pub mod client;
pub mod decode;
mod digest;
pub mod http;
mod session;
pub mod table;
pub mod version;

pub use client::ShimClient;
pub use table::{strip_quotes, TextTable};
pub use version::ShimVersion;
