//! Zip transport for the price table.
//!
//! Uploads arrive as a zip archive carrying one CSV entry; exports are written
//! back in the same shape with a single `data.csv` entry.

pub mod decoder;
pub mod encoder;

pub use decoder::{TabularEntry, decode};
pub use encoder::encode;
