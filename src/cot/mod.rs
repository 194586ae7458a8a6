//! Cursor-on-Target encoding and decoding.
//!
//! The XML field and attribute names here are the interop contract with
//! unmodified TAK clients; change nothing without checking downstream.

mod decoder;
mod encoder;
mod types;

pub use decoder::decode_cot;
pub use encoder::encode_cot;
pub use types::{cot_type_for_class, CotDocument, CotView, STALE_WINDOW_SECS, UNKNOWN_ERROR_M};
