// Codec module for shapecast's encoded-value vocabulary
//
// The core never touches bytes on the wire. This module defines the closed
// set of primitives a serialization target understands, and the text
// transcoders the JSON-safe target needs for blobs and timestamps.

pub mod base85;
pub mod json;
pub mod timestamp;
pub mod types;

pub use self::types::{Encoded, Target};
