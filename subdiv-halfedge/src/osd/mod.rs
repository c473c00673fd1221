//! # Runtime data
//! `osd` holds what changes between commits and what patch evaluation reads
//! afterwards:
//! * **Buffers**
//!
//!   Strided, dirty-tracked data arrays for vertices, indices, creases,
//!   holes and levels.
//! * **Interpolation slots**
//!
//!   The per-face cache entry index handed to an external
//!   [`PatchEvaluator`] together with the commit counter.
pub mod buffer;
pub use buffer::*;

pub mod interpolation;
pub use interpolation::*;
