#![forbid(unsafe_code)]

//! Core: value types shared by the formcell layout engine.
//!
//! # Role in formcell
//! `formcell-core` holds the pure, copyable primitives that every other
//! crate speaks in terms of:
//! - **Axis** / **Edge**: which dimension and which end of a boundary.
//! - **Range**: an ordered min/max pair with interpolation and overlap math.
//!
//! Nothing here owns state or knows about the cell tree. The evaluation
//! engine in `formcell-layout` derives `Range` values from resolved
//! coordinates and hands them to consumers.

pub mod axis;
pub mod range;

pub use axis::{Axis, Edge};
pub use range::Range;
