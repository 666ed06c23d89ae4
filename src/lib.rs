//! Pare compares container images.
//!
//! The diff engines under [`diff`] are pure in-memory computations over
//! already-materialized package maps and directory listings; image
//! acquisition ([`image`]) and report rendering ([`output`]) sit on either
//! side of them.

pub mod analyzer;
pub mod cmd;
pub mod diff;
pub mod image;
pub mod output;
pub mod progress;
