//! flowref CLI library.
//!
//! Loads compilation-unit descriptions, runs the refinement checker over
//! them and renders the results.

pub mod colors;
pub mod config;
pub mod report;
pub mod unit;
