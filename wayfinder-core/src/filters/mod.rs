//! Position update throttling
//!
//! Location callbacks can arrive many times per second. These filters decide
//! when enough time *and* distance have passed to justify recomputing
//! anything downstream.
//!
//! Both filters are two-phase: asking whether to update never changes state,
//! the caller commits an accepted update explicitly.

mod generator;
mod location;

pub use generator::GeneratorUpdateFilter;
pub use location::LocationUpdateFilter;
