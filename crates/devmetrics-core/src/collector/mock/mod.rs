//! Mocks for testing sources and the report builder.
//!
//! `MockFs` and its scenarios stand in for `/proc`; `FixtureSource` serves
//! statistics directly without any parsing.

mod filesystem;
mod fixture;
mod scenarios;

pub use filesystem::MockFs;
pub use fixture::FixtureSource;
