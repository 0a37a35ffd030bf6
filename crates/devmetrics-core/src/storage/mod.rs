//! Persisted statistics captures.
//!
//! A capture freezes what a statistics source returned at one moment so the
//! same report can be rebuilt later, byte for byte.

mod capture;

pub use capture::StatsCapture;
