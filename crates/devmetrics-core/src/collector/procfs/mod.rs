//! Statistics source backed by the Linux `/proc` filesystem.
//!
//! Renders host state in the device vocabulary: processes become tasks, the
//! page allocator stands in for the heap, and established TCP sockets are
//! the connection list.

pub mod parser;
mod source;

pub use source::ProcfsSource;
