//! Caller-facing operation surface.

/// Polymorphic window interface.
pub mod native;
/// Typed operations and query keys.
pub mod ops;
