/// Shared value types.
pub mod core;
/// Error taxonomy and result codes.
pub mod error;
pub mod region;
