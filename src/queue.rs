//! Collaborator contracts of the producer: the buffer-queue service, shared pixel buffers and
//! composer authentication, plus in-memory implementations of each.

/// Shared pixel buffers and their CPU mappings.
pub mod buffer;
pub mod memory;
/// Buffer-queue service and composer contracts.
pub mod service;
