/// Producer session: connection, request parameters and the dequeue/queue/cancel protocol.
pub mod producer;
/// Slot table mapping slot ids to buffer identities and dirty regions.
pub mod slot_cache;
