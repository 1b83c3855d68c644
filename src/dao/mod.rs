/// Wire models exchanged with the standings store.
pub mod models;
/// Collaborator contract for fetching standings and subscribing to changes.
pub mod participant_source;
/// Storage abstraction error types.
pub mod storage;
