//! Records exchanged with the poll service, plus the client-side views built from them.

pub mod deadline;
pub mod pagination;
pub mod poll;
pub mod results;
pub mod selection;
pub mod user;
pub mod vote;

/// Poll IDs are opaque strings issued by the service.
pub type PollId = String;
/// Variant IDs are opaque strings issued by the service.
pub type VariantId = String;
/// User IDs are opaque strings issued by the service.
pub type UserId = String;
