//! The synchronization engine.
//!
//! A run resolves the change set into identities, then applies two fixed
//! phases. Within one kind every identity is synchronized concurrently; each
//! identity is synchronized at most once per run.

pub mod cancel;
pub mod changes;
pub mod memo;
pub mod phase;
pub mod publisher;
pub mod reconcile;
pub mod revision;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use changes::{ChangeSet, ChangeSource};
pub use memo::Memo;
pub use phase::{Phase, PUT_ORDER};
pub use publisher::{Publisher, RunOutcome};
pub use reconcile::{diff, reconcile_associations, AssociationDelta};
pub use revision::RevisionController;
