//! Per-content transaction log storage.
//!
//! # Data Flow
//! ```text
//! Request path
//!     → id.rs (content id from the last meaningful segment)
//!     → shard.rs (id → root/cc/cccc/id.log, or root/id.log for short ids)
//!     → store.rs (lock → pull migration for the id → append with retry)
//!
//! Startup:
//!     migration.rs sweeps root/*.log into shards on a background task
//!     → flips the store's migration state once nothing is left
//! ```
//!
//! # Design Decisions
//! - One lock per resource guards both migration and appends
//! - Writes keep checking for legacy files until the sweep reports Complete
//! - Storage failures are reported, never returned to the request path

pub mod id;
pub mod migration;
pub mod shard;
pub mod store;

pub use id::{ContentId, ContentIdError};
pub use migration::{MigrationState, MigrationSweep};
pub use store::{ContentLogStore, MigrationOutcome, StoreError};
