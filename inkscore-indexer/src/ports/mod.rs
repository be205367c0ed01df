//! Port traits decoupling the pipeline from concrete infrastructure.
//!
//! Following the hexagonal layout, the service modules depend on these
//! traits; adapters live in [`crate::store`] (PostgreSQL, in-memory) and
//! [`crate::enrichment`] (notification sources).

pub mod notify;
pub mod store;
pub mod upstream;

pub use notify::{NotificationSource, RowInserted};
pub use store::{ContractStore, CursorStore, EnrichmentStore, JobStore, TransactionStore};
pub use upstream::TransactionFeed;
