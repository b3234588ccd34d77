//! Store facade
//!
//! # Architecture
//!
//! - `store.rs` - [`LineStore`]: open/load, reads, raw SQL, close
//! - `mutations.rs` - insert / update / delete and their batch forms
//! - `sync.rs` - Writing tables back to their files
//! - `transactions.rs` - BEGIN / COMMIT / ROLLBACK coordination
//! - `config.rs` - [`StoreConfig`] builder
//! - `logging.rs` - Injected logging sink

pub mod config;
pub mod logging;
pub mod mutations;
pub mod store;
pub mod sync;
pub mod transactions;

pub use config::StoreConfig;
pub use logging::{LoadWarning, StoreLogger, TracingLogger};
pub use mutations::UpdateOptions;
pub use store::{FindOptions, LineStore};
