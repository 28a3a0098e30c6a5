//! # pay-supabase
//!
//! Order persistence on Supabase through PostgREST.
//!
//! ```rust,ignore
//! use pay_supabase::{SupabaseConfig, SupabaseOrderStore};
//!
//! if let Some(config) = SupabaseConfig::from_env()? {
//!     let store = Arc::new(SupabaseOrderStore::new(config)?);
//!     let reconciler = Reconciler::new(store);
//! }
//! ```

pub mod config;
pub mod row;
pub mod store;

pub use config::SupabaseConfig;
pub use row::OrderRow;
pub use store::SupabaseOrderStore;
