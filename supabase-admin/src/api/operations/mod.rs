//! Supabase operations module
//!
//! Describes the remote calls the tool makes so they can be planned,
//! printed in dry runs and referenced in logs.

pub mod operation;

pub use operation::Operation;
