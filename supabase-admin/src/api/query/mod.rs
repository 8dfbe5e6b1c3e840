//! PostgREST query building
//!
//! Follows the same pattern as operations: `Filter` for row predicates and
//! `Query` for a full read (select, filter, order, paging).

pub mod filters;
pub mod query;

pub use filters::{Filter, FilterValue};
pub use query::{OrderBy, Query};
