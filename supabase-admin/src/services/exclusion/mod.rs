// Bulk exclusion service
//
// Removes every record of a collection except a protected set of keys,
// either with one filtered delete or record by record with per-record outcomes.

pub mod models;
pub mod operator;

pub use models::{
    BatchOutcome, DeleteOutcome, ExclusionReport, ProtectedSet, RecordOutcome, Strategy, Targets,
};
pub use operator::{BulkExclusion, ExclusionError};
