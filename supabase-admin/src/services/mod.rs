// Business logic services layer
//
// Logic that sits on top of the API client and is independent of how
// results are presented, so the CLI and tests can drive it the same way.

pub mod exclusion;
