//! Administrative tooling for a hosted Supabase project.
//!
//! The crate is split the same way the binary uses it:
//!
//! - [`config`] resolves the project URL and keys from a config file, `.env` and the environment
//! - [`api`] talks to the PostgREST (`/rest/v1`) and GoTrue (`/auth/v1`) endpoints
//! - [`services`] holds the logic that sits on top of the API, such as the bulk exclusion purge
//! - [`cli`] wires everything into `supabase-admin` subcommands

pub mod api;
pub mod cli;
pub mod config;
pub mod services;
