//! Shared foundation for the Skola commerce service
//!
//! Provides the pieces every Skola service needs: error types, bootstrap
//! configuration, database initialization and schema, the settings store,
//! money arithmetic, and the in-process event bus.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod money;

pub use error::{Error, Result};
