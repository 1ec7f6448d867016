//! Database access for Skola services

pub mod init;
pub mod settings;

pub use init::{init_database, init_schema};
