// ABOUTME: Library root for adaptive-replicator
// ABOUTME: Schema-adaptive record sync from a cloud store and web listings into PostgreSQL

pub mod adapt;
pub mod backup;
pub mod cloud;
pub mod commands;
pub mod config;
pub mod destination;
pub mod error;
pub mod postgres;
pub mod schema;
pub mod source;
pub mod sync;
pub mod utils;
pub mod verify;
pub mod writer;

pub use error::SyncError;
