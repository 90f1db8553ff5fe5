// ABOUTME: Managed cloud store access over its REST API
// ABOUTME: Shared by the cloud record producer and the cloud destination

pub mod client;
pub mod models;

pub use client::{CloudClient, RowInsert};
