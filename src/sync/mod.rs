// ABOUTME: Synchronization orchestration and run reporting
// ABOUTME: Exposes SyncOrchestrator, BatchResult, and SyncReport

pub mod orchestrator;
pub mod report;

pub use orchestrator::{SyncOptions, SyncOrchestrator};
pub use report::{BatchResult, BatchStatus, ReportTotals, SyncReport};
