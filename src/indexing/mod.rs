//! Dual-store indexing: the write coordinator, the per-document reconciler,
//! and the service that drives them from uploads and boot scans

pub mod coordinator;
pub mod reconciler;
pub mod service;

pub use coordinator::{CommitResult, WriteCoordinator};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use service::IndexingService;
