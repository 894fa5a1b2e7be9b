//! Ingestion of fetched documents and scanned files
//!
//! - [`Reconciler`] turns extracted web documents into versioned sources
//! - [`InventoryScanner`] does the same for files under a data root

mod inventory;
mod reconciler;

pub use inventory::{InventoryScanner, ScanReport};
pub use reconciler::{ReconcileOutcome, Reconciler};
