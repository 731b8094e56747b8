//! CLI commands for scan-sources
//!
//! - **scan**: decide which components need a rebuild and print the report
//! - **components**: list the loaded catalog with its dependency edges
//!
//! All commands accept `&ScanContext` to avoid redundant config loads.

pub mod components;
pub mod scan;

pub use components::run_components;
pub use scan::{ScanArgs, run_scan};
