//! End-to-end tests driving the scan-sources binary against local git repositories

mod helpers;
mod test_components;
mod test_reconcile;
mod test_scan;
