//! Progress indicators for the scan fan-out
//!
//! Uses `linya`, which draws to stderr and is safe to drive from worker threads.

use linya::{Bar, Progress};
use std::sync::{Arc, Mutex};

/// Multi-bar progress for parallel operations
/// Thread-safe wrapper for concurrent progress tracking
#[derive(Clone)]
pub struct MultiProgress {
  progress: Arc<Mutex<Progress>>,
}

impl MultiProgress {
  pub fn new() -> Self {
    Self {
      progress: Arc::new(Mutex::new(Progress::new())),
    }
  }

  /// Add a new bar with a label and total
  pub fn add_bar(&self, total: usize, label: impl Into<String>) -> Option<Bar> {
    let mut progress = self.progress.lock().ok()?;
    Some(progress.bar(total, label.into()))
  }

  /// Increment a bar (thread-safe)
  pub fn inc(&self, bar: &Bar) {
    if let Ok(mut progress) = self.progress.lock() {
      progress.inc_and_draw(bar, 1);
    }
  }
}

impl Default for MultiProgress {
  fn default() -> Self {
    Self::new()
  }
}

/// One bar per scan phase; a disabled instance does nothing
#[derive(Clone)]
pub struct ScanProgress {
  inner: Option<(MultiProgress, Arc<Bar>)>,
}

impl ScanProgress {
  pub fn new(enabled: bool, total: usize, label: impl Into<String>) -> Self {
    let inner = enabled.then(MultiProgress::new).and_then(|multi| {
      let bar = multi.add_bar(total, label)?;
      Some((multi, Arc::new(bar)))
    });
    Self { inner }
  }

  pub fn inc(&self) {
    if let Some((multi, bar)) = &self.inner {
      multi.inc(bar);
    }
  }
}
