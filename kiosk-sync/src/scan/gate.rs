//! Scan suppression context

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared enable control for scan parsers.
///
/// Text-entry surfaces hold a [`SuppressGuard`] while they are active. Guards
/// stack, so two overlapping surfaces keep the parser off until both close.
#[derive(Debug, Clone, Default)]
pub struct ScanGate {
    holds: Arc<AtomicUsize>,
}

impl ScanGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable scanning until the returned guard is dropped
    pub fn suppress(&self) -> SuppressGuard {
        self.holds.fetch_add(1, Ordering::SeqCst);
        SuppressGuard {
            holds: self.holds.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.holds.load(Ordering::SeqCst) == 0
    }
}

/// Keeps the gate closed while alive
#[derive(Debug)]
#[must_use = "scanning resumes as soon as the guard is dropped"]
pub struct SuppressGuard {
    holds: Arc<AtomicUsize>,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        self.holds.fetch_sub(1, Ordering::SeqCst);
    }
}
