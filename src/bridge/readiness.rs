//! Session readiness flag.
//!
//! One writer, many readers. The writer is not `Clone`, so whoever owns it
//! (the event bridge) is the only thing that can flip the flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Read side of the readiness flag. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    /// Whether the chat session can currently relay notices.
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Write side of the readiness flag.
#[derive(Debug)]
pub struct ReadinessWriter(Arc<AtomicBool>);

impl ReadinessWriter {
    /// Set the flag.
    pub fn set(&self, ready: bool) {
        self.0.store(ready, Ordering::Release);
    }

    /// A new reader for the same flag.
    pub fn reader(&self) -> Readiness {
        Readiness(Arc::clone(&self.0))
    }
}

/// Create a readiness flag, initially not ready.
pub fn readiness() -> (ReadinessWriter, Readiness) {
    let flag = Arc::new(AtomicBool::new(false));
    (ReadinessWriter(Arc::clone(&flag)), Readiness(flag))
}
