use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Cancellation signal source, polled by the engine before every probe.
/// Must not block.
pub trait InterruptSignal: Send + Sync {
    fn is_interrupted(&self) -> bool;
}

impl InterruptSignal for CancellationToken {
    fn is_interrupted(&self) -> bool {
        self.is_cancelled()
    }
}

impl InterruptSignal for AtomicBool {
    fn is_interrupted(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl<T: InterruptSignal + ?Sized> InterruptSignal for Arc<T> {
    fn is_interrupted(&self) -> bool {
        (**self).is_interrupted()
    }
}

/// Signal for runs that cannot be interrupted
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverInterrupted;

impl InterruptSignal for NeverInterrupted {
    fn is_interrupted(&self) -> bool {
        false
    }
}
