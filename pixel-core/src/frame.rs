//! Once-per-refresh notification hook

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

fn noop_hook() {}

/// Runs a hook every time a full refresh completes.
///
/// The hook runs in interrupt context. A notification that arrives while the
/// hook is still running (only possible on overrun) is folded into one more
/// run after the current one returns; the hook is never re-entered.
pub struct FrameNotifier {
    hook: fn(),
    running: AtomicBool,
    pending: AtomicBool,
    notifications: AtomicU32,
    runs: AtomicU32,
}

impl FrameNotifier {
    pub const fn new(hook: fn()) -> Self {
        Self {
            hook,
            running: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            notifications: AtomicU32::new(0),
            runs: AtomicU32::new(0),
        }
    }

    /// Notifier whose hook does nothing
    pub const fn noop() -> Self {
        Self::new(noop_hook)
    }

    /// Signal a completed refresh
    pub fn notify(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);

        if self.running.swap(true, Ordering::AcqRel) {
            self.pending.store(true, Ordering::Release);
            return;
        }

        loop {
            (self.hook)();
            self.runs.fetch_add(1, Ordering::Relaxed);
            self.running.store(false, Ordering::Release);

            if !self.pending.swap(false, Ordering::AcqRel) {
                break;
            }
            // A nested notify may have claimed the hook in between
            if self.running.swap(true, Ordering::AcqRel) {
                break;
            }
        }
    }

    /// Notifications received
    pub fn notifications(&self) -> u32 {
        self.notifications.load(Ordering::Relaxed)
    }

    /// Times the hook actually ran
    pub fn runs(&self) -> u32 {
        self.runs.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Default for FrameNotifier {
    fn default() -> Self {
        Self::noop()
    }
}
