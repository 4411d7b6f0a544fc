//! Ctrl-C handling for long-running gateway calls.
//!
//! The first interrupt is only recorded: the child process (for example a
//! followed log stream) receives the signal too and ends, and the engine
//! then treats its failure as a normal exit. A second interrupt exits with
//! the conventional status 130.

use std::sync::atomic::{AtomicUsize, Ordering};

const INTERRUPTED_EXIT: i32 = 130;

#[derive(Debug, Default)]
pub struct InterruptCounter(AtomicUsize);

impl InterruptCounter {
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    /// Count one interrupt; `true` when an earlier one was already seen.
    pub fn record(&self) -> bool {
        self.0.fetch_add(1, Ordering::SeqCst) > 0
    }

    pub fn requested(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }
}

static INTERRUPTS: InterruptCounter = InterruptCounter::new();

pub fn install_signal_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        if INTERRUPTS.record() {
            std::process::exit(INTERRUPTED_EXIT);
        }
    })
}

pub fn shutdown_requested() -> bool {
    INTERRUPTS.requested()
}
