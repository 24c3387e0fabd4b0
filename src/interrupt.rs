//! Operator interrupt (Ctrl-C) tracking
//!
//! Once the handler is installed, Ctrl-C no longer kills dbkeeper itself. The
//! child processes in the foreground process group still receive the signal
//! and exit, so whatever remote step was running fails on its own and the
//! restore workflow gets to clean up its staged copy before reporting.
//!
//! The handler is installed lazily by `CtrlCWatcher::arm`. Workflows arm it
//! only once they are committed to remote work, so Ctrl-C at the restore
//! confirmation prompt still ends the process immediately.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::thread;

#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where a workflow learns about operator interrupts.
pub trait Interrupts {
    /// Start routing Ctrl-C into this source. Until then Ctrl-C keeps its
    /// default meaning and ends the process.
    fn arm(&self);

    fn is_set(&self) -> bool;
}

/// A bare flag is already armed; whoever holds a clone decides when it fires.
impl Interrupts for InterruptFlag {
    fn arm(&self) {}

    fn is_set(&self) -> bool {
        InterruptFlag::is_set(self)
    }
}

/// Installs the Ctrl-C handler on the first `arm`, never before.
#[derive(Debug)]
pub struct CtrlCWatcher {
    flag: InterruptFlag,
    installed: Once,
}

impl CtrlCWatcher {
    pub fn new() -> Self {
        Self {
            flag: InterruptFlag::new(),
            installed: Once::new(),
        }
    }
}

impl Default for CtrlCWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupts for CtrlCWatcher {
    fn arm(&self) {
        self.installed.call_once(|| {
            if let Err(e) = install_ctrl_c_handler(self.flag.clone()) {
                tracing::warn!(error = %e, "could not install Ctrl-C handler; an interrupt will skip cleanup");
            }
        });
    }

    fn is_set(&self) -> bool {
        self.flag.is_set()
    }
}

/// Route Ctrl-C into `flag` for the rest of the process lifetime.
pub fn install_ctrl_c_handler(flag: InterruptFlag) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("dbkeeper-signals".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    flag.trigger();
                    tracing::warn!("interrupt received; finishing current step and cleaning up");
                }
            })
        })?;

    Ok(())
}
