//! Cooperative quit signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;

use crate::types::{BenchError, BenchResult};

/// Cloneable quit flag polled by sweep loops at step boundaries.
#[derive(Debug, Clone, Default)]
pub struct QuitToken {
    flag: Arc<AtomicBool>,
}

impl QuitToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Routes Ctrl-C into the quit token so a sweep stops at the next step
/// boundary instead of tearing the process down mid-run.
pub fn install_ctrlc(token: &QuitToken) -> BenchResult<()> {
    let token = token.clone();
    ctrlc::set_handler(move || {
        info!("quit requested, finishing the current step");
        token.set();
    })
    .map_err(|err| BenchError::Initialization(format!("cannot install signal handler: {err}")))
}
