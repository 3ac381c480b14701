//! Readiness Gate
//!
//! The slave side exposes a single "ready" bit; the master polls it before
//! each exchange. There is no blocking wait primitive, only `poll`.

use crate::GateError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Result of one poll.
#[derive(Debug)]
pub enum Readiness {
    Ready,
    NotReady,
    /// The indicator could not be read. Callers treat this as not ready.
    Inaccessible(GateError),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

pub trait ReadinessGate: Send {
    fn poll(&mut self) -> Readiness;

    /// One-time startup check; an inaccessible indicator here is fatal.
    fn probe(&mut self) -> Result<(), GateError> {
        match self.poll() {
            Readiness::Inaccessible(e) => Err(e),
            _ => Ok(()),
        }
    }
}

impl<G: ReadinessGate + ?Sized> ReadinessGate for Box<G> {
    fn poll(&mut self) -> Readiness {
        (**self).poll()
    }

    fn probe(&mut self) -> Result<(), GateError> {
        (**self).probe()
    }
}

/// Reads an integer attribute; any non-zero value means ready.
#[derive(Debug, Clone)]
pub struct SysfsGate {
    path: PathBuf,
}

impl SysfsGate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReadinessGate for SysfsGate {
    fn poll(&mut self) -> Readiness {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(source) => {
                return Readiness::Inaccessible(GateError::Unreadable {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match content.trim().parse::<i64>() {
            Ok(0) => Readiness::NotReady,
            Ok(_) => Readiness::Ready,
            Err(_) => Readiness::Inaccessible(GateError::Malformed {
                path: self.path.clone(),
                content: content.trim().to_string(),
            }),
        }
    }
}

/// Gate for setups without a ready line.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

impl ReadinessGate for AlwaysReady {
    fn poll(&mut self) -> Readiness {
        Readiness::Ready
    }
}

#[derive(Debug)]
struct GateState {
    ready: AtomicBool,
    inaccessible: AtomicBool,
    polls: AtomicU64,
}

/// In-memory gate driven through a [`GateController`].
#[derive(Debug, Clone)]
pub struct SimulatedGate {
    state: Arc<GateState>,
}

/// Test-side handle of a [`SimulatedGate`].
#[derive(Debug, Clone)]
pub struct GateController {
    state: Arc<GateState>,
}

impl SimulatedGate {
    /// A gate that starts in the given state.
    pub fn new(ready: bool) -> (Self, GateController) {
        let state = Arc::new(GateState {
            ready: AtomicBool::new(ready),
            inaccessible: AtomicBool::new(false),
            polls: AtomicU64::new(0),
        });
        (
            Self {
                state: state.clone(),
            },
            GateController { state },
        )
    }
}

impl ReadinessGate for SimulatedGate {
    fn poll(&mut self) -> Readiness {
        self.state.polls.fetch_add(1, Ordering::Relaxed);

        if self.state.inaccessible.load(Ordering::Acquire) {
            return Readiness::Inaccessible(GateError::Simulated);
        }
        if self.state.ready.load(Ordering::Acquire) {
            Readiness::Ready
        } else {
            Readiness::NotReady
        }
    }
}

impl GateController {
    pub fn set_ready(&self, ready: bool) {
        self.state.ready.store(ready, Ordering::Release);
    }

    pub fn set_inaccessible(&self, inaccessible: bool) {
        self.state.inaccessible.store(inaccessible, Ordering::Release);
    }

    pub fn polls(&self) -> u64 {
        self.state.polls.load(Ordering::Relaxed)
    }
}
