use crate::CompileError;
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Running,
    /// The first error has been captured; the pass is unwinding.
    Erroring,
    /// The compile entry point has given up on this run.
    Aborted,
}

/// First-error-wins bookkeeping for one compilation run.
#[derive(Debug, Default)]
pub struct AbortController {
    phase: Phase,
    first: Option<CompileError>,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err` if it is the first error of the run and return the
    /// error to propagate, which is always the first one.
    pub fn raise(&mut self, err: CompileError) -> CompileError {
        if let Some(first) = &self.first {
            debug!("suppressed later diagnostic: {err}");
            return first.clone();
        }
        debug!("captured diagnostic: {err}");
        self.phase = Phase::Erroring;
        self.first = Some(err.clone());
        err
    }

    pub fn abort(&mut self) {
        self.phase = Phase::Aborted;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_erroring(&self) -> bool {
        self.phase != Phase::Running
    }

    pub fn first_error(&self) -> Option<&CompileError> {
        self.first.as_ref()
    }
}
