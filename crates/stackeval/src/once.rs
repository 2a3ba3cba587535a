//! Memoized computations.
//!
//! A [`Once`] cell holds the outcome of one derived computation: a value
//! plus the diagnostics produced while computing it. The producer runs at
//! most once per cell; every caller, including the first, receives a clone
//! of the same stored outcome.
//!
//! Callers that arrive while the producer is running block until it
//! finishes. A caller that is itself part of the running producer's call
//! chain (see [`EvalContext`]) gets [`OnceError::SelfReference`] instead of
//! blocking forever.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};
use stackeval_foundation::Diagnostics;
use tracing::trace;

use crate::context::EvalContext;
use crate::error::OnceError;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Once`] cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OnceId(u64);

impl fmt::Display for OnceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

enum State<T> {
    Empty,
    Running,
    Done(T, Diagnostics),
    Poisoned,
}

/// A single-assignment cell for one memoized computation.
pub struct Once<T> {
    id: OnceId,
    name: String,
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> fmt::Debug for Once<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Once")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T: Clone> Once<T> {
    /// Creates an empty cell. `name` appears in logs and error messages.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: OnceId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            state: Mutex::new(State::Empty),
            ready: Condvar::new(),
        }
    }

    pub fn id(&self) -> OnceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cell's outcome, running `producer` if no caller has yet.
    ///
    /// The producer receives `ctx` extended with this cell, and must pass
    /// that context on to any memoized computation it depends on.
    pub fn run<F>(&self, ctx: &EvalContext, producer: F) -> Result<(T, Diagnostics), OnceError>
    where
        F: FnOnce(&EvalContext) -> (T, Diagnostics),
    {
        if ctx.is_running(self.id) {
            return Err(OnceError::SelfReference {
                id: self.id,
                name: self.name.clone(),
            });
        }

        {
            let mut state = self.state.lock();
            loop {
                match &*state {
                    State::Empty => break,
                    State::Done(value, diags) => {
                        trace!(cell = %self.id, name = %self.name, "replaying memoized result");
                        return Ok((value.clone(), diags.clone()));
                    }
                    State::Poisoned => {
                        return Err(OnceError::Poisoned {
                            id: self.id,
                            name: self.name.clone(),
                        })
                    }
                    State::Running => {
                        trace!(cell = %self.id, name = %self.name, "waiting for running producer");
                        self.ready.wait(&mut state);
                    }
                }
            }
            *state = State::Running;
        }

        trace!(cell = %self.id, name = %self.name, depth = ctx.depth(), "running producer");
        let guard = RunningGuard {
            cell: self,
            finished: false,
        };
        let (value, diags) = producer(&ctx.enter(self.id));
        guard.finish(value.clone(), diags.clone());
        Ok((value, diags))
    }
}

/// Poisons the cell if the producer unwinds before storing a result.
struct RunningGuard<'a, T> {
    cell: &'a Once<T>,
    finished: bool,
}

impl<T> RunningGuard<'_, T> {
    fn finish(mut self, value: T, diags: Diagnostics) {
        self.store(State::Done(value, diags));
        self.finished = true;
    }

    fn store(&self, state: State<T>) {
        *self.cell.state.lock() = state;
        self.cell.ready.notify_all();
    }
}

impl<T> Drop for RunningGuard<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            self.store(State::Poisoned);
        }
    }
}

/// Runs a memoized computation, reporting cell failures as diagnostics.
///
/// On [`OnceError`] the result is `T::default()` together with a single
/// internal-error diagnostic, so callers can treat the outcome like any
/// other failed derivation.
pub fn do_once_with_diags<T, F>(cell: &Once<T>, ctx: &EvalContext, producer: F) -> (T, Diagnostics)
where
    T: Clone + Default,
    F: FnOnce(&EvalContext) -> (T, Diagnostics),
{
    match cell.run(ctx, producer) {
        Ok(outcome) => outcome,
        Err(err) => (T::default(), err.to_diagnostic().into()),
    }
}
