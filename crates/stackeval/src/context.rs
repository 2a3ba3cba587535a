//! Evaluation call chains.

use std::sync::Arc;

use crate::once::OnceId;

/// The chain of memoized computations the current call is running inside.
///
/// Every producer receives a context extended with its own cell, and
/// passes it on to whatever it calls. A request for a cell that is
/// already on the chain can never complete, so it is reported instead of
/// waited on. Contexts are cheap to clone and independent per thread of
/// evaluation: two callers racing for the same cell are not a cycle.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    chain: Option<Arc<Link>>,
}

#[derive(Debug)]
struct Link {
    id: OnceId,
    parent: Option<Arc<Link>>,
}

impl EvalContext {
    /// A context for a new top-level evaluation request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the cell `id` is being computed on this chain.
    pub fn is_running(&self, id: OnceId) -> bool {
        self.links().any(|link| link.id == id)
    }

    /// Number of computations in progress on this chain.
    pub fn depth(&self) -> usize {
        self.links().count()
    }

    pub(crate) fn enter(&self, id: OnceId) -> EvalContext {
        EvalContext {
            chain: Some(Arc::new(Link {
                id,
                parent: self.chain.clone(),
            })),
        }
    }

    fn links(&self) -> impl Iterator<Item = &Link> {
        std::iter::successors(self.chain.as_deref(), |link| link.parent.as_deref())
    }
}
