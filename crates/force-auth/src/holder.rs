//! Request-scoped access to the active security context.
//!
//! The holder is a tokio task-local: a context placed in a scope is visible
//! only to the task running that scope, so contexts never leak between
//! concurrent requests. Outside any scope every accessor is a no-op.

use std::cell::RefCell;
use std::future::Future;

use crate::context::SecurityContext;

tokio::task_local! {
    static CURRENT: RefCell<Option<SecurityContext>>;
}

/// Accessor for the security context of the request being handled.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityContextHolder;

impl SecurityContextHolder {
    /// Run `f` with `context` as the active security context.
    pub async fn scope<F>(context: Option<SecurityContext>, f: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(RefCell::new(context), f).await
    }

    /// The active context, if any.
    pub fn get() -> Option<SecurityContext> {
        CURRENT
            .try_with(|current| current.borrow().clone())
            .ok()
            .flatten()
    }

    /// Replace the active context. Returns false outside a scope.
    pub fn set(context: SecurityContext) -> bool {
        CURRENT
            .try_with(|current| *current.borrow_mut() = Some(context))
            .is_ok()
    }

    /// Release and return the active context.
    pub fn release() -> Option<SecurityContext> {
        CURRENT
            .try_with(|current| current.borrow_mut().take())
            .ok()
            .flatten()
    }

    /// Returns true if called inside a scope.
    pub fn in_scope() -> bool {
        CURRENT.try_with(|_| ()).is_ok()
    }
}
