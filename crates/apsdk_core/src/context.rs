//! Context-preserving dispatch.
//!
//! An [`OperationContext`] carries ambient call data (a user token and extra
//! headers) that the platform merges into every outgoing request. A
//! [`ContextPreserver`] keeps one context attached to the current thread while
//! a callback runs, or while each poll of a wrapped future runs, so the
//! context follows an async call chain across executor threads.
//!
//! Entering a scope is guarded by a mutex. Entering while the same context is
//! already in effect is a no-op, and the previous context is restored when the
//! [`ScopeGuard`] drops, including on panic.

use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

thread_local! {
    static CURRENT: RefCell<Option<Arc<OperationContext>>> = const { RefCell::new(None) };
}

/// Returns the context in effect on this thread.
pub fn current() -> Option<Arc<OperationContext>> {
    CURRENT.with(|c| c.borrow().clone())
}

/// Ambient data attached to requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationContext {
    /// User session token.
    pub user_token: Option<String>,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
}

impl OperationContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user token.
    pub fn with_user_token(mut self, token: impl Into<String>) -> Self {
        self.user_token = Some(token.into());
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Keeps an [`OperationContext`] attached across callbacks and polls.
#[derive(Debug, Clone)]
pub struct ContextPreserver {
    context: Arc<OperationContext>,
    live_scopes: Arc<Mutex<usize>>,
}

impl ContextPreserver {
    /// Creates a preserver for `context`.
    pub fn new(context: OperationContext) -> Self {
        Self {
            context: Arc::new(context),
            live_scopes: Arc::new(Mutex::new(0)),
        }
    }

    /// Returns the preserved context.
    pub fn context(&self) -> &Arc<OperationContext> {
        &self.context
    }

    /// Creates an independent preserver for the same context.
    pub fn create_copy(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            live_scopes: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of scopes this preserver currently has installed.
    pub fn live_scopes(&self) -> usize {
        *self.live_scopes.lock()
    }

    /// Attaches the context to this thread until the guard drops.
    pub fn enter(&self) -> ScopeGuard {
        let in_effect = CURRENT.with(|c| {
            c.borrow()
                .as_ref()
                .is_some_and(|ctx| Arc::ptr_eq(ctx, &self.context))
        });
        if in_effect {
            return ScopeGuard {
                restore: None,
                live_scopes: None,
                _not_send: PhantomData,
            };
        }

        let mut live = self.live_scopes.lock();
        let previous = CURRENT.with(|c| c.borrow_mut().replace(Arc::clone(&self.context)));
        *live += 1;

        ScopeGuard {
            restore: Some(previous),
            live_scopes: Some(Arc::clone(&self.live_scopes)),
            _not_send: PhantomData,
        }
    }

    /// Runs a callback with the context attached.
    pub fn run<R>(&self, callback: impl FnOnce() -> R) -> R {
        let _scope = self.enter();
        callback()
    }

    /// Wraps a future so every poll runs with the context attached.
    pub fn preserve<F: Future>(&self, future: F) -> Preserved<F> {
        Preserved {
            preserver: self.clone(),
            inner: Box::pin(future),
        }
    }
}

/// Restores the previous context when dropped.
///
/// Not `Send`: it restores a thread-local on the thread that created it.
#[must_use = "the context is detached as soon as the guard drops"]
pub struct ScopeGuard {
    restore: Option<Option<Arc<OperationContext>>>,
    live_scopes: Option<Arc<Mutex<usize>>>,
    _not_send: PhantomData<*const ()>,
}

impl ScopeGuard {
    /// Returns true if this guard installed the context.
    pub fn is_installed(&self) -> bool {
        self.restore.is_some()
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.restore.take() {
            match self.live_scopes.take() {
                Some(live) => {
                    let mut count = live.lock();
                    CURRENT.with(|c| *c.borrow_mut() = previous);
                    *count = count.saturating_sub(1);
                }
                None => CURRENT.with(|c| *c.borrow_mut() = previous),
            }
        }
    }
}

/// Future returned by [`ContextPreserver::preserve`].
pub struct Preserved<F: Future> {
    preserver: ContextPreserver,
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for Preserved<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _scope = this.preserver.enter();
        this.inner.as_mut().poll(cx)
    }
}
