//! Request-scoped correlation context.
//!
//! # Responsibilities
//! - Make the current request's correlation ID visible to any code running
//!   on its behalf, including the log layer
//! - Keep concurrently handled requests isolated from one another
//!
//! # Design Decisions
//! - Async handling uses a tokio task-local scope: the ID follows the request
//!   future across worker threads and is restored when the scope ends, even
//!   while unwinding
//! - Work handed to the blocking pool re-enters the ID in a thread-local slot
//!   through an RAII [`ContextToken`]
//! - Task scope wins over thread scope when both are present

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;

use crate::http::request::CorrelationId;
use crate::observability::fault::{self, FaultReport};

tokio::task_local! {
    static TASK_CORRELATION_ID: CorrelationId;
}

thread_local! {
    static THREAD_CORRELATION_ID: RefCell<Option<CorrelationId>> = const { RefCell::new(None) };
}

/// Entry points for establishing and reading the request context.
pub struct RequestContext;

impl RequestContext {
    /// Run `fut` with `id` as the current correlation ID.
    ///
    /// The previous state is restored when `fut` completes, is dropped, or
    /// panics.
    pub async fn scope<F: Future>(id: CorrelationId, fut: F) -> F::Output {
        TASK_CORRELATION_ID.scope(id, fut).await
    }

    /// Associate `id` with the current thread until the token is released.
    ///
    /// Tokens must be released in reverse order of entry; dropping the token
    /// is equivalent to calling [`RequestContext::exit`].
    pub fn enter(id: CorrelationId) -> ContextToken {
        let previous = THREAD_CORRELATION_ID.with(|slot| slot.replace(Some(id)));
        ContextToken {
            previous,
            _not_send: PhantomData,
        }
    }

    /// Restore the state captured by `token`.
    pub fn exit(token: ContextToken) {
        drop(token);
    }

    /// The correlation ID visible to the caller, if it runs inside a request.
    pub fn current() -> Option<CorrelationId> {
        TASK_CORRELATION_ID
            .try_with(CorrelationId::clone)
            .ok()
            .or_else(|| {
                THREAD_CORRELATION_ID
                    .try_with(|slot| slot.borrow().clone())
                    .ok()
                    .flatten()
            })
    }

    /// Run `f` on the blocking pool with the caller's correlation ID entered.
    ///
    /// A panic inside `f` is caught on the worker thread and returned as a
    /// [`FaultReport`] instead of tearing down the caller.
    pub async fn spawn_blocking<F, R>(f: F) -> Result<R, FaultReport>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let id = Self::current();
        let joined = tokio::task::spawn_blocking(move || {
            let _token = id.clone().map(Self::enter);
            std::panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
                id.as_ref()
                    .and_then(fault::take_last_panic)
                    .unwrap_or_else(|| FaultReport::from_panic_payload(payload.as_ref()))
            })
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(err) => Err(FaultReport::from_error(&err)),
        }
    }
}

/// Proof of a thread-local [`RequestContext::enter`]; restores the prior
/// state on drop.
///
/// Not `Send`: a token cannot follow a future onto another thread.
#[derive(Debug)]
pub struct ContextToken {
    previous: Option<CorrelationId>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextToken {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = THREAD_CORRELATION_ID.try_with(|slot| *slot.borrow_mut() = previous);
    }
}
