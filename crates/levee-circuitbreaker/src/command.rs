//! The command contract.
//!
//! A [`Command`] is the operation a breaker protects. It receives a request and
//! a [`Completion`], and reports its outcome by completing it exactly once, either
//! before `execute` returns or at any later point from any thread.
//!
//! Futures and [`tower::Service`]s are bridged into this contract by
//! [`ServiceCommand`], so the breaker itself only ever deals with completions.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use tower::{Service, ServiceExt};

/// An operation guarded by a circuit breaker.
pub trait Command: Send + Sync + 'static {
    /// Input passed to each call.
    type Request: Send + 'static;
    /// Value reported on success.
    type Response: Send + 'static;
    /// Error reported on failure.
    type Error: Send + 'static;

    /// Starts the operation. `done` must be completed exactly once.
    fn execute(&self, request: Self::Request, done: Completion<Self::Response, Self::Error>);
}

/// One-shot completion handle passed to a [`Command`].
pub struct Completion<T, E> {
    deliver: Box<dyn FnOnce(Result<T, E>) + Send>,
    contained: bool,
}

impl<T, E> Completion<T, E> {
    /// Creates a completion that hands the result to `f`.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Result<T, E>) + Send + 'static,
    {
        Self {
            deliver: Box::new(f),
            contained: false,
        }
    }

    /// A completion minted by the callback guard.
    pub(crate) fn contained<F>(f: F) -> Self
    where
        F: FnOnce(Result<T, E>) + Send + 'static,
    {
        Self {
            deliver: Box::new(f),
            contained: true,
        }
    }

    /// Returns true if this completion already enforces deferred delivery.
    pub fn is_contained(&self) -> bool {
        self.contained
    }

    /// Reports the outcome.
    pub fn complete(self, result: Result<T, E>) {
        (self.deliver)(result)
    }

    /// Reports success.
    pub fn succeed(self, value: T) {
        self.complete(Ok(value))
    }

    /// Reports failure.
    pub fn fail(self, error: E) {
        self.complete(Err(error))
    }
}

impl<T, E> fmt::Debug for Completion<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("contained", &self.contained)
            .finish()
    }
}

/// A command backed by a callback-style closure.
///
/// Created with [`command_fn`].
pub struct FnCommand<F, Req, Res, Err> {
    f: F,
    _types: PhantomData<fn(Req) -> (Res, Err)>,
}

/// Turns a closure taking a request and a [`Completion`] into a [`Command`].
///
/// ```rust
/// use levee_circuitbreaker::{command_fn, Completion};
///
/// let echo = command_fn(|req: String, done: Completion<String, std::io::Error>| {
///     done.succeed(req)
/// });
/// # let _ = echo;
/// ```
pub fn command_fn<Req, Res, Err, F>(f: F) -> FnCommand<F, Req, Res, Err>
where
    F: Fn(Req, Completion<Res, Err>) + Send + Sync + 'static,
{
    FnCommand {
        f,
        _types: PhantomData,
    }
}

impl<F, Req, Res, Err> Command for FnCommand<F, Req, Res, Err>
where
    F: Fn(Req, Completion<Res, Err>) + Send + Sync + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
    Err: Send + 'static,
{
    type Request = Req;
    type Response = Res;
    type Error = Err;

    fn execute(&self, request: Req, done: Completion<Res, Err>) {
        (self.f)(request, done)
    }
}

impl<F: Clone, Req, Res, Err> Clone for FnCommand<F, Req, Res, Err> {
    fn clone(&self) -> Self {
        Self {
            f: self.f.clone(),
            _types: PhantomData,
        }
    }
}

impl<F, Req, Res, Err> fmt::Debug for FnCommand<F, Req, Res, Err> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommand").finish_non_exhaustive()
    }
}

/// Bridges a [`tower::Service`] (or any future-returning function) into the
/// completion contract.
///
/// Each call clones the service, drives readiness and the response future on
/// a spawned Tokio task, and completes with the outcome. Must be used inside
/// a Tokio runtime.
pub struct ServiceCommand<S, Req> {
    service: S,
    _req: PhantomData<fn(Req)>,
}

/// Wraps a [`tower::Service`] as a [`Command`].
///
/// ```rust
/// use levee_circuitbreaker::from_service;
/// use tower::service_fn;
///
/// let command = from_service(service_fn(|req: u32| async move {
///     Ok::<_, std::io::Error>(req * 2)
/// }));
/// # let _ = command;
/// ```
pub fn from_service<S, Req>(service: S) -> ServiceCommand<S, Req>
where
    S: Service<Req>,
{
    ServiceCommand {
        service,
        _req: PhantomData,
    }
}

/// Wraps an async function as a [`Command`].
pub fn from_async_fn<F, Fut, Req, Res, Err>(
    f: F,
) -> ServiceCommand<tower::util::ServiceFn<F>, Req>
where
    F: FnMut(Req) -> Fut,
    Fut: Future<Output = Result<Res, Err>>,
{
    from_service(tower::service_fn(f))
}

impl<S, Req> ServiceCommand<S, Req> {
    /// Returns a reference to the wrapped service.
    pub fn get_ref(&self) -> &S {
        &self.service
    }
}

impl<S, Req> Command for ServiceCommand<S, Req>
where
    S: Service<Req> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Request = Req;
    type Response = S::Response;
    type Error = S::Error;

    fn execute(&self, request: Req, done: Completion<S::Response, S::Error>) {
        let service = self.service.clone();
        tokio::spawn(async move {
            let result = service.oneshot(request).await;
            done.complete(result);
        });
    }
}

impl<S, Req> Clone for ServiceCommand<S, Req>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            _req: PhantomData,
        }
    }
}

impl<S: fmt::Debug, Req> fmt::Debug for ServiceCommand<S, Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCommand")
            .field("service", &self.service)
            .finish()
    }
}
