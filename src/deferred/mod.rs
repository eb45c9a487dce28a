//! Deferred values
//!
//! A [`DeferredValue`] holds a result that becomes available later. It starts
//! pending and transitions at most once, to fulfilled or rejected. Continuations
//! registered with [`DeferredValue::then`] run in a later scheduling turn and
//! produce a new deferred value settled from the continuation's return value.
//!
//! Settlement goes through the [`resolver`], which unwraps nested deferred
//! values and foreign thenables before the state changes.
//!
//! ```no_run
//! use pledge::{handler, DeferredValue, EventLoop, EventLoopConfig, Value};
//!
//! let (event_loop, scheduler) = EventLoop::shared(EventLoopConfig::default());
//! let deferred = DeferredValue::new(&scheduler, |fulfill, _reject| {
//!     fulfill(Value::from(20));
//!     Ok(())
//! });
//! let doubled = deferred.then(handler(|v| Ok(Value::from(v.as_number().unwrap_or(0.0) * 2.0))), None);
//! event_loop.run_until_idle();
//! assert_eq!(doubled.value(), Some(Value::from(40)));
//! ```

pub mod combinators;
pub mod resolver;

use crate::error::{messages, Error, Result};
use crate::scheduler::SchedulerHandle;
use crate::value::Value;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// ID counter for deferred value tracking
static NEXT_DEFERRED_ID: AtomicU64 = AtomicU64::new(1);

/// A settlement capability: the `fulfill` or `reject` function handed to an initializer
pub type Settle = Rc<dyn Fn(Value)>;

/// A continuation. Its return value settles the derived deferred value;
/// an `Err` rejects it.
pub type Handler = Box<dyn FnOnce(Value) -> Result<Value>>;

/// Wrapper queued while pending; invoked once with the settled payload
type Reaction = Box<dyn FnOnce(Value)>;

/// Box a closure as a [`Handler`] argument for [`DeferredValue::then`]
pub fn handler<F>(f: F) -> Option<Handler>
where
    F: FnOnce(Value) -> Result<Value> + 'static,
{
    Some(Box::new(f))
}

/// Observable state of a deferred value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Fulfilled,
    Rejected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Fulfilled => "fulfilled",
            Status::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Fulfilled,
    Rejected,
}

enum State {
    Pending {
        on_fulfilled: Vec<Reaction>,
        on_rejected: Vec<Reaction>,
    },
    Fulfilled(Value),
    Rejected(Value),
}

struct Inner {
    id: u64,
    state: RefCell<State>,
    /// Set once `fulfill` or `reject` has been accepted; later calls are ignored
    /// even while a thenable is still being unwrapped.
    locked: Cell<bool>,
    scheduler: SchedulerHandle,
}

/// Shared handle to a single deferred value
#[derive(Clone)]
pub struct DeferredValue {
    inner: Rc<Inner>,
}

/// A deferred value together with its settlement capabilities
pub struct Resolvers {
    pub deferred: DeferredValue,
    pub fulfill: Settle,
    pub reject: Settle,
}

impl DeferredValue {
    /// Create a deferred value and run `initializer` synchronously with its
    /// `fulfill` and `reject` capabilities. An `Err` from the initializer
    /// rejects the new value, unless it already settled.
    pub fn new<F>(scheduler: &SchedulerHandle, initializer: F) -> Self
    where
        F: FnOnce(Settle, Settle) -> Result<()>,
    {
        let deferred = Self::pending(scheduler);
        if let Err(err) = initializer(deferred.fulfill_capability(), deferred.reject_capability()) {
            debug!(id = deferred.id(), error = %err, "initializer failed");
            deferred.reject(err.into_reason());
        }
        deferred
    }

    /// A deferred value with externally held capabilities
    pub fn with_resolvers(scheduler: &SchedulerHandle) -> Resolvers {
        let deferred = Self::pending(scheduler);
        Resolvers {
            fulfill: deferred.fulfill_capability(),
            reject: deferred.reject_capability(),
            deferred,
        }
    }

    /// A deferred value resolved with `value` (thenables are unwrapped)
    pub fn resolved(scheduler: &SchedulerHandle, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::new(scheduler, move |fulfill, _| {
            fulfill(value);
            Ok(())
        })
    }

    /// A deferred value rejected with `reason`
    pub fn rejected(scheduler: &SchedulerHandle, reason: impl Into<Value>) -> Self {
        let reason = reason.into();
        Self::new(scheduler, move |_, reject| {
            reject(reason);
            Ok(())
        })
    }

    fn pending(scheduler: &SchedulerHandle) -> Self {
        let id = NEXT_DEFERRED_ID.fetch_add(1, Ordering::Relaxed);
        trace!(id, "deferred value created");
        Self {
            inner: Rc::new(Inner {
                id,
                state: RefCell::new(State::Pending {
                    on_fulfilled: Vec::new(),
                    on_rejected: Vec::new(),
                }),
                locked: Cell::new(false),
                scheduler: scheduler.clone(),
            }),
        }
    }

    /// Unique id, for diagnostics
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.inner.scheduler
    }

    /// Whether both handles refer to the same deferred value
    pub fn ptr_eq(&self, other: &DeferredValue) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn status(&self) -> Status {
        match &*self.inner.state.borrow() {
            State::Pending { .. } => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status() == Status::Pending
    }

    /// The fulfillment value, once fulfilled
    pub fn value(&self) -> Option<Value> {
        match &*self.inner.state.borrow() {
            State::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// The rejection reason, once rejected
    pub fn reason(&self) -> Option<Value> {
        match &*self.inner.state.borrow() {
            State::Rejected(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// The `fulfill` capability bound to this value
    pub fn fulfill_capability(&self) -> Settle {
        let this = self.clone();
        Rc::new(move |value| this.fulfill(value))
    }

    /// The `reject` capability bound to this value
    pub fn reject_capability(&self) -> Settle {
        let this = self.clone();
        Rc::new(move |reason| this.reject(reason))
    }

    /// Request fulfillment with `value`. Thenables are unwrapped first; settling
    /// a value with itself rejects it with a chaining cycle TypeError. Ignored
    /// once `fulfill` or `reject` has been called.
    pub fn fulfill(&self, value: Value) {
        if self.inner.locked.replace(true) {
            return;
        }
        let on_plain: Settle = {
            let this = self.clone();
            Rc::new(move |value| this.transition(Outcome::Fulfilled, value))
        };
        let on_error: Settle = {
            let this = self.clone();
            Rc::new(move |reason| this.transition(Outcome::Rejected, reason))
        };
        resolver::resolve(Some(self), value, on_plain, on_error);
    }

    /// Reject with `reason`. Ignored once `fulfill` or `reject` has been called.
    pub fn reject(&self, reason: Value) {
        if self.inner.locked.replace(true) {
            return;
        }
        self.transition(Outcome::Rejected, reason);
    }

    /// Move out of pending and hand the payload to every queued reaction in
    /// registration order. No-op once settled.
    fn transition(&self, outcome: Outcome, payload: Value) {
        let reactions = {
            let mut state = self.inner.state.borrow_mut();
            let State::Pending {
                on_fulfilled,
                on_rejected,
            } = &mut *state
            else {
                return;
            };
            let reactions = match outcome {
                Outcome::Fulfilled => std::mem::take(on_fulfilled),
                Outcome::Rejected => std::mem::take(on_rejected),
            };
            *state = match outcome {
                Outcome::Fulfilled => State::Fulfilled(payload.clone()),
                Outcome::Rejected => State::Rejected(payload.clone()),
            };
            reactions
        };

        trace!(id = self.id(), ?outcome, reactions = reactions.len(), "deferred value settled");
        for reaction in reactions {
            reaction(payload.clone());
        }
    }

    /// Register continuations and return the deferred value they settle.
    ///
    /// A missing `on_fulfilled` passes the value through; a missing
    /// `on_rejected` passes the reason through. Handlers never run inside this
    /// call, even when this value is already settled.
    pub fn then(&self, on_fulfilled: Option<Handler>, on_rejected: Option<Handler>) -> DeferredValue {
        let on_fulfilled = on_fulfilled.unwrap_or_else(|| Box::new(pass_through));
        let on_rejected = on_rejected.unwrap_or_else(|| Box::new(rethrow));
        let derived = DeferredValue::pending(&self.inner.scheduler);

        let ready = {
            let mut state = self.inner.state.borrow_mut();
            match &mut *state {
                State::Pending {
                    on_fulfilled: fulfill_queue,
                    on_rejected: reject_queue,
                } => {
                    fulfill_queue.push(self.reaction(on_fulfilled, &derived));
                    reject_queue.push(self.reaction(on_rejected, &derived));
                    None
                }
                State::Fulfilled(value) => Some((on_fulfilled, value.clone())),
                State::Rejected(reason) => Some((on_rejected, reason.clone())),
            }
        };

        if let Some((handler, payload)) = ready {
            run_later(&self.inner.scheduler, handler, derived.clone(), payload);
        }
        derived
    }

    /// Shorthand for `then(None, on_rejected)`
    pub fn catch<F>(&self, on_rejected: F) -> DeferredValue
    where
        F: FnOnce(Value) -> Result<Value> + 'static,
    {
        self.then(None, handler(on_rejected))
    }

    /// Run `on_settled` whatever the outcome, then settle like this value did.
    ///
    /// If `on_settled` fails, or returns something that rejects, that rejection
    /// replaces the original outcome.
    pub fn finally<F>(&self, on_settled: F) -> DeferredValue
    where
        F: Fn() -> Result<Value> + 'static,
    {
        let on_settled = Rc::new(on_settled);
        let scheduler = self.inner.scheduler.clone();

        let on_fulfilled = {
            let (on_settled, scheduler) = (on_settled.clone(), scheduler.clone());
            handler(move |value| {
                let settled = on_settled()?;
                let restore = DeferredValue::resolved(&scheduler, settled).then(handler(move |_| Ok(value)), None);
                Ok(Value::Deferred(restore))
            })
        };
        let on_rejected = handler(move |reason| {
            let settled = on_settled()?;
            let restore = DeferredValue::resolved(&scheduler, settled)
                .then(handler(move |_| Err(Error::Thrown(reason))), None);
            Ok(Value::Deferred(restore))
        });

        self.then(on_fulfilled, on_rejected)
    }

    fn reaction(&self, handler: Handler, derived: &DeferredValue) -> Reaction {
        let scheduler = self.inner.scheduler.clone();
        let derived = derived.clone();
        Box::new(move |payload| run_later(&scheduler, handler, derived, payload))
    }
}

fn pass_through(value: Value) -> Result<Value> {
    Ok(value)
}

fn rethrow(reason: Value) -> Result<Value> {
    Err(Error::Thrown(reason))
}

/// Schedule `handler(payload)` and settle `derived` from its result
fn run_later(scheduler: &SchedulerHandle, handler: Handler, derived: DeferredValue, payload: Value) {
    scheduler.schedule(Box::new(move || match handler(payload) {
        Ok(result) => derived.fulfill(result),
        Err(err) => derived.reject(err.into_reason()),
    }));
}

/// Adapt a callable value into a handler; anything else counts as missing
fn handler_from_value(value: &Value) -> Option<Handler> {
    if !value.is_callable() {
        return None;
    }
    let callback = value.clone();
    handler(move |arg| callback.call(&Value::Undefined, &[arg]))
}

fn receiver(this: &Value, method: &str) -> Result<DeferredValue> {
    this.as_deferred()
        .cloned()
        .ok_or_else(|| Error::type_error(messages::receiver_not_deferred(method)))
}

/// Methods a deferred value exposes through [`Value::get_property`]
pub(crate) fn method(key: &str) -> Option<Value> {
    match key {
        "then" => Some(Value::function("then", |this, args| {
            let deferred = receiver(this, "then")?;
            let on_fulfilled = args.first().and_then(handler_from_value);
            let on_rejected = args.get(1).and_then(handler_from_value);
            Ok(Value::Deferred(deferred.then(on_fulfilled, on_rejected)))
        })),
        "catch" => Some(Value::function("catch", |this, args| {
            let deferred = receiver(this, "catch")?;
            let on_rejected = args.first().and_then(handler_from_value);
            Ok(Value::Deferred(deferred.then(None, on_rejected)))
        })),
        _ => None,
    }
}

impl fmt::Display for DeferredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner.state.borrow() {
            State::Pending { .. } => write!(f, "DeferredValue#{} <pending>", self.inner.id),
            State::Fulfilled(value) => write!(f, "DeferredValue#{} <fulfilled: {}>", self.inner.id, value),
            State::Rejected(reason) => write!(f, "DeferredValue#{} <rejected: {}>", self.inner.id, reason),
        }
    }
}

impl fmt::Debug for DeferredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
