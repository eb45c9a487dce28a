//! Shared test helpers for integration tests

use pledge::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

/// A fresh event loop and its scheduler handle
pub fn setup() -> (Rc<EventLoop>, SchedulerHandle) {
    EventLoop::shared(EventLoopConfig::default())
}

/// A deferred value fulfilled with `value` after `delay` ms of virtual time
#[allow(dead_code)]
pub fn delayed_resolve(event_loop: &EventLoop, scheduler: &SchedulerHandle, delay: u64, value: impl Into<Value>) -> DeferredValue {
    let Resolvers { deferred, fulfill, .. } = DeferredValue::with_resolvers(scheduler);
    let value = value.into();
    event_loop.set_timeout(delay, Box::new(move || fulfill(value)));
    deferred
}

/// A deferred value rejected with `reason` after `delay` ms of virtual time
#[allow(dead_code)]
pub fn delayed_reject(event_loop: &EventLoop, scheduler: &SchedulerHandle, delay: u64, reason: impl Into<Value>) -> DeferredValue {
    let Resolvers { deferred, reject, .. } = DeferredValue::with_resolvers(scheduler);
    let reason = reason.into();
    event_loop.set_timeout(delay, Box::new(move || reject(reason)));
    deferred
}

/// A thenable whose `then` synchronously fulfills with `value`
#[allow(dead_code)]
pub fn sync_thenable(value: impl Into<Value>) -> Value {
    let value = value.into();
    Object::new()
        .with_method("then", move |_, args| {
            let on_fulfilled = args.first().cloned().unwrap_or(Value::Undefined);
            on_fulfilled.call(&Value::Undefined, &[value.clone()])
        })
        .into_value()
}

/// Shared log that handlers can append to
#[allow(dead_code)]
pub fn log() -> Rc<RefCell<Vec<String>>> {
    Rc::new(RefCell::new(Vec::new()))
}

/// Build an array value from anything convertible
#[allow(dead_code)]
pub fn array<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Value {
    Value::Array(items.into_iter().map(Into::into).collect())
}
