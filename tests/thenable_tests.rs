//! Integration tests for thenable adoption: foreign objects with a callable `then`

mod common;
use common::{delayed_resolve, setup, sync_thenable};
use pledge::prelude::*;
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::rc::Rc;

/// A thenable nesting `depth` further thenables before yielding `"bottom"`
fn nested_thenable(depth: usize) -> Value {
    if depth == 0 {
        return Value::from("bottom");
    }
    Object::new()
        .with_method("then", move |_, args| {
            args[0].call(&Value::Undefined, &[nested_thenable(depth - 1)])
        })
        .into_value()
}

#[test]
fn test_deferred_wrapping_deferred_wrapping_thenable() {
    let (el, scheduler) = setup();
    let inner_scheduler = scheduler.clone();
    let outer = DeferredValue::new(&scheduler, move |fulfill, _| {
        let inner = DeferredValue::new(&inner_scheduler, |fulfill, _| {
            fulfill(sync_thenable("data"));
            Ok(())
        });
        fulfill(Value::Deferred(inner));
        Ok(())
    });
    let seen = outer.then(handler(|v| Ok(v)), None);
    el.run_until_idle();
    assert_eq!(outer.value(), Some(Value::from("data")));
    assert_eq!(seen.value(), Some(Value::from("data")));
}

#[test]
fn test_deep_thenable_chain_unwraps() {
    let (el, scheduler) = setup();
    for depth in [1, 2, 5, 50] {
        let deferred = DeferredValue::resolved(&scheduler, nested_thenable(depth));
        el.run_until_idle();
        assert_eq!(deferred.value(), Some(Value::from("bottom")), "depth {}", depth);
    }
}

#[test]
fn test_asynchronous_thenable() {
    let (el, scheduler) = setup();
    let timer_el = el.clone();
    let thenable = Object::new()
        .with_method("then", move |_, args| {
            let on_fulfilled = args[0].clone();
            timer_el.set_timeout(
                15,
                Box::new(move || {
                    let _ = on_fulfilled.call(&Value::Undefined, &[Value::from("later")]);
                }),
            );
            Ok(Value::Undefined)
        })
        .into_value();

    let deferred = DeferredValue::resolved(&scheduler, thenable);
    el.run_pending();
    assert!(deferred.is_pending());

    el.run_until_idle();
    assert_eq!(deferred.value(), Some(Value::from("later")));
    assert_eq!(el.current_time(), 15);
}

#[test]
fn test_thenable_yielding_deferred_value() {
    let (el, scheduler) = setup();
    let source = Value::Deferred(delayed_resolve(&el, &scheduler, 4, "through"));
    let thenable = Object::new()
        .with_method("then", move |_, args| args[0].call(&Value::Undefined, &[source.clone()]))
        .into_value();
    let deferred = DeferredValue::resolved(&scheduler, thenable);
    el.run_until_idle();
    assert_eq!(deferred.value(), Some(Value::from("through")));
}

#[test]
fn test_thenable_rejection() {
    let (el, scheduler) = setup();
    let thenable = Object::new()
        .with_method("then", |_, args| args[1].call(&Value::Undefined, &[Value::from("declined")]))
        .into_value();
    let deferred = DeferredValue::resolved(&scheduler, thenable);
    el.run_until_idle();
    assert_eq!(deferred.reason(), Some(Value::from("declined")));
}

#[test]
fn test_misbehaving_thenable_only_first_answer_counts() {
    let (el, scheduler) = setup();
    let thenable = Object::new()
        .with_method("then", |_, args| {
            args[0].call(&Value::Undefined, &[Value::from("first")])?;
            args[0].call(&Value::Undefined, &[Value::from("second")])?;
            args[1].call(&Value::Undefined, &[Value::from("rejected")])?;
            Err(Error::thrown("raised afterwards"))
        })
        .into_value();
    let deferred = DeferredValue::resolved(&scheduler, thenable);
    el.run_until_idle();
    assert_eq!(deferred.value(), Some(Value::from("first")));
}

#[test]
fn test_then_raising_before_answering_rejects() {
    let (el, scheduler) = setup();
    let thenable = Object::new()
        .with_method("then", |_, _| Err(Error::range_error("out of range")))
        .into_value();
    let deferred = DeferredValue::resolved(&scheduler, thenable);
    el.run_until_idle();
    let reason = deferred.reason().unwrap();
    assert_eq!(reason.error_kind(), Some(ErrorKind::RangeError));
}

#[test]
fn test_throwing_then_accessor_rejects() {
    let (el, scheduler) = setup();
    let reads = Rc::new(Cell::new(0));
    let counter = reads.clone();
    let thenable = Object::new()
        .with_accessor("then", move |_, _| {
            counter.set(counter.get() + 1);
            Err(Error::thrown("no then for you"))
        })
        .into_value();
    let deferred = DeferredValue::resolved(&scheduler, thenable);
    el.run_until_idle();
    assert_eq!(reads.get(), 1);
    assert_eq!(deferred.reason(), Some(Value::from("no then for you")));
}

#[test]
fn test_non_callable_then_is_plain() {
    let (el, scheduler) = setup();
    let obj = Object::new().with("then", "not a function").into_value();
    let deferred = DeferredValue::resolved(&scheduler, obj.clone());
    el.run_until_idle();
    assert_eq!(deferred.value(), Some(obj));
}

#[test]
fn test_handler_returning_thenable_is_adopted() {
    let (el, scheduler) = setup();
    let result = DeferredValue::resolved(&scheduler, 1).then(handler(|_| Ok(nested_thenable(3))), None);
    el.run_until_idle();
    assert_eq!(result.value(), Some(Value::from("bottom")));
}
