//! Integration tests for deferred values: settlement, continuations, ordering

mod common;
use common::{delayed_reject, delayed_resolve, log, setup};
use pledge::prelude::*;
use pledge::messages;
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

mod settlement {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_value_fulfills() {
        let (el, scheduler) = setup();
        let deferred = DeferredValue::new(&scheduler, |fulfill, _| {
            fulfill(Value::from("plain"));
            Ok(())
        });
        el.run_until_idle();
        assert_eq!(deferred.status(), Status::Fulfilled);
        assert_eq!(deferred.value(), Some(Value::from("plain")));
    }

    #[test]
    fn test_object_without_then_is_a_plain_value() {
        let (el, scheduler) = setup();
        let obj = Object::new().with("answer", 42).into_value();
        let deferred = DeferredValue::resolved(&scheduler, obj.clone());
        el.run_until_idle();
        assert_eq!(deferred.value(), Some(obj));
    }

    #[test]
    fn test_first_settlement_wins() {
        let (el, scheduler) = setup();
        let Resolvers { deferred, fulfill, reject } = DeferredValue::with_resolvers(&scheduler);
        reject(Value::from("first"));
        fulfill(Value::from("second"));
        reject(Value::from("third"));
        el.run_until_idle();
        assert_eq!(deferred.reason(), Some(Value::from("first")));
        assert_eq!(deferred.value(), None);
    }

    #[test]
    fn test_fulfill_with_pending_value_locks_in() {
        let (el, scheduler) = setup();
        let Resolvers { deferred, fulfill, reject } = DeferredValue::with_resolvers(&scheduler);
        let source = delayed_resolve(&el, &scheduler, 10, "adopted");

        fulfill(Value::Deferred(source));
        reject(Value::from("too late"));
        fulfill(Value::from("also too late"));
        assert!(deferred.is_pending());

        el.run_until_idle();
        assert_eq!(deferred.value(), Some(Value::from("adopted")));
    }

    #[test]
    fn test_adopts_rejection() {
        let (el, scheduler) = setup();
        let source = delayed_reject(&el, &scheduler, 5, "nope");
        let deferred = DeferredValue::resolved(&scheduler, Value::Deferred(source));
        el.run_until_idle();
        assert_eq!(deferred.reason(), Some(Value::from("nope")));
    }

    #[test]
    fn test_self_settlement_rejects_with_type_error() {
        let (el, scheduler) = setup();
        let Resolvers { deferred, fulfill, .. } = DeferredValue::with_resolvers(&scheduler);
        fulfill(Value::Deferred(deferred.clone()));
        el.run_until_idle();

        let reason = deferred.reason().expect("cycle should reject");
        assert_eq!(reason.error_kind(), Some(ErrorKind::TypeError));
        assert_eq!(reason.get_property("message").unwrap(), Value::from(messages::CHAINING_CYCLE));
    }

    #[test]
    fn test_handler_returning_its_own_result_is_a_cycle() {
        let (el, scheduler) = setup();
        let slot: Rc<RefCell<Option<DeferredValue>>> = Rc::new(RefCell::new(None));
        let own = slot.clone();
        let derived = DeferredValue::resolved(&scheduler, 1).then(
            handler(move |_| {
                let derived = own.borrow().clone().expect("registered before the handler runs");
                Ok(Value::Deferred(derived))
            }),
            None,
        );
        *slot.borrow_mut() = Some(derived.clone());

        el.run_until_idle();
        let reason = derived.reason().expect("cycle should reject");
        assert_eq!(reason.error_kind(), Some(ErrorKind::TypeError));
        slot.borrow_mut().take();
    }

    #[test]
    fn test_initializer_error_rejects_with_its_reason() {
        let (el, scheduler) = setup();
        let deferred = DeferredValue::new(&scheduler, |_, _| Err(Error::type_error("bad input")));
        el.run_until_idle();
        let reason = deferred.reason().unwrap();
        assert_eq!(reason.error_kind(), Some(ErrorKind::TypeError));
        assert_eq!(reason.get_property("message").unwrap(), Value::from("bad input"));
    }
}

mod continuations {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_then_runs_in_a_later_turn() {
        let (el, scheduler) = setup();
        let calls = log();
        let sink = calls.clone();
        let derived = DeferredValue::resolved(&scheduler, 1).then(
            handler(move |v| {
                sink.borrow_mut().push(format!("handler {}", v));
                Ok(v)
            }),
            None,
        );
        calls.borrow_mut().push("after then".to_string());
        el.run_until_idle();

        assert_eq!(*calls.borrow(), vec!["after then", "handler 1"]);
        assert_eq!(derived.value(), Some(Value::from(1)));
    }

    #[test]
    fn test_chain_transforms_values() {
        let (el, scheduler) = setup();
        let result = DeferredValue::resolved(&scheduler, 2)
            .then(handler(|v| Ok(Value::from(v.as_number().unwrap_or(0.0) + 3.0))), None)
            .then(handler(|v| Ok(Value::from(v.as_number().unwrap_or(0.0) * 10.0))), None);
        el.run_until_idle();
        assert_eq!(result.value(), Some(Value::from(50)));
    }

    #[test]
    fn test_handler_returning_deferred_value_is_adopted() {
        let (el, scheduler) = setup();
        let inner_el = el.clone();
        let inner_scheduler = scheduler.clone();
        let result = DeferredValue::resolved(&scheduler, "outer").then(
            handler(move |_| Ok(Value::Deferred(delayed_resolve(&inner_el, &inner_scheduler, 20, "inner")))),
            None,
        );
        el.run_until_idle();
        assert_eq!(result.value(), Some(Value::from("inner")));
        assert_eq!(el.current_time(), 20);
    }

    #[test]
    fn test_rejection_skips_fulfillment_handlers() {
        let (el, scheduler) = setup();
        let calls = log();
        let sink = calls.clone();
        let result = DeferredValue::rejected(&scheduler, "boom")
            .then(
                handler(move |v| {
                    sink.borrow_mut().push("skipped".to_string());
                    Ok(v)
                }),
                None,
            )
            .catch(|reason| Ok(Value::from(format!("caught {}", reason))));
        el.run_until_idle();
        assert!(calls.borrow().is_empty());
        assert_eq!(result.value(), Some(Value::from("caught boom")));
    }

    #[test]
    fn test_error_in_handler_rejects_derived() {
        let (el, scheduler) = setup();
        let result = DeferredValue::resolved(&scheduler, 1)
            .then(handler(|_| Err(Error::thrown("handler failed"))), None);
        el.run_until_idle();
        assert_eq!(result.reason(), Some(Value::from("handler failed")));
    }

    #[test]
    fn test_handlers_registered_while_pending_run_in_order() {
        let (el, scheduler) = setup();
        let source = delayed_resolve(&el, &scheduler, 5, "v");
        let calls = log();
        for label in ["a", "b", "c"] {
            let sink = calls.clone();
            source.then(
                handler(move |v| {
                    sink.borrow_mut().push(label.to_string());
                    Ok(v)
                }),
                None,
            );
        }
        el.run_until_idle();
        assert_eq!(*calls.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_handlers_registered_after_settlement_run_in_order() {
        let (el, scheduler) = setup();
        let source = DeferredValue::rejected(&scheduler, "r");
        let calls = log();
        for label in ["a", "b", "c"] {
            let sink = calls.clone();
            source.catch(move |reason| {
                sink.borrow_mut().push(format!("{} {}", label, reason));
                Ok(Value::Undefined)
            });
        }
        el.run_until_idle();
        assert_eq!(*calls.borrow(), vec!["a r", "b r", "c r"]);
    }

    #[test]
    fn test_independent_chains_interleave_by_turn() {
        let (el, scheduler) = setup();
        let calls = log();
        let step = |label: &'static str| {
            let sink = calls.clone();
            handler(move |v| {
                sink.borrow_mut().push(label.to_string());
                Ok(v)
            })
        };
        DeferredValue::resolved(&scheduler, 1).then(step("a1"), None).then(step("a2"), None);
        DeferredValue::resolved(&scheduler, 2).then(step("b1"), None).then(step("b2"), None);
        el.run_until_idle();
        assert_eq!(*calls.borrow(), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn test_finally_runs_once_and_passes_outcome_through() {
        let (el, scheduler) = setup();
        let calls = log();
        let sink = calls.clone();
        let result = delayed_reject(&el, &scheduler, 3, "original").finally(move || {
            sink.borrow_mut().push("cleanup".to_string());
            Ok(Value::Undefined)
        });
        el.run_until_idle();
        assert_eq!(*calls.borrow(), vec!["cleanup"]);
        assert_eq!(result.reason(), Some(Value::from("original")));
    }
}

mod value_surface {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deferred_value_is_a_thenable() {
        let (el, scheduler) = setup();
        let deferred = Value::Deferred(DeferredValue::resolved(&scheduler, "x"));
        assert!(deferred.get_property("then").unwrap().is_callable());
        assert!(deferred.get_property("catch").unwrap().is_callable());
        el.run_until_idle();
    }

    #[test]
    fn test_value_level_catch() {
        let (el, scheduler) = setup();
        let deferred = Value::Deferred(DeferredValue::rejected(&scheduler, "oops"));
        let catch = deferred.get_property("catch").unwrap();
        let recover = Value::function("recover", |_, args| Ok(Value::from(format!("recovered {}", args[0]))));
        let derived = catch.call(&deferred, &[recover]).unwrap();
        el.run_until_idle();
        assert_eq!(
            derived.as_deferred().and_then(DeferredValue::value),
            Some(Value::from("recovered oops"))
        );
    }
}
