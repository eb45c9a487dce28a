//! Settlement resolution
//!
//! Decides what settling a deferred value with `x` means. Primitives and
//! objects without a callable `then` are plain values. Anything exposing a
//! callable `then` (a deferred value or a foreign thenable) is followed: its
//! `then` is invoked with a fresh pair of one-shot capabilities, and whatever
//! it eventually delivers goes through this same algorithm again, so chains of
//! any depth unwrap to a plain value or an error.

use super::{DeferredValue, Settle};
use crate::error::Error;
use crate::value::Value;
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

/// Single-use guard shared by the two capabilities handed to a thenable.
///
/// The first [`consume`](OnceToken::consume) returns true; every later call,
/// through any clone, returns false.
#[derive(Clone, Debug, Default)]
pub struct OnceToken {
    spent: Rc<Cell<bool>>,
}

impl OnceToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the token. Returns false if it was already taken.
    pub fn consume(&self) -> bool {
        !self.spent.replace(true)
    }

    pub fn is_spent(&self) -> bool {
        self.spent.get()
    }
}

/// Resolve `x` on behalf of `target`.
///
/// Exactly one of `on_plain` (with the unwrapped plain value) or `on_error`
/// (with a rejection reason) is eventually called at most once per call
/// chain, however the thenables involved misbehave. `target` is the deferred
/// value being settled; settling it with itself is reported through
/// `on_error` as a chaining cycle TypeError.
pub fn resolve(target: Option<&DeferredValue>, x: Value, on_plain: Settle, on_error: Settle) {
    if let Some(target) = target {
        if x.as_deferred().is_some_and(|candidate| candidate.ptr_eq(target)) {
            debug!(id = target.id(), "chaining cycle detected");
            on_error(Error::chaining_cycle().into_reason());
            return;
        }
    }

    if !x.is_object_like() {
        on_plain(x);
        return;
    }

    let then = match x.get_property("then") {
        Ok(then) => then,
        Err(err) => {
            debug!(error = %err, "reading then failed");
            on_error(err.into_reason());
            return;
        }
    };
    if !then.is_callable() {
        on_plain(x);
        return;
    }

    let token = OnceToken::new();
    let resolve_fn = {
        let token = token.clone();
        let target = target.cloned();
        let (on_plain, on_error) = (on_plain.clone(), on_error.clone());
        Value::function("resolve", move |_, args| {
            if token.consume() {
                let value = args.first().cloned().unwrap_or(Value::Undefined);
                resolve(target.as_ref(), value, on_plain.clone(), on_error.clone());
            }
            Ok(Value::Undefined)
        })
    };
    let reject_fn = {
        let token = token.clone();
        let on_error = on_error.clone();
        Value::function("reject", move |_, args| {
            if token.consume() {
                on_error(args.first().cloned().unwrap_or(Value::Undefined));
            }
            Ok(Value::Undefined)
        })
    };

    if let Err(err) = then.call(&x, &[resolve_fn, reject_fn]) {
        // An error after the thenable already answered is ignored.
        if token.consume() {
            debug!(error = %err, "thenable raised from then");
            on_error(err.into_reason());
        }
    }
}
