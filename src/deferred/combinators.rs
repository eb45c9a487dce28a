//! Composition helpers
//!
//! Every item is first normalized with [`resolve`], so plain values, deferred
//! values and foreign thenables can be mixed freely. Results are index-aligned
//! with the input, never in arrival order.
//!
//! With an empty input, [`all`] and [`all_settled`] fulfill with an empty
//! array while [`race`] and [`any`] stay pending forever: nothing can ever
//! settle them.

use super::{handler, DeferredValue, Handler, Settle};
use crate::error::{Error, Result};
use crate::scheduler::SchedulerHandle;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Conversion of a combinator argument into its items.
///
/// Typed collections always succeed; a dynamic [`Value`] must be an array,
/// otherwise the combinator fails synchronously with a TypeError.
pub trait IntoItems {
    fn into_items(self, operation: &'static str) -> Result<Vec<Value>>;
}

impl IntoItems for Vec<Value> {
    fn into_items(self, _operation: &'static str) -> Result<Vec<Value>> {
        Ok(self)
    }
}

impl IntoItems for Vec<DeferredValue> {
    fn into_items(self, _operation: &'static str) -> Result<Vec<Value>> {
        Ok(self.into_iter().map(Value::Deferred).collect())
    }
}

impl<const N: usize> IntoItems for [Value; N] {
    fn into_items(self, _operation: &'static str) -> Result<Vec<Value>> {
        Ok(self.into())
    }
}

impl IntoItems for Value {
    fn into_items(self, operation: &'static str) -> Result<Vec<Value>> {
        match self {
            Value::Array(items) => Ok(items),
            other => Err(Error::not_iterable(operation, &other)),
        }
    }
}

impl IntoItems for &Value {
    fn into_items(self, operation: &'static str) -> Result<Vec<Value>> {
        self.clone().into_items(operation)
    }
}

/// A deferred value resolved with `value`
pub fn resolve(scheduler: &SchedulerHandle, value: impl Into<Value>) -> DeferredValue {
    DeferredValue::resolved(scheduler, value)
}

/// A deferred value rejected with `reason`
pub fn reject(scheduler: &SchedulerHandle, reason: impl Into<Value>) -> DeferredValue {
    DeferredValue::rejected(scheduler, reason)
}

/// Fulfill with every item's value once all fulfill; reject with the first
/// reason to arrive.
pub fn all(scheduler: &SchedulerHandle, items: impl IntoItems) -> Result<DeferredValue> {
    let items = items.into_items("all")?;
    Ok(DeferredValue::new(scheduler, |fulfill, reject| {
        let total = items.len();
        if total == 0 {
            fulfill(Value::Array(Vec::new()));
            return Ok(());
        }

        let results = Rc::new(RefCell::new(vec![Value::Undefined; total]));
        let remaining = Rc::new(Cell::new(total));
        for (index, item) in items.into_iter().enumerate() {
            let (results, remaining, fulfill) = (results.clone(), remaining.clone(), fulfill.clone());
            resolve(scheduler, item).then(
                handler(move |value| {
                    results.borrow_mut()[index] = value;
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        fulfill(Value::Array(results.take()));
                    }
                    Ok(Value::Undefined)
                }),
                settle_with(&reject),
            );
        }
        Ok(())
    }))
}

/// Settle like whichever item settles first
pub fn race(scheduler: &SchedulerHandle, items: impl IntoItems) -> Result<DeferredValue> {
    let items = items.into_items("race")?;
    Ok(DeferredValue::new(scheduler, |fulfill, reject| {
        for item in items {
            resolve(scheduler, item).then(settle_with(&fulfill), settle_with(&reject));
        }
        Ok(())
    }))
}

/// Fulfill with the first item to fulfill; reject with every reason,
/// index-aligned, once all items reject.
pub fn any(scheduler: &SchedulerHandle, items: impl IntoItems) -> Result<DeferredValue> {
    let items = items.into_items("any")?;
    Ok(DeferredValue::new(scheduler, |fulfill, reject| {
        let total = items.len();
        let reasons = Rc::new(RefCell::new(vec![Value::Undefined; total]));
        let remaining = Rc::new(Cell::new(total));
        for (index, item) in items.into_iter().enumerate() {
            let (reasons, remaining, reject) = (reasons.clone(), remaining.clone(), reject.clone());
            resolve(scheduler, item).then(
                settle_with(&fulfill),
                handler(move |reason| {
                    reasons.borrow_mut()[index] = reason;
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        reject(Value::Array(reasons.take()));
                    }
                    Ok(Value::Undefined)
                }),
            );
        }
        Ok(())
    }))
}

/// Always fulfill, once every item settled, with one status record per item:
/// `{ status: "fulfilled", value }` or `{ status: "rejected", reason }`.
pub fn all_settled(scheduler: &SchedulerHandle, items: impl IntoItems) -> Result<DeferredValue> {
    let items = items.into_items("allSettled")?;
    Ok(DeferredValue::new(scheduler, |fulfill, _| {
        let total = items.len();
        if total == 0 {
            fulfill(Value::Array(Vec::new()));
            return Ok(());
        }

        let records = Rc::new(RefCell::new(vec![Value::Undefined; total]));
        let remaining = Rc::new(Cell::new(total));
        let record = move |index: usize, outcome: Value| -> Result<Value> {
            records.borrow_mut()[index] = outcome;
            remaining.set(remaining.get() - 1);
            if remaining.get() == 0 {
                fulfill(Value::Array(records.take()));
            }
            Ok(Value::Undefined)
        };
        let record = Rc::new(record);

        for (index, item) in items.into_iter().enumerate() {
            let (on_value, on_reason) = (record.clone(), record.clone());
            resolve(scheduler, item).then(
                handler(move |value| on_value(index, settled_record("fulfilled", "value", value))),
                handler(move |reason| on_reason(index, settled_record("rejected", "reason", reason))),
            );
        }
        Ok(())
    }))
}

/// A status record as produced by [`all_settled`]
pub fn settled_record(status: &str, key: &str, payload: Value) -> Value {
    Value::object_from([("status", Value::from(status)), (key, payload)])
}

/// Forward a payload to a settlement capability
fn settle_with(settle: &Settle) -> Option<Handler> {
    let settle = settle.clone();
    handler(move |payload| {
        settle(payload);
        Ok(Value::Undefined)
    })
}
