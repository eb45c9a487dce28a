//! Pledge: deferred values with chained continuations
//!
//! A [`DeferredValue`] is a container for a result that becomes available
//! later. It moves at most once from pending to fulfilled or rejected, and
//! continuations registered with [`DeferredValue::then`] always run in a later
//! scheduling turn, producing new deferred values of their own.
//!
//! Settling a deferred value with another one, or with any object exposing a
//! callable `then` (a "thenable"), follows that value until it yields a plain
//! result. Misbehaving thenables that call back twice are tolerated: only the
//! first answer counts.
//!
//! # Quick Start
//!
//! ```no_run
//! use pledge::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let (event_loop, scheduler) = EventLoop::shared(EventLoopConfig::default());
//!     let items = vec![
//!         resolve(&scheduler, 1),
//!         resolve(&scheduler, 2),
//!         resolve(&scheduler, 3),
//!     ];
//!     let combined = all(&scheduler, items)?;
//!     event_loop.run_until_idle();
//!     println!("{}", combined);
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`deferred`] | The state machine, `then`/`catch`/`finally` |
//! | [`deferred::resolver`] | Thenable unwrapping and one-shot guards |
//! | [`deferred::combinators`] | `resolve`, `reject`, `all`, `race`, `any`, `all_settled` |
//! | [`scheduler`] | The `Scheduler` capability and the bundled [`EventLoop`] |
//! | [`value`] | Dynamic values and duck-typed property access |
//! | [`config`] | [`EventLoopConfig`] |

pub mod config;
pub mod deferred;
pub mod prelude;
pub mod scheduler;
pub mod value;

mod error;

pub use config::EventLoopConfig;
pub use deferred::combinators::{all, all_settled, any, race, reject, resolve, IntoItems};
pub use deferred::{handler, DeferredValue, Handler, Resolvers, Settle, Status};
pub use error::{messages, Error, ErrorKind, Result};
pub use scheduler::{EventLoop, RunResult, Scheduler, SchedulerHandle, Task};
pub use value::{Object, Value};

/// Pledge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
