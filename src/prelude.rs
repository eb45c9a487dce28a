//! Prelude module for convenient imports
//!
//! ```no_run
//! use pledge::prelude::*;
//! ```

// Deferred values
pub use crate::deferred::{handler, DeferredValue, Handler, Resolvers, Settle, Status};

// Composition
pub use crate::deferred::combinators::{all, all_settled, any, race, reject, resolve};

// Scheduling
pub use crate::config::EventLoopConfig;
pub use crate::scheduler::{EventLoop, Scheduler, SchedulerHandle};

// Values and errors
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::value::{Object, Value};
