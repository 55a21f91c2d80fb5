//! Retrying fallible async operations
//!
//! Authentication and the control channel's reconnects share this engine.
//! A `RetryPolicy` with `max_attempts == 0` is unbounded and always backs
//! off exponentially up to `max_delay_ms`, starting no lower than
//! `UNBOUNDED_MIN_INTERVAL_MS`; bounded policies use their own
//! strategy. Every step goes to a `RetryObserver` as a `RetryEvent`, and a
//! `ShutdownToken` passed to the builder stops the loop, even mid-attempt.
//!
//! ```rust,no_run
//! use gantry_core::retry::{RetryExecutorBuilder, RetryPolicy, TracingObserver};
//! use gantry_core::ShutdownToken;
//! use std::time::Duration;
//!
//! async fn connect() -> Result<(), std::io::Error> {
//!     Ok(())
//! }
//!
//! async fn example(shutdown: ShutdownToken) {
//!     let outcome = RetryExecutorBuilder::new()
//!         .with_policy(RetryPolicy::fixed(3, Duration::from_millis(100)))
//!         .with_observer(TracingObserver::new("connect"))
//!         .with_shutdown(shutdown)
//!         .build()
//!         .execute(connect)
//!         .await;
//!     if let Err(e) = outcome {
//!         eprintln!("{e}");
//!     }
//! }
//! ```

mod error;
mod executor;
mod observer;
mod policy;
mod strategies;

pub use error::RetryError;
pub use executor::{RetryExecutor, RetryExecutorBuilder};
pub use observer::{NoOpObserver, RetryEvent, RetryObserver, TracingObserver};
pub use policy::{RetryPolicy, RetryStrategy};
pub use strategies::{calculate_delay, UNBOUNDED_MIN_INTERVAL_MS};
