//! Runtime core: polling loops and engine lifecycle.
//!
//! The only public API from this module is [`Poller`] (with its [`PollerBuilder`] and
//! [`Config`]), which starts one loop per task and coordinates termination.
//!
//! Internal modules:
//! - [`actor`]: runs the delay/round loop of a single task and owns its attempt number;
//! - [`round`]: limit computation and batch validation for one round;
//! - [`registry`]: validates the task list and keeps per-task runtime records;
//! - [`shutdown`]: cross-platform shutdown signal handling;
//! - [`poller`]: engine handle, subscriptions and termination.

mod actor;
mod builder;
mod config;
mod poller;
mod registry;
mod round;
mod shutdown;

pub use builder::PollerBuilder;
pub use config::Config;
pub use poller::Poller;
