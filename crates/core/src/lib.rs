//! Call-tree layout and the timeline scheduler behind stepreel's debugger
//! animations.
//!
//! A [`Scenario`](model::Scenario) describes tracks of nested call frames
//! whose self-execution spans may carry debugger events. The scheduler
//! scrolls every track under a fixed "now" cursor, stops at each event,
//! optionally splices an evaluated sub-call into the running frame and emits
//! the whole performance as a stream of render commands.

pub mod config;
pub mod events;
pub mod layout;
pub mod model;
pub mod playback;
pub mod scenarios;
pub mod scheduler;
pub mod svg;

pub use config::{Config, ConfigError};
pub use playback::{Placed, Snapshot, Stage};
pub use scheduler::{CommandSink, ResumeSignal, RunReport, SchedulerError, Timeline};
