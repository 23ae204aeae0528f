//! Periodic Modbus TCP to event stream bridge.
//!
//! [`cycle::CycleRunner`] performs one poll-publish-upload cycle,
//! [`scheduler::Scheduler`] drives it at a fixed period and [`runtime`] wires
//! both to the command line.

pub mod cycle;
pub mod runtime;
pub mod scheduler;

pub use cycle::{CycleReport, CycleRunner, PollSettings, Stage};
pub use scheduler::{Scheduler, SchedulerStats};
