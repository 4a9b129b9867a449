//! Exam timetabling core.
//!
//! Places exams into (classroom, time slot) pairs without double-booking a
//! classroom, a lecturer or a student, records every placement in a
//! [`Ledger`](ledger::Ledger) and explains the exams it could not place.
//! [`schedule`] runs the solver; [`unscheduled`] lists what is still open.

pub mod calendar;
pub mod config;
pub mod conflict;
pub mod data;
pub mod error;
mod ilp;
pub mod ledger;
pub mod report;
pub mod server;
pub mod solver;
pub mod unscheduled;
pub mod validate;

pub use solver::{ScheduleOutcome, schedule};
pub use unscheduled::unscheduled;
