//! Weekly timetabling engine for a music school: students, teachers, rooms,
//! courses and instrument lessons are assigned to 15-minute slots by a
//! sparse 0/1 MILP solved with HiGHS through `good_lp`.
//!
//! Model construction runs as a fixed single-threaded pipeline (geometry,
//! eligibility, variables, priority resolution, hard constraints, soft
//! penalties, objective); solving is a blocking two-phase call with an
//! optional warm start and a no-improvement stop rule.

pub mod data;
pub mod error;
pub mod server;
pub mod slots;
pub mod solver;

mod constraints;
mod eligibility;
mod extract;
mod model;
mod resolver;
mod soft;
mod variables;

pub use data::{
    Feature, InstrumentRequest, PenaltyKind, PenaltyRecord, Room, SchedulingInput,
    SchedulingOutput, Session, SessionAssignment, SolveStatus, Student, Subject, SubjectKind,
    Teacher,
};
pub use error::{DataIssue, Requirement, ScheduleError};
pub use solver::{Improvement, SolveOptions, solve, solve_with_progress};
