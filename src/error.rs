use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::data::StudentId;

/// A per-student requirement that pruning can render unsatisfiable before
/// the solver ever runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    ContinuityInstrument,
    MandatoryCourse,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::ContinuityInstrument => write!(f, "the continuity instrument"),
            Requirement::MandatoryCourse => write!(f, "a mandatory course"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Pruning emptied the variable set behind an exact-one requirement, so
    /// the model is infeasible by construction. Reported before solving.
    #[error("structurally infeasible: student {student_id} has no remaining way to attend {requirement}")]
    StructurallyInfeasible {
        student_id: StudentId,
        requirement: Requirement,
    },

    /// The fully-built model admits no assignment at all.
    #[error("no feasible timetable exists for this input")]
    Infeasible,

    #[error("solver failure: {0}")]
    Solver(String),
}

/// A malformed or dangling upstream field, reported per entity instead of
/// aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIssue {
    pub entity: String,
    pub detail: String,
}

impl DataIssue {
    pub fn new(entity: impl Into<String>, detail: impl Into<String>) -> Self {
        DataIssue {
            entity: entity.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for DataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.detail)
    }
}
