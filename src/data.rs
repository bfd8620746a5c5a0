use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::ScheduleError;
use crate::slots::{MINUTES_PER_SLOT, NUM_SLOTS, slot_label};

// Type aliases for clarity
pub type StudentId = u32;
pub type TeacherId = u32;
pub type RoomId = u32;
pub type SubjectId = u32;

/// Priority weight that marks a first-choice instrument the student already
/// attended last cycle; it forces the high-priority family and disables the
/// second choice entirely.
pub const CONTINUITY_WEIGHT: f32 = 2.0;

/// Room equipment tags that subjects may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    SoundproofWalls,
    MusicStands,
    Piano,
    Drums,
    Projector,
    Desks,
    Whiteboard,
    Amplifier,
    Microphones,
}

/// A course or instrument offering from the catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub capacity: u32,
    /// 1 = weekly, 2 = biweekly (two sessions on different days).
    pub sessions_per_week: u8,
    pub minutes_per_session: u32,
    #[serde(default)]
    pub required_features: Vec<Feature>,
}

impl Subject {
    pub fn is_biweekly(&self) -> bool {
        self.sessions_per_week == 2
    }

    /// Session length in slots, or `None` for a malformed duration.
    pub fn duration_slots(&self) -> Option<usize> {
        if self.minutes_per_session == 0 || self.minutes_per_session % MINUTES_PER_SLOT != 0 {
            return None;
        }
        Some((self.minutes_per_session / MINUTES_PER_SLOT) as usize)
    }
}

/// One ranked instrument choice with its priority weight
/// (2 = continuity, 1 = first choice, 0.5 = second choice).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentRequest {
    pub instrument: SubjectId,
    pub weight: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    /// 0/1 bitmap over the 100 weekly slots.
    pub availability: Vec<u8>,
    #[serde(default)]
    pub requested_courses: Vec<SubjectId>,
    #[serde(default)]
    pub first_instrument: Option<InstrumentRequest>,
    #[serde(default)]
    pub second_instrument: Option<InstrumentRequest>,
    /// Continuation record: the student must keep attending a course.
    #[serde(default)]
    pub continuation_course: Option<SubjectId>,
    #[serde(default)]
    pub siblings: Vec<StudentId>,
    /// Prior-cycle occupied slots; empty means no antiquity at all.
    #[serde(default)]
    pub antiquity: Vec<u8>,
}

impl Student {
    pub fn available(&self, slot: usize) -> bool {
        self.availability.get(slot).is_some_and(|v| *v != 0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: TeacherId,
    pub availability: Vec<u8>,
    /// Contract budget: maximum teaching minutes per week.
    pub weekly_contract_minutes: u32,
    #[serde(default)]
    pub courses: Vec<SubjectId>,
    #[serde(default)]
    pub instruments: Vec<SubjectId>,
}

impl Teacher {
    pub fn available(&self, slot: usize) -> bool {
        self.availability.get(slot).is_some_and(|v| *v != 0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub capacity: u32,
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// The complete input for one solve run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingInput {
    pub students: Vec<Student>,
    pub teachers: Vec<Teacher>,
    pub rooms: Vec<Room>,
    pub courses: Vec<Subject>,
    pub instruments: Vec<Subject>,
}

impl SchedulingInput {
    /// Checks the structural shape of the input. Per-entity catalog issues
    /// are tolerated later; wrong-sized bitmaps and duplicate ids are not.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        for student in &self.students {
            if student.availability.len() != NUM_SLOTS {
                return Err(ScheduleError::InvalidInput(format!(
                    "student {} availability has {} slots, expected {NUM_SLOTS}",
                    student.id,
                    student.availability.len()
                )));
            }
            if !student.antiquity.is_empty() && student.antiquity.len() != NUM_SLOTS {
                return Err(ScheduleError::InvalidInput(format!(
                    "student {} antiquity has {} slots, expected {NUM_SLOTS} or none",
                    student.id,
                    student.antiquity.len()
                )));
            }
        }
        for teacher in &self.teachers {
            if teacher.availability.len() != NUM_SLOTS {
                return Err(ScheduleError::InvalidInput(format!(
                    "teacher {} availability has {} slots, expected {NUM_SLOTS}",
                    teacher.id,
                    teacher.availability.len()
                )));
            }
        }
        check_unique("student", self.students.iter().map(|s| s.id))?;
        check_unique("teacher", self.teachers.iter().map(|t| t.id))?;
        check_unique("room", self.rooms.iter().map(|r| r.id))?;
        check_unique("course", self.courses.iter().map(|c| c.id))?;
        check_unique("instrument", self.instruments.iter().map(|i| i.id))?;
        Ok(())
    }
}

fn check_unique(kind: &str, ids: impl Iterator<Item = u32>) -> Result<(), ScheduleError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ScheduleError::InvalidInput(format!(
                "duplicate {kind} id {id}"
            )));
        }
    }
    Ok(())
}

/// Catalog id -> index lookups used throughout model construction.
pub(crate) struct IndexMaps {
    pub courses: HashMap<SubjectId, usize>,
    pub instruments: HashMap<SubjectId, usize>,
}

impl IndexMaps {
    pub fn new(input: &SchedulingInput) -> Self {
        IndexMaps {
            courses: input
                .courses
                .iter()
                .enumerate()
                .map(|(i, c)| (c.id, i))
                .collect(),
            instruments: input
                .instruments
                .iter()
                .enumerate()
                .map(|(i, s)| (s.id, i))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubjectKind {
    Course,
    Instrument,
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectKind::Course => write!(f, "course"),
            SubjectKind::Instrument => write!(f, "instrument"),
        }
    }
}

/// Which of the (at most two) weekly sessions a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Session {
    First,
    Second,
}

/// A single scheduled session in the final timetable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAssignment {
    pub student_id: StudentId,
    pub teacher_id: TeacherId,
    pub room_id: RoomId,
    pub subject_kind: SubjectKind,
    pub subject_id: SubjectId,
    pub start_slot: usize,
    pub session: Session,
}

impl fmt::Display for SessionAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "student {} attends {} {} with teacher {} in room {} at {}",
            self.student_id,
            self.subject_kind,
            self.subject_id,
            self.teacher_id,
            self.room_id,
            slot_label(self.start_slot)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PenaltyKind {
    InstrumentPrioritization,
    AntiquityDay,
    AntiquityDeviation,
    SiblingMismatch,
}

/// One soft-constraint violation charged to a student in the final solution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyRecord {
    pub student_id: StudentId,
    pub kind: PenaltyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SolveStatus {
    /// The solver proved optimality within a round.
    Optimal,
    /// Stopped while still improving (round budget exhausted).
    Feasible,
    /// No improvement for a full stall window; best snapshot returned.
    StallTimeout,
}

/// The final output of the solver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingOutput {
    pub status: SolveStatus,
    pub objective: f64,
    pub assignments: Vec<SessionAssignment>,
    pub penalties: Vec<PenaltyRecord>,
    pub data_issues: Vec<crate::error::DataIssue>,
}
