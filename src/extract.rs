use std::collections::BTreeSet;

use good_lp::Solution;

use crate::data::{
    PenaltyKind, PenaltyRecord, SchedulingInput, SchedulingOutput, SessionAssignment, SolveStatus,
    SubjectKind,
};
use crate::error::DataIssue;
use crate::model::{
    ANTIQUITY_DAY_WEIGHT, ANTIQUITY_DEVIATION_WEIGHT, ASSIGNMENT_WEIGHT,
    INSTRUMENT_PRIORITY_PENALTY_WEIGHT, SIBLING_DAY_MISMATCH_WEIGHT,
};
use crate::soft::SoftVars;
use crate::variables::{Family, Key, VarStore};

/// The decoded state of one solver solution: assigned variable keys,
/// penalty readings, and the objective recomputed from integral counts so
/// improvement comparisons are exact.
pub(crate) struct Snapshot {
    pub assigned: Vec<(Family, Key)>,
    pub low_priority_students: BTreeSet<usize>,
    pub day_hit_students: BTreeSet<usize>,
    pub deviation_hit_students: BTreeSet<usize>,
    pub sibling_hit_students: BTreeSet<usize>,
    pub objective: f64,
}

impl Snapshot {
    /// The trivial snapshot of a model with no decision variables left.
    pub fn empty() -> Self {
        Snapshot {
            assigned: Vec::new(),
            low_priority_students: BTreeSet::new(),
            day_hit_students: BTreeSet::new(),
            deviation_hit_students: BTreeSet::new(),
            sibling_hit_students: BTreeSet::new(),
            objective: 0.0,
        }
    }
}

pub(crate) fn snapshot(
    solution: &impl Solution,
    store: &VarStore,
    soft: &SoftVars,
) -> Snapshot {
    let mut assigned: Vec<(Family, Key)> = store
        .iter_all()
        .filter(|&(_, _, v)| solution.value(v) > 0.9)
        .map(|(f, k, _)| (f, *k))
        .collect();
    assigned.sort();

    let mut low_priority_students = BTreeSet::new();
    let mut low_priority_count = 0usize;
    for &(family, key) in &assigned {
        if Family::LOW_PRIORITY.contains(&family) {
            low_priority_students.insert(key.0);
            low_priority_count += 1;
        }
    }

    let mut day_hit_students = BTreeSet::new();
    let mut day_count = 0usize;
    for (&(s, _), &var) in &soft.day_penalties {
        if solution.value(var) > 0.5 {
            day_hit_students.insert(s);
            day_count += 1;
        }
    }
    let mut deviation_hit_students = BTreeSet::new();
    let mut deviation_count = 0usize;
    for (&(s, _), &var) in &soft.deviation_penalties {
        if solution.value(var) > 0.5 {
            deviation_hit_students.insert(s);
            deviation_count += 1;
        }
    }

    let mut sibling_hit_students = BTreeSet::new();
    for (&(group, _), &var) in &soft.sibling_day_penalties {
        if solution.value(var) > 0.5 {
            sibling_hit_students.extend(soft.sibling_groups[group].iter().copied());
        }
    }
    let sibling_total = soft
        .total_sibling_penalty
        .map(|var| solution.value(var).round())
        .unwrap_or(0.0);

    let objective = ASSIGNMENT_WEIGHT * assigned.len() as f64
        - INSTRUMENT_PRIORITY_PENALTY_WEIGHT * low_priority_count as f64
        - ANTIQUITY_DAY_WEIGHT * day_count as f64
        - ANTIQUITY_DEVIATION_WEIGHT * deviation_count as f64
        - SIBLING_DAY_MISMATCH_WEIGHT * sibling_total;

    Snapshot {
        assigned,
        low_priority_students,
        day_hit_students,
        deviation_hit_students,
        sibling_hit_students,
        objective,
    }
}

/// Decodes a snapshot into the two output record sequences, mapping
/// catalog indices back to ids.
pub(crate) fn to_output(
    input: &SchedulingInput,
    snapshot: Snapshot,
    status: SolveStatus,
    data_issues: Vec<DataIssue>,
) -> SchedulingOutput {
    let mut assignments: Vec<SessionAssignment> = snapshot
        .assigned
        .iter()
        .map(|&(family, (s, e, r, subj, t))| SessionAssignment {
            student_id: input.students[s].id,
            teacher_id: input.teachers[e].id,
            room_id: input.rooms[r].id,
            subject_kind: family.kind(),
            subject_id: match family.kind() {
                SubjectKind::Course => input.courses[subj].id,
                SubjectKind::Instrument => input.instruments[subj].id,
            },
            start_slot: t,
            session: family.session(),
        })
        .collect();
    assignments.sort();

    let mut penalties = Vec::new();
    let kinds = [
        (&snapshot.low_priority_students, PenaltyKind::InstrumentPrioritization),
        (&snapshot.day_hit_students, PenaltyKind::AntiquityDay),
        (&snapshot.deviation_hit_students, PenaltyKind::AntiquityDeviation),
        (&snapshot.sibling_hit_students, PenaltyKind::SiblingMismatch),
    ];
    for (students, kind) in kinds {
        for &s in students.iter() {
            penalties.push(PenaltyRecord {
                student_id: input.students[s].id,
                kind,
            });
        }
    }
    penalties.sort();

    SchedulingOutput {
        status,
        objective: snapshot.objective,
        assignments,
        penalties,
        data_issues,
    }
}
