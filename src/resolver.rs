use std::collections::HashSet;

use log::debug;

use crate::data::{CONTINUITY_WEIGHT, IndexMaps, SchedulingInput};
use crate::error::{Requirement, ScheduleError};
use crate::variables::{Family, VarStore};

/// Per-student outcome of priority and continuity resolution.
pub(crate) struct Resolution {
    /// High-priority instrument (catalog index), if any was requested.
    pub y_instrument: Vec<Option<usize>>,
    /// Low-priority instrument; never schedulable when continuity is set.
    pub z_instrument: Vec<Option<usize>>,
    /// The high-priority choice carries the continuity weight.
    pub continuity: Vec<bool>,
    /// The student holds a continuation record: exactly one course must be
    /// scheduled instead of at most one.
    pub mandatory_course: Vec<bool>,
    /// Requested course catalog indices (dangling ids already dropped).
    pub requested_courses: Vec<HashSet<usize>>,
}

/// Compares the two ranked instrument requests per student: the higher
/// weight becomes the high-priority (y) choice, ties favour the first
/// request, and the continuity weight forces y-only scheduling.
pub(crate) fn resolve(input: &SchedulingInput, maps: &IndexMaps) -> Resolution {
    let n = input.students.len();
    let mut resolution = Resolution {
        y_instrument: Vec::with_capacity(n),
        z_instrument: Vec::with_capacity(n),
        continuity: Vec::with_capacity(n),
        mandatory_course: Vec::with_capacity(n),
        requested_courses: Vec::with_capacity(n),
    };

    for student in &input.students {
        let known = |request: &Option<crate::data::InstrumentRequest>| {
            request.as_ref().and_then(|r| {
                maps.instruments
                    .get(&r.instrument)
                    .map(|&idx| (idx, r.weight))
            })
        };
        let first = known(&student.first_instrument);
        let second = known(&student.second_instrument);

        let (high, low) = match (first, second) {
            (Some(f), Some(s)) => {
                if f.1 >= s.1 {
                    (Some(f), Some(s))
                } else {
                    (Some(s), Some(f))
                }
            }
            // a lone request is always the high-priority choice
            (Some(f), None) => (Some(f), None),
            (None, Some(s)) => (Some(s), None),
            (None, None) => (None, None),
        };

        resolution.y_instrument.push(high.map(|(idx, _)| idx));
        resolution.z_instrument.push(low.map(|(idx, _)| idx));
        resolution.continuity.push(
            high.is_some_and(|(_, weight)| (weight - CONTINUITY_WEIGHT).abs() < 1e-6),
        );
        resolution.mandatory_course.push(
            student
                .continuation_course
                .is_some_and(|id| maps.courses.contains_key(&id)),
        );
        resolution.requested_courses.push(
            student
                .requested_courses
                .iter()
                .filter_map(|id| maps.courses.get(id).copied())
                .collect(),
        );
    }
    resolution
}

/// Deletes every variable inconsistent with the resolution: courses the
/// student never requested, instruments other than the resolved y/z pair,
/// any z variable when none was requested or continuity forbids it.
/// Removal from the map is the forced-to-zero representation.
pub(crate) fn apply(store: &mut VarStore, resolution: &Resolution) {
    let before = store.len();

    store
        .x
        .retain(|k, _| resolution.requested_courses[k.0].contains(&k.3));
    store
        .x2
        .retain(|k, _| resolution.requested_courses[k.0].contains(&k.3));
    store
        .y
        .retain(|k, _| resolution.y_instrument[k.0] == Some(k.3));
    store
        .y2
        .retain(|k, _| resolution.y_instrument[k.0] == Some(k.3));
    store.z.retain(|k, _| {
        !resolution.continuity[k.0] && resolution.z_instrument[k.0] == Some(k.3)
    });
    store.z2.retain(|k, _| {
        !resolution.continuity[k.0] && resolution.z_instrument[k.0] == Some(k.3)
    });

    debug!(
        "priority resolution pruned {} of {before} variables",
        before - store.len()
    );
}

/// Fail-fast check: an exact-one requirement whose variable family came out
/// of pruning empty can never be satisfied, so the model is infeasible by
/// construction. Runs before the expensive solve and names the student.
pub(crate) fn check_structural(
    store: &VarStore,
    resolution: &Resolution,
    input: &SchedulingInput,
) -> Result<(), ScheduleError> {
    let n = input.students.len();
    let has = |family: Family| {
        let mut present = vec![false; n];
        for key in store.family(family).keys() {
            present[key.0] = true;
        }
        present
    };
    let has_x = has(Family::X);
    let has_y = has(Family::Y);
    let has_y2 = has(Family::Y2);

    for (s, student) in input.students.iter().enumerate() {
        if resolution.mandatory_course[s] && !has_x[s] {
            return Err(ScheduleError::StructurallyInfeasible {
                student_id: student.id,
                requirement: Requirement::MandatoryCourse,
            });
        }
        if resolution.continuity[s] {
            let biweekly = resolution.y_instrument[s]
                .is_some_and(|i| input.instruments[i].is_biweekly());
            if !has_y[s] || (biweekly && !has_y2[s]) {
                return Err(ScheduleError::StructurallyInfeasible {
                    student_id: student.id,
                    requirement: Requirement::ContinuityInstrument,
                });
            }
        }
    }
    Ok(())
}
