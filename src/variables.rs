use std::collections::{HashMap, HashSet};

use good_lp::{ProblemVariables, Variable, variable};
use log::trace;

use crate::data::{IndexMaps, SchedulingInput, Session, SubjectKind};
use crate::eligibility::{Eligibility, SubjectKey};

/// Sparse variable key: (student, teacher, room, subject, start slot),
/// all catalog indices. A key is present in a family map iff the variable
/// survived every pruning step; absence means forced-to-zero.
pub(crate) type Key = (usize, usize, usize, usize, usize);

/// The six decision-variable families. `X` is a course session, `Y` the
/// high-priority instrument, `Z` the low-priority instrument; the `2`
/// variants are the second weekly session of a biweekly subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum Family {
    X,
    X2,
    Y,
    Y2,
    Z,
    Z2,
}

impl Family {
    pub const ALL: [Family; 6] = [
        Family::X,
        Family::X2,
        Family::Y,
        Family::Y2,
        Family::Z,
        Family::Z2,
    ];
    pub const COURSE: [Family; 2] = [Family::X, Family::X2];
    pub const INSTRUMENT: [Family; 4] = [Family::Y, Family::Y2, Family::Z, Family::Z2];
    pub const LOW_PRIORITY: [Family; 2] = [Family::Z, Family::Z2];

    pub fn kind(self) -> SubjectKind {
        match self {
            Family::X | Family::X2 => SubjectKind::Course,
            _ => SubjectKind::Instrument,
        }
    }

    pub fn session(self) -> Session {
        match self {
            Family::X | Family::Y | Family::Z => Session::First,
            _ => Session::Second,
        }
    }

    /// The subject key a variable of this family at `key` refers to.
    pub fn subject_key(self, key: &Key) -> SubjectKey {
        (self.kind(), key.3)
    }
}

/// Dictionary-of-variables over the five-dimensional assignment space.
/// Only a-priori feasible combinations are ever materialized.
#[derive(Default)]
pub(crate) struct VarStore {
    pub x: HashMap<Key, Variable>,
    pub x2: HashMap<Key, Variable>,
    pub y: HashMap<Key, Variable>,
    pub y2: HashMap<Key, Variable>,
    pub z: HashMap<Key, Variable>,
    pub z2: HashMap<Key, Variable>,
}

impl VarStore {
    pub fn family(&self, family: Family) -> &HashMap<Key, Variable> {
        match family {
            Family::X => &self.x,
            Family::X2 => &self.x2,
            Family::Y => &self.y,
            Family::Y2 => &self.y2,
            Family::Z => &self.z,
            Family::Z2 => &self.z2,
        }
    }

    pub fn family_mut(&mut self, family: Family) -> &mut HashMap<Key, Variable> {
        match family {
            Family::X => &mut self.x,
            Family::X2 => &mut self.x2,
            Family::Y => &mut self.y,
            Family::Y2 => &mut self.y2,
            Family::Z => &mut self.z,
            Family::Z2 => &mut self.z2,
        }
    }

    pub fn len(&self) -> usize {
        Family::ALL.iter().map(|&f| self.family(f).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter_all(&self) -> impl Iterator<Item = (Family, &Key, Variable)> + '_ {
        Family::ALL
            .into_iter()
            .flat_map(move |f| self.family(f).iter().map(move |(k, &v)| (f, k, v)))
    }
}

/// Materializes every a-priori feasible decision variable: the slot must be
/// a valid start for both the student and the teacher, and the teacher must
/// be qualified for the subject. This is the only full cross-product walk
/// in the pipeline.
pub(crate) fn build_variables(
    problem: &mut ProblemVariables,
    input: &SchedulingInput,
    maps: &IndexMaps,
    durations: &HashMap<SubjectKey, usize>,
    student_eligibility: &Eligibility,
    teacher_eligibility: &Eligibility,
) -> VarStore {
    let qualified_courses: Vec<HashSet<usize>> = input
        .teachers
        .iter()
        .map(|t| {
            t.courses
                .iter()
                .filter_map(|id| maps.courses.get(id).copied())
                .collect()
        })
        .collect();
    let qualified_instruments: Vec<HashSet<usize>> = input
        .teachers
        .iter()
        .map(|t| {
            t.instruments
                .iter()
                .filter_map(|id| maps.instruments.get(id).copied())
                .collect()
        })
        .collect();

    let num_rooms = input.rooms.len();
    let mut store = VarStore::default();

    for s in 0..input.students.len() {
        for e in 0..input.teachers.len() {
            for (c, course) in input.courses.iter().enumerate() {
                let key = (SubjectKind::Course, c);
                if !qualified_courses[e].contains(&c) || !durations.contains_key(&key) {
                    continue;
                }
                for &t in student_eligibility.starts(s, key) {
                    if !teacher_eligibility.is_valid_start(e, key, t) {
                        continue;
                    }
                    for r in 0..num_rooms {
                        store.x.insert((s, e, r, c, t), problem.add(variable().binary()));
                        if course.is_biweekly() {
                            store
                                .x2
                                .insert((s, e, r, c, t), problem.add(variable().binary()));
                        }
                    }
                }
            }

            for (i, instrument) in input.instruments.iter().enumerate() {
                let key = (SubjectKind::Instrument, i);
                if !qualified_instruments[e].contains(&i) || !durations.contains_key(&key) {
                    continue;
                }
                for &t in student_eligibility.starts(s, key) {
                    if !teacher_eligibility.is_valid_start(e, key, t) {
                        continue;
                    }
                    for r in 0..num_rooms {
                        store.y.insert((s, e, r, i, t), problem.add(variable().binary()));
                        store.z.insert((s, e, r, i, t), problem.add(variable().binary()));
                        if instrument.is_biweekly() {
                            store
                                .y2
                                .insert((s, e, r, i, t), problem.add(variable().binary()));
                            store
                                .z2
                                .insert((s, e, r, i, t), problem.add(variable().binary()));
                        }
                    }
                }
            }
        }
    }

    let theoretical = input.students.len()
        * input.teachers.len()
        * num_rooms
        * (input.courses.len() + input.instruments.len())
        * crate::slots::NUM_SLOTS;
    trace!(
        "materialized {} decision variables out of a theoretical maximum of {theoretical}",
        store.len()
    );
    store
}
