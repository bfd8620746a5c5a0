use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::data::{IndexMaps, SchedulingInput, SubjectKind};
use crate::error::DataIssue;
use crate::slots::{NUM_SLOTS, same_day};

/// A catalog subject addressed by kind and index.
pub(crate) type SubjectKey = (SubjectKind, usize);

/// Session lengths in slots for every well-formed catalog subject. Subjects
/// with malformed durations are reported per entity and never scheduled.
pub(crate) fn subject_durations(
    input: &SchedulingInput,
    issues: &mut Vec<DataIssue>,
) -> HashMap<SubjectKey, usize> {
    let mut durations = HashMap::new();
    let catalogs = [
        (SubjectKind::Course, &input.courses),
        (SubjectKind::Instrument, &input.instruments),
    ];
    for (kind, subjects) in catalogs {
        for (idx, subject) in subjects.iter().enumerate() {
            match subject.duration_slots() {
                Some(d) => {
                    durations.insert((kind, idx), d);
                }
                None => issues.push(DataIssue::new(
                    format!("{kind} {}", subject.id),
                    format!(
                        "session duration of {} minutes is not a positive multiple of 15",
                        subject.minutes_per_session
                    ),
                )),
            }
            if subject.sessions_per_week != 1 && subject.sessions_per_week != 2 {
                issues.push(DataIssue::new(
                    format!("{kind} {}", subject.id),
                    format!(
                        "sessions per week is {}, expected 1 or 2; treating as weekly",
                        subject.sessions_per_week
                    ),
                ));
            }
        }
    }
    durations
}

/// All slots at which a class of the given duration can start without
/// crossing a day boundary and with the party available for every covered
/// slot. Ordered ascending.
pub(crate) fn valid_starts(availability: &[u8], duration_slots: usize) -> Vec<usize> {
    (0..NUM_SLOTS)
        .filter(|&t| {
            t + duration_slots <= NUM_SLOTS
                && same_day(t, duration_slots)
                && availability[t..t + duration_slots].iter().all(|&a| a != 0)
        })
        .collect()
}

/// Valid starting slots per (party, subject): the degrees of freedom left
/// after availability and day-boundary pruning. Variables are only ever
/// created at these slots.
pub(crate) struct Eligibility {
    per_party: Vec<HashMap<SubjectKey, Vec<usize>>>,
}

impl Eligibility {
    pub fn compute<'a>(
        availabilities: impl Iterator<Item = &'a [u8]>,
        durations: &HashMap<SubjectKey, usize>,
    ) -> Self {
        let per_party = availabilities
            .map(|availability| {
                durations
                    .iter()
                    .map(|(&key, &d)| (key, valid_starts(availability, d)))
                    .collect()
            })
            .collect::<Vec<_>>();
        debug!("computed eligibility for {} parties", per_party.len());
        Eligibility { per_party }
    }

    pub fn starts(&self, party: usize, key: SubjectKey) -> &[usize] {
        self.per_party[party]
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_valid_start(&self, party: usize, key: SubjectKey, slot: usize) -> bool {
        self.starts(party, key).binary_search(&slot).is_ok()
    }
}

/// Cross-checks every id reference against the catalogs and the student
/// roster. Dangling references are reported per entity and later ignored.
pub(crate) fn check_references(input: &SchedulingInput, maps: &IndexMaps) -> Vec<DataIssue> {
    let mut issues = Vec::new();
    let student_ids: HashSet<_> = input.students.iter().map(|s| s.id).collect();

    for student in &input.students {
        let entity = format!("student {}", student.id);
        for course_id in &student.requested_courses {
            if !maps.courses.contains_key(course_id) {
                issues.push(DataIssue::new(
                    &entity,
                    format!("requested course {course_id} is not in the catalog"),
                ));
            }
        }
        for request in [&student.first_instrument, &student.second_instrument]
            .into_iter()
            .flatten()
        {
            if !maps.instruments.contains_key(&request.instrument) {
                issues.push(DataIssue::new(
                    &entity,
                    format!(
                        "requested instrument {} is not in the catalog",
                        request.instrument
                    ),
                ));
            }
        }
        if let Some(course_id) = student.continuation_course {
            if !maps.courses.contains_key(&course_id) {
                issues.push(DataIssue::new(
                    &entity,
                    format!("continuation course {course_id} is not in the catalog"),
                ));
            }
        }
        for sibling in &student.siblings {
            if !student_ids.contains(sibling) {
                issues.push(DataIssue::new(
                    &entity,
                    format!("declared sibling {sibling} is not an enrolled student"),
                ));
            }
        }
    }

    for teacher in &input.teachers {
        let entity = format!("teacher {}", teacher.id);
        for course_id in &teacher.courses {
            if !maps.courses.contains_key(course_id) {
                issues.push(DataIssue::new(
                    &entity,
                    format!("qualified course {course_id} is not in the catalog"),
                ));
            }
        }
        for instrument_id in &teacher.instruments {
            if !maps.instruments.contains_key(instrument_id) {
                issues.push(DataIssue::new(
                    &entity,
                    format!("qualified instrument {instrument_id} is not in the catalog"),
                ));
            }
        }
    }

    for issue in &issues {
        warn!("{issue}");
    }
    issues
}
