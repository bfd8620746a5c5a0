use std::collections::{HashMap, HashSet};

use good_lp::{Constraint, Expression, ProblemVariables, Variable, constraint, variable};
use log::info;

use crate::data::{Feature, SchedulingInput, Subject, SubjectKind};
use crate::eligibility::SubjectKey;
use crate::resolver::Resolution;
use crate::slots::{MINUTES_PER_SLOT, NUM_SLOTS, day_of};
use crate::variables::{Family, Key, VarStore};

/// Read-only context shared by every constraint builder.
pub(crate) struct Ctx<'a> {
    pub input: &'a SchedulingInput,
    pub durations: &'a HashMap<SubjectKey, usize>,
    pub resolution: &'a Resolution,
}

impl<'a> Ctx<'a> {
    pub fn subject(&self, kind: SubjectKind, idx: usize) -> &Subject {
        match kind {
            SubjectKind::Course => &self.input.courses[idx],
            SubjectKind::Instrument => &self.input.instruments[idx],
        }
    }

    /// Session length in slots. Variables only exist for subjects with a
    /// known duration, so the lookup is total here.
    pub fn duration(&self, family: Family, key: &Key) -> usize {
        self.durations[&family.subject_key(key)]
    }
}

fn zero() -> Expression {
    Expression::from(0.0)
}

/// Per-student cardinality: at most one course and one instrument of each
/// priority across all (teacher, room, slot) choices, tightened to exactly
/// one where a continuation record or continuity makes the requirement
/// mandatory. Biweekly pairing: per biweekly subject, the second-session
/// total equals the first-session total, so both sessions happen or neither.
pub(crate) fn cardinality(ctx: &Ctx, store: &VarStore, out: &mut Vec<Constraint>) {
    info!("Adding cardinality and biweekly pairing constraints...");
    let n = ctx.input.students.len();

    // (family, student) -> running total, plus per (family, student, subject)
    // totals for the biweekly pairing rows
    let mut totals: HashMap<(Family, usize), (Expression, usize)> = HashMap::new();
    let mut per_subject: HashMap<(Family, usize, usize), Expression> = HashMap::new();
    for (family, key, var) in store.iter_all() {
        let entry = totals.entry((family, key.0)).or_insert_with(|| (zero(), 0));
        entry.0 += var;
        entry.1 += 1;
        if ctx.subject(family.kind(), key.3).is_biweekly() {
            *per_subject
                .entry((family, key.0, key.3))
                .or_insert_with(zero) += var;
        }
    }

    for s in 0..n {
        for family in Family::ALL {
            let Some((total, _)) = totals.remove(&(family, s)) else {
                continue;
            };
            let exactly_one = match family {
                Family::X => ctx.resolution.mandatory_course[s],
                Family::Y => ctx.resolution.continuity[s],
                _ => false,
            };
            if exactly_one {
                out.push(constraint!(total == 1));
            } else {
                out.push(constraint!(total <= 1));
            }
        }
    }

    // first and second sessions of a biweekly subject are created and pruned
    // together, so iterating the first-session entries covers every pair
    for (first, second) in [
        (Family::X, Family::X2),
        (Family::Y, Family::Y2),
        (Family::Z, Family::Z2),
    ] {
        let keys: Vec<(usize, usize)> = per_subject
            .keys()
            .filter(|(f, _, _)| *f == first)
            .map(|&(_, s, subj)| (s, subj))
            .collect();
        for (s, subj) in keys {
            let first_total = per_subject.remove(&(first, s, subj)).unwrap_or_else(zero);
            let second_total = per_subject.remove(&(second, s, subj)).unwrap_or_else(zero);
            out.push(constraint!(second_total == first_total));
        }
    }

    // continuity additionally forces the second session of a biweekly
    // continuity instrument; the pairing equality above propagates the
    // exact-one from the first session, so nothing more is needed here
}

/// A student may hold high-priority (y) sessions or low-priority (z)
/// sessions, never both. The family totals are already capped at one, so
/// the indicator equals its family total.
pub(crate) fn priority_exclusivity(
    ctx: &Ctx,
    problem: &mut ProblemVariables,
    store: &VarStore,
    out: &mut Vec<Constraint>,
) {
    info!("Adding instrument priority exclusivity constraints...");
    let n = ctx.input.students.len();
    let mut y_sums: Vec<Option<Expression>> = vec![None; n];
    let mut z_sums: Vec<Option<Expression>> = vec![None; n];
    for (key, &var) in &store.y {
        *y_sums[key.0].get_or_insert_with(zero) += var;
    }
    for (key, &var) in &store.z {
        *z_sums[key.0].get_or_insert_with(zero) += var;
    }

    for s in 0..n {
        let (Some(y_sum), Some(z_sum)) = (y_sums[s].take(), z_sums[s].take()) else {
            continue;
        };
        let has_y = problem.add(variable().binary());
        let has_z = problem.add(variable().binary());
        out.push(constraint!(y_sum.clone() <= has_y));
        out.push(constraint!(has_y <= y_sum));
        out.push(constraint!(z_sum.clone() <= has_z));
        out.push(constraint!(has_z <= z_sum));
        out.push(constraint!(has_y + has_z <= 1));
    }
}

/// No student sits in two classes at once: for every slot, the variables
/// whose session window covers that slot sum to at most one.
pub(crate) fn student_overlaps(ctx: &Ctx, store: &VarStore, out: &mut Vec<Constraint>) {
    info!("Adding student overlap constraints...");
    let n = ctx.input.students.len();
    let mut occupied: Vec<Vec<Vec<Variable>>> = vec![vec![Vec::new(); NUM_SLOTS]; n];
    for (family, key, var) in store.iter_all() {
        let duration = ctx.duration(family, key);
        for t in key.4..key.4 + duration {
            occupied[key.0][t].push(var);
        }
    }
    for slots in &occupied {
        for vars in slots {
            if vars.len() >= 2 {
                let busy: Expression = vars.iter().copied().sum();
                out.push(constraint!(busy <= 1));
            }
        }
    }
}

/// A class is one (teacher, room, subject, start) cell; students aggregate
/// into it. Derived indicators reify "this class runs", and teachers and
/// rooms may each host at most one running class per slot.
pub(crate) fn resource_overlaps(
    ctx: &Ctx,
    problem: &mut ProblemVariables,
    store: &VarStore,
    out: &mut Vec<Constraint>,
) {
    info!("Adding teacher and room overlap constraints...");
    let mut classes: HashMap<(usize, usize, SubjectKind, usize, usize), Vec<Variable>> =
        HashMap::new();
    for (family, key, var) in store.iter_all() {
        classes
            .entry((key.1, key.2, family.kind(), key.3, key.4))
            .or_default()
            .push(var);
    }

    let num_teachers = ctx.input.teachers.len();
    let num_rooms = ctx.input.rooms.len();
    let mut teacher_busy: Vec<Vec<Vec<Variable>>> = vec![vec![Vec::new(); NUM_SLOTS]; num_teachers];
    let mut room_busy: Vec<Vec<Vec<Variable>>> = vec![vec![Vec::new(); NUM_SLOTS]; num_rooms];

    for (&(e, r, kind, subj, start), vars) in &classes {
        let running = problem.add(variable().binary());
        let attendance: Expression = vars.iter().copied().sum();
        for &var in vars {
            out.push(constraint!(var <= running));
        }
        out.push(constraint!(running <= attendance));

        let duration = ctx.durations[&(kind, subj)];
        for t in start..start + duration {
            teacher_busy[e][t].push(running);
            room_busy[r][t].push(running);
        }
    }

    for busy in teacher_busy.iter().chain(room_busy.iter()) {
        for indicators in busy {
            if indicators.len() >= 2 {
                let active: Expression = indicators.iter().copied().sum();
                out.push(constraint!(active <= 1));
            }
        }
    }
}

/// One (student, teacher, room, slot) cell holds at most one class type;
/// different families may not silently stack in the identical cell.
pub(crate) fn same_cell_single_type(store: &VarStore, out: &mut Vec<Constraint>) {
    let mut cells: HashMap<(usize, usize, usize, usize), Vec<Variable>> = HashMap::new();
    for (_, key, var) in store.iter_all() {
        cells
            .entry((key.0, key.1, key.2, key.4))
            .or_default()
            .push(var);
    }
    for vars in cells.values() {
        if vars.len() >= 2 {
            let stacked: Expression = vars.iter().copied().sum();
            out.push(constraint!(stacked <= 1));
        }
    }
}

/// The two weekly sessions of a biweekly subject must fall on different
/// days: per student, subject and day, the first- and second-session
/// variables starting that day sum to at most one.
pub(crate) fn biweekly_day_exclusion(ctx: &Ctx, store: &VarStore, out: &mut Vec<Constraint>) {
    info!("Adding biweekly same-day exclusion constraints...");
    for (first, second) in [
        (Family::X, Family::X2),
        (Family::Y, Family::Y2),
        (Family::Z, Family::Z2),
    ] {
        let mut by_day: HashMap<(usize, usize, usize), Vec<Variable>> = HashMap::new();
        for family in [first, second] {
            for (key, &var) in store.family(family) {
                if ctx.subject(family.kind(), key.3).is_biweekly() {
                    by_day
                        .entry((key.0, key.3, day_of(key.4)))
                        .or_default()
                        .push(var);
                }
            }
        }
        for vars in by_day.values() {
            if vars.len() >= 2 {
                let same_day_sessions: Expression = vars.iter().copied().sum();
                out.push(constraint!(same_day_sessions <= 1));
            }
        }
    }
}

/// A subject requiring a feature may only run in rooms possessing it: every
/// variable placed in a lacking room is bounded to zero.
pub(crate) fn feature_matching(ctx: &Ctx, store: &VarStore, out: &mut Vec<Constraint>) {
    info!("Adding room feature constraints...");
    let room_features: Vec<HashSet<Feature>> = ctx
        .input
        .rooms
        .iter()
        .map(|r| r.features.iter().copied().collect())
        .collect();
    for (family, key, var) in store.iter_all() {
        let subject = ctx.subject(family.kind(), key.3);
        if subject
            .required_features
            .iter()
            .any(|f| !room_features[key.2].contains(f))
        {
            out.push(constraint!(var <= 0));
        }
    }
}

/// Subject capacity: per (subject, slot), the students assigned across all
/// teachers and rooms must not exceed the declared capacity. Room capacity:
/// per (room, slot), the occupying students must fit the room.
pub(crate) fn capacity(ctx: &Ctx, store: &VarStore, out: &mut Vec<Constraint>) {
    info!("Adding capacity constraints...");
    let mut subject_load: HashMap<(SubjectKind, usize, usize), (Expression, usize)> =
        HashMap::new();
    let mut room_load: HashMap<(usize, usize), (Expression, usize)> = HashMap::new();
    for (family, key, var) in store.iter_all() {
        let entry = subject_load
            .entry((family.kind(), key.3, key.4))
            .or_insert_with(|| (zero(), 0));
        entry.0 += var;
        entry.1 += 1;

        let duration = ctx.duration(family, key);
        for t in key.4..key.4 + duration {
            let entry = room_load.entry((key.2, t)).or_insert_with(|| (zero(), 0));
            entry.0 += var;
            entry.1 += 1;
        }
    }

    for ((kind, subj, _), (load, count)) in subject_load {
        let cap = ctx.subject(kind, subj).capacity;
        if count as u32 > cap {
            out.push(constraint!(load <= cap as f64));
        }
    }
    for ((room, _), (load, count)) in room_load {
        let cap = ctx.input.rooms[room].capacity;
        if count as u32 > cap {
            out.push(constraint!(load <= cap as f64));
        }
    }
}

/// Teacher workload: the slot-weighted sum of all assigned sessions stays
/// within the weekly contract, converted to slot units.
pub(crate) fn contract(ctx: &Ctx, store: &VarStore, out: &mut Vec<Constraint>) {
    info!("Adding teacher contract constraints...");
    let num_teachers = ctx.input.teachers.len();
    // per (teacher, subject) attendance totals, scaled once by duration
    let mut per_subject: HashMap<(usize, SubjectKind, usize), Expression> = HashMap::new();
    for (family, key, var) in store.iter_all() {
        *per_subject
            .entry((key.1, family.kind(), key.3))
            .or_insert_with(zero) += var;
    }

    let mut teaching: Vec<Option<Expression>> = vec![None; num_teachers];
    for ((e, kind, subj), total) in per_subject {
        let duration = ctx.durations[&(kind, subj)] as f64;
        *teaching[e].get_or_insert_with(zero) += duration * total;
    }

    for (e, teacher) in ctx.input.teachers.iter().enumerate() {
        if let Some(minutes) = teaching[e].take() {
            let budget_slots = teacher.weekly_contract_minutes / MINUTES_PER_SLOT;
            out.push(constraint!(minutes <= budget_slots as f64));
        }
    }
}
