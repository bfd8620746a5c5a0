use std::collections::HashMap;

use good_lp::{Constraint, Expression, ProblemVariables, Variable, constraint, variable};
use itertools::Itertools;
use log::info;

use crate::constraints::Ctx;
use crate::data::SchedulingInput;
use crate::slots::{NUM_DAYS, NUM_SLOTS, day_of, day_slots};
use crate::variables::VarStore;

/// Deviations from last cycle's first start of up to 3 slots (45 minutes)
/// go unpenalized.
const DEVIATION_TOLERANCE_SLOTS: usize = 3;

/// Auxiliary penalty variables read back out of the solved model.
pub(crate) struct SoftVars {
    /// (student, day) -> class scheduled on a prior-cycle free day.
    pub day_penalties: HashMap<(usize, usize), Variable>,
    /// (student, day) -> first class deviates too far from the prior start.
    pub deviation_penalties: HashMap<(usize, usize), Variable>,
    pub sibling_groups: Vec<Vec<usize>>,
    /// (group index, day) -> number of mismatched pairs that day.
    pub sibling_day_penalties: HashMap<(usize, usize), Variable>,
    pub total_sibling_penalty: Option<Variable>,
}

impl SoftVars {
    pub fn empty() -> Self {
        SoftVars {
            day_penalties: HashMap::new(),
            deviation_penalties: HashMap::new(),
            sibling_groups: Vec::new(),
            sibling_day_penalties: HashMap::new(),
            total_sibling_penalty: None,
        }
    }
}

/// Variables grouped by (student, start day), with their start slots.
/// Sessions never cross days, so grouping by start slot is exact.
pub(crate) fn starts_by_student_day(
    store: &VarStore,
) -> HashMap<(usize, usize), Vec<(usize, Variable)>> {
    let mut map: HashMap<(usize, usize), Vec<(usize, Variable)>> = HashMap::new();
    for (_, key, var) in store.iter_all() {
        map.entry((key.0, day_of(key.4)))
            .or_default()
            .push((key.4, var));
    }
    map
}

/// The feasible antique schedule: per student with any prior-cycle class,
/// the first prior start slot per day that also lies inside the current
/// availability, or `None` for a day kept free (including days whose prior
/// class no longer fits the availability).
pub(crate) fn antique_schedule(input: &SchedulingInput) -> HashMap<usize, Vec<Option<usize>>> {
    let mut schedule = HashMap::new();
    for (s, student) in input.students.iter().enumerate() {
        if student.antiquity.iter().all(|&a| a == 0) {
            continue;
        }
        let days: Vec<Option<usize>> = (0..NUM_DAYS)
            .map(|d| {
                day_slots(d).find(|&t| student.antiquity[t] != 0 && student.available(t))
            })
            .collect();
        schedule.insert(s, days);
    }
    schedule
}

/// Antiquity penalties. Free days get a reified "anything scheduled here"
/// indicator. Days with a surviving prior start get an earliest-start
/// integer (minimum over conditional start-time substitutes, selection
/// binaries pinning the attained minimum), an absolute deviation, and a
/// penalty indicator reified against the 3-slot tolerance.
pub(crate) fn antiquity(
    ctx: &Ctx,
    problem: &mut ProblemVariables,
    starts: &HashMap<(usize, usize), Vec<(usize, Variable)>>,
    out: &mut Vec<Constraint>,
    soft: &mut SoftVars,
) {
    info!("Adding antiquity day and deviation penalties...");
    let max_slot = (NUM_SLOTS - 1) as f64;

    let schedule = antique_schedule(ctx.input);
    for (&s, days) in &schedule {
        for (d, prior_start) in days.iter().enumerate() {
            let Some(candidates) = starts.get(&(s, d)) else {
                continue;
            };
            match prior_start {
                None => {
                    let scheduled_any: Expression =
                        candidates.iter().map(|&(_, v)| v).sum();
                    let penalized = problem.add(variable().binary());
                    let ceiling = (candidates.len() as f64) * Expression::from(penalized);
                    out.push(constraint!(scheduled_any.clone() <= ceiling));
                    out.push(constraint!(penalized <= scheduled_any));
                    soft.day_penalties.insert((s, d), penalized);
                }
                Some(tau) => {
                    let tau = *tau as f64;
                    let first = problem.add(variable().integer().min(0.0).max(max_slot));
                    let mut selectors = Vec::with_capacity(candidates.len());
                    for &(t, v) in candidates {
                        // substitute evaluates to t when assigned, 99 otherwise
                        let substitute =
                            (t as f64 - max_slot) * Expression::from(v) + max_slot;
                        out.push(constraint!(first <= substitute.clone()));
                        let selected = problem.add(variable().binary());
                        let floor =
                            substitute + max_slot * Expression::from(selected) - max_slot;
                        out.push(constraint!(first >= floor));
                        selectors.push(selected);
                    }
                    let chosen: Expression = selectors.iter().copied().sum();
                    out.push(constraint!(chosen == 1));

                    let deviation = problem.add(variable().integer().min(0.0).max(max_slot));
                    out.push(constraint!(deviation + first >= tau));
                    out.push(constraint!(first - deviation <= tau));

                    let penalized = problem.add(variable().binary());
                    let tolerance = DEVIATION_TOLERANCE_SLOTS as f64;
                    let slack = (max_slot - tolerance) * Expression::from(penalized);
                    out.push(constraint!(Expression::from(deviation) - slack <= tolerance));
                    let threshold = (tolerance + 1.0) * Expression::from(penalized);
                    out.push(constraint!(threshold <= deviation));
                    soft.deviation_penalties.insert((s, d), penalized);
                }
            }
        }
    }
}

/// Maximal sibling groups: the symmetric, transitive closure of the
/// declared pairwise lists, keeping only groups of two or more.
pub(crate) fn sibling_groups(input: &SchedulingInput) -> Vec<Vec<usize>> {
    let index: HashMap<_, _> = input
        .students
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id, i))
        .collect();

    let mut parent: Vec<usize> = (0..input.students.len()).collect();
    fn find(parent: &mut Vec<usize>, mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    for (i, student) in input.students.iter().enumerate() {
        for sibling in &student.siblings {
            if let Some(&j) = index.get(sibling) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri.max(rj)] = ri.min(rj);
                }
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..input.students.len() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }
    let mut groups: Vec<Vec<usize>> = groups.into_values().filter(|g| g.len() > 1).collect();
    for group in &mut groups {
        group.sort();
    }
    groups.sort();
    groups
}

/// Sibling day-mismatch penalties: per member and day a reified has-class
/// indicator, per pair and day a mismatch variable that is one exactly when
/// the indicators differ, summed into per-(group, day) and total integers.
pub(crate) fn siblings(
    ctx: &Ctx,
    problem: &mut ProblemVariables,
    starts: &HashMap<(usize, usize), Vec<(usize, Variable)>>,
    out: &mut Vec<Constraint>,
    soft: &mut SoftVars,
) {
    info!("Adding sibling day-mismatch penalties...");
    soft.sibling_groups = sibling_groups(ctx.input);
    let mut all_day_penalties: Vec<Variable> = Vec::new();
    let mut total_bound = 0usize;

    for (g, group) in soft.sibling_groups.iter().enumerate() {
        // has-class indicator per member per day
        let mut day_vars: HashMap<(usize, usize), Variable> = HashMap::new();
        for &s in group {
            for d in 0..NUM_DAYS {
                let attends = problem.add(variable().binary());
                match starts.get(&(s, d)) {
                    Some(candidates) if !candidates.is_empty() => {
                        let scheduled_any: Expression =
                            candidates.iter().map(|&(_, v)| v).sum();
                        let ceiling =
                            (candidates.len() as f64) * Expression::from(attends);
                        out.push(constraint!(scheduled_any.clone() <= ceiling));
                        out.push(constraint!(attends <= scheduled_any));
                    }
                    _ => out.push(constraint!(attends <= 0)),
                }
                day_vars.insert((s, d), attends);
            }
        }

        for d in 0..NUM_DAYS {
            let mut mismatches = Vec::new();
            for (&a, &b) in group.iter().tuple_combinations() {
                let (ha, hb) = (day_vars[&(a, d)], day_vars[&(b, d)]);
                let differs = problem.add(variable().binary());
                out.push(constraint!(ha - hb <= differs));
                out.push(constraint!(hb - ha <= differs));
                out.push(constraint!(differs <= ha + hb));
                out.push(constraint!(differs + ha + hb <= 2));
                mismatches.push(differs);
            }
            if !mismatches.is_empty() {
                let bound = mismatches.len();
                let day_penalty = problem
                    .add(variable().integer().min(0.0).max(bound as f64));
                let mismatched: Expression = mismatches.iter().copied().sum();
                out.push(constraint!(day_penalty == mismatched));
                soft.sibling_day_penalties.insert((g, d), day_penalty);
                all_day_penalties.push(day_penalty);
                total_bound += bound;
            }
        }
    }

    if !all_day_penalties.is_empty() {
        let total = problem
            .add(variable().integer().min(0.0).max(total_bound as f64));
        let summed: Expression = all_day_penalties.iter().copied().sum();
        out.push(constraint!(total == summed));
        soft.total_sibling_penalty = Some(total);
    }
}
