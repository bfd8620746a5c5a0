use good_lp::{Constraint, Expression, ProblemVariables};
use log::debug;

use crate::constraints::{self, Ctx};
use crate::data::{IndexMaps, SchedulingInput};
use crate::eligibility::{self, Eligibility};
use crate::error::{DataIssue, ScheduleError};
use crate::resolver;
use crate::soft::{self, SoftVars};
use crate::variables::{self, Family, VarStore};

// Objective weights: satisfying demand dominates, instrument-priority
// violation comes next, then sibling cohesion, then schedule history.
pub(crate) const ASSIGNMENT_WEIGHT: f64 = 10.0;
pub(crate) const INSTRUMENT_PRIORITY_PENALTY_WEIGHT: f64 = 7.0;
pub(crate) const SIBLING_DAY_MISMATCH_WEIGHT: f64 = 4.0;
pub(crate) const ANTIQUITY_DAY_WEIGHT: f64 = 2.0;
pub(crate) const ANTIQUITY_DEVIATION_WEIGHT: f64 = 1.0;
/// The warm-start sub-model weighs the low-priority penalty differently.
pub(crate) const WARM_START_PRIORITY_PENALTY_WEIGHT: f64 = 4.0;

/// Which slice of the model to build: the reduced warm-start sub-model
/// carries only cardinality/pairing constraints and the assignment and
/// instrument-priority objective terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Profile {
    WarmStart,
    Full,
}

/// Everything one solve round needs: the variable container, the pending
/// constraint rows, the composed objective, and the maps required to read
/// the solution back out.
pub(crate) struct BuiltModel {
    pub problem: ProblemVariables,
    pub constraints: Vec<Constraint>,
    pub objective: Expression,
    pub store: VarStore,
    pub soft: SoftVars,
    pub issues: Vec<DataIssue>,
}

/// Runs the construction pipeline in its fixed order: validation,
/// reference checks, durations, eligibility, variables, priority
/// resolution and pruning, structural check, hard constraints, soft
/// penalties, objective. Each stage fully consumes its predecessor's
/// output; later stages prune the shared variable maps.
pub(crate) fn build(
    input: &SchedulingInput,
    profile: Profile,
) -> Result<BuiltModel, ScheduleError> {
    input.validate()?;
    let maps = IndexMaps::new(input);
    let mut issues = eligibility::check_references(input, &maps);
    let durations = eligibility::subject_durations(input, &mut issues);

    let student_eligibility = Eligibility::compute(
        input.students.iter().map(|s| s.availability.as_slice()),
        &durations,
    );
    let teacher_eligibility = Eligibility::compute(
        input.teachers.iter().map(|t| t.availability.as_slice()),
        &durations,
    );

    let mut problem = ProblemVariables::new();
    let mut store = variables::build_variables(
        &mut problem,
        input,
        &maps,
        &durations,
        &student_eligibility,
        &teacher_eligibility,
    );

    let resolution = resolver::resolve(input, &maps);
    resolver::apply(&mut store, &resolution);
    resolver::check_structural(&store, &resolution, input)?;

    let ctx = Ctx {
        input,
        durations: &durations,
        resolution: &resolution,
    };
    let mut rows = Vec::new();
    let mut soft_vars = SoftVars::empty();

    constraints::cardinality(&ctx, &store, &mut rows);
    if profile == Profile::Full {
        constraints::priority_exclusivity(&ctx, &mut problem, &store, &mut rows);
        constraints::student_overlaps(&ctx, &store, &mut rows);
        constraints::resource_overlaps(&ctx, &mut problem, &store, &mut rows);
        constraints::same_cell_single_type(&store, &mut rows);
        constraints::biweekly_day_exclusion(&ctx, &store, &mut rows);
        constraints::feature_matching(&ctx, &store, &mut rows);
        constraints::capacity(&ctx, &store, &mut rows);
        constraints::contract(&ctx, &store, &mut rows);

        let starts = soft::starts_by_student_day(&store);
        soft::antiquity(&ctx, &mut problem, &starts, &mut rows, &mut soft_vars);
        soft::siblings(&ctx, &mut problem, &starts, &mut rows, &mut soft_vars);
    }

    let objective = compose_objective(profile, &store, &soft_vars);
    debug!(
        "built {:?} model: {} variables, {} constraint rows",
        profile,
        store.len(),
        rows.len()
    );

    Ok(BuiltModel {
        problem,
        constraints: rows,
        objective,
        store,
        soft: soft_vars,
        issues,
    })
}

/// Weighted linear objective: maximize total assignments, charge the
/// low-priority instrument, antiquity and sibling penalty aggregates.
fn compose_objective(profile: Profile, store: &VarStore, soft: &SoftVars) -> Expression {
    let total_assignments: Expression = store.iter_all().map(|(_, _, v)| v).sum();
    let low_priority: Expression = Family::LOW_PRIORITY
        .iter()
        .flat_map(|&f| store.family(f).values().copied())
        .sum();

    let priority_weight = match profile {
        Profile::Full => INSTRUMENT_PRIORITY_PENALTY_WEIGHT,
        Profile::WarmStart => WARM_START_PRIORITY_PENALTY_WEIGHT,
    };
    let mut objective =
        ASSIGNMENT_WEIGHT * total_assignments - priority_weight * low_priority;

    if profile == Profile::Full {
        let day_total: Expression = soft.day_penalties.values().copied().sum();
        let deviation_total: Expression = soft.deviation_penalties.values().copied().sum();
        objective = objective
            - ANTIQUITY_DAY_WEIGHT * day_total
            - ANTIQUITY_DEVIATION_WEIGHT * deviation_total;
        if let Some(total) = soft.total_sibling_penalty {
            objective = objective - SIBLING_DAY_MISMATCH_WEIGHT * Expression::from(total);
        }
    }
    objective
}
