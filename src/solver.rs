use std::time::{Duration, Instant};

use good_lp::{ResolutionError, Solution, SolverModel, WithInitialSolution, default_solver};
use log::{info, warn};

use crate::data::{SchedulingInput, SchedulingOutput, SolveStatus};
use crate::error::ScheduleError;
use crate::extract::{self, Snapshot};
use crate::model::{self, BuiltModel, Profile};
use crate::variables::{Family, Key};

/// Orchestrator knobs. Defaults mirror production policy: warm start on,
/// multi-threaded search, 100 s stall window.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Solve the reduced sub-model first and hint the main solve with half
    /// of its assignment.
    pub warm_start: bool,
    pub threads: u32,
    /// Stop once a full window passes without an improving solution.
    pub stall_timeout: Duration,
    pub warm_start_timeout: Duration,
    /// Optional cap on solve rounds; hitting it while still improving
    /// yields `SolveStatus::Feasible`.
    pub max_rounds: Option<u32>,
    /// Forward the HiGHS search log to the console.
    pub solver_log: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            warm_start: true,
            threads: 8,
            stall_timeout: Duration::from_secs(100),
            warm_start_timeout: Duration::from_secs(30),
            max_rounds: None,
            solver_log: false,
        }
    }
}

/// One improving solution, mirrored to the caller for progress reporting.
/// Reported at most once each, in non-decreasing objective order.
#[derive(Debug, Clone)]
pub struct Improvement {
    pub round: u32,
    pub objective: f64,
    pub assignments: usize,
    pub elapsed: Duration,
}

/// Builds and solves the full timetabling model, blocking until a terminal
/// outcome. Construction-phase errors abort before any solving; solve-phase
/// outcomes come back as a typed result so callers can tell an infeasible
/// model from a stalled-but-usable one.
pub fn solve(
    input: &SchedulingInput,
    options: &SolveOptions,
) -> Result<SchedulingOutput, ScheduleError> {
    solve_with_progress(input, options, |_| {})
}

/// Like [`solve`], forwarding every improving solution to `on_improvement`.
///
/// good_lp exposes no in-search callback, so the no-improvement stop rule
/// runs at round granularity: each round is one stall window with a solver
/// wall-clock limit, re-hinted from the incumbent. A round that finishes
/// early proved optimality; a round that runs out without beating the
/// incumbent is the stall.
pub fn solve_with_progress(
    input: &SchedulingInput,
    options: &SolveOptions,
    mut on_improvement: impl FnMut(&Improvement),
) -> Result<SchedulingOutput, ScheduleError> {
    let started = Instant::now();
    let warm_hints = if options.warm_start {
        warm_start_hints(input, options)?
    } else {
        None
    };

    let mut best: Option<Snapshot> = None;
    let mut data_issues = Vec::new();
    let mut round: u32 = 0;
    let status = loop {
        round += 1;
        let built = model::build(input, Profile::Full)?;
        let BuiltModel {
            problem,
            constraints,
            objective,
            store,
            soft,
            issues,
        } = built;
        if round == 1 {
            data_issues = issues;
        }
        // pruning can leave nothing to decide; an empty model is trivially
        // optimal and HiGHS has nothing to chew on
        if store.is_empty() {
            info!("No decision variables survived pruning; returning an empty timetable");
            return Ok(extract::to_output(
                input,
                Snapshot::empty(),
                SolveStatus::Optimal,
                data_issues,
            ));
        }

        let limit = options.stall_timeout;
        let mut solver_model = problem
            .maximise(objective)
            .using(default_solver)
            .set_option("threads", options.threads as i32)
            .set_option("parallel", if options.threads > 1 { "on" } else { "off" })
            .set_option("mip_detect_symmetry", "false")
            .set_option("random_seed", 1234)
            .set_option("time_limit", limit.as_secs_f64())
            .set_option("output_flag", if options.solver_log { "true" } else { "false" });

        // round 1 takes the warm-start half-hint, later rounds the incumbent
        let hint_keys: Option<&[(Family, Key)]> = if round == 1 {
            warm_hints.as_deref()
        } else {
            best.as_ref().map(|b| b.assigned.as_slice())
        };
        if let Some(keys) = hint_keys {
            let pairs: Vec<_> = keys
                .iter()
                .filter_map(|&(family, key)| {
                    store.family(family).get(&key).map(|&var| (var, 1.0))
                })
                .collect();
            if !pairs.is_empty() {
                solver_model = solver_model.with_initial_solution(pairs);
            }
        }
        for row in constraints {
            solver_model.add_constraint(row);
        }

        info!("Starting solve round {round} ({limit:?} window)...");
        let round_started = Instant::now();
        match solver_model.solve() {
            Err(ResolutionError::Infeasible) => return Err(ScheduleError::Infeasible),
            Err(e) => return Err(ScheduleError::Solver(e.to_string())),
            Ok(solution) => {
                let snapshot = extract::snapshot(&solution, &store, &soft);
                let finished_early = round_started.elapsed() + Duration::from_secs(1) < limit;
                let improved = best
                    .as_ref()
                    .is_none_or(|b| snapshot.objective > b.objective + 1e-6);
                if improved {
                    info!(
                        "Round {round} improved the objective to {} ({} sessions) after {:.2?}",
                        snapshot.objective,
                        snapshot.assigned.len(),
                        started.elapsed()
                    );
                    on_improvement(&Improvement {
                        round,
                        objective: snapshot.objective,
                        assignments: snapshot.assigned.len(),
                        elapsed: started.elapsed(),
                    });
                    best = Some(snapshot);
                }
                if finished_early {
                    break SolveStatus::Optimal;
                }
                if !improved {
                    info!("No improvement within the {limit:?} window; stopping");
                    break SolveStatus::StallTimeout;
                }
                if options.max_rounds.is_some_and(|cap| round >= cap) {
                    break SolveStatus::Feasible;
                }
            }
        }
    };

    let Some(snapshot) = best else {
        return Err(ScheduleError::Solver(
            "solver terminated without a usable solution".to_string(),
        ));
    };
    info!(
        "Finished solving: {status:?}, objective {}, {} sessions in {:.2?}",
        snapshot.objective,
        snapshot.assigned.len(),
        started.elapsed()
    );
    Ok(extract::to_output(input, snapshot, status, data_issues))
}

/// Phase one: solve the reduced model (cardinality and pairing only, no
/// overlap/capacity/contract/soft terms) and keep the sorted first half of
/// its positive assignment as search hints. Partial hinting leaves the main
/// solver free to deviate.
fn warm_start_hints(
    input: &SchedulingInput,
    options: &SolveOptions,
) -> Result<Option<Vec<(Family, Key)>>, ScheduleError> {
    info!("Solving warm-start sub-model...");
    let built = model::build(input, Profile::WarmStart)?;
    let BuiltModel {
        problem,
        constraints,
        objective,
        store,
        ..
    } = built;
    if store.is_empty() {
        return Ok(None);
    }

    let mut solver_model = problem
        .maximise(objective)
        .using(default_solver)
        .set_option("threads", options.threads as i32)
        .set_option("random_seed", 1234)
        .set_option("time_limit", options.warm_start_timeout.as_secs_f64())
        .set_option("output_flag", "false");
    for row in constraints {
        solver_model.add_constraint(row);
    }

    match solver_model.solve() {
        Ok(solution) => {
            let mut assigned: Vec<(Family, Key)> = store
                .iter_all()
                .filter(|&(_, _, var)| solution.value(var) > 0.9)
                .map(|(family, key, _)| (family, *key))
                .collect();
            assigned.sort();
            let hinted = assigned.len() / 2;
            info!(
                "Warm start assigned {} sessions; hinting the first {hinted}",
                assigned.len()
            );
            assigned.truncate(hinted);
            Ok(Some(assigned))
        }
        Err(e) => {
            warn!("Warm start failed ({e}); continuing without hints");
            Ok(None)
        }
    }
}
