use std::ops::Range;
use std::time::Duration;

use lesson_scheduler::slots::{NUM_SLOTS, day_of};
use lesson_scheduler::{
    Feature, InstrumentRequest, PenaltyKind, Room, ScheduleError, SchedulingInput, Session,
    SolveOptions, SolveStatus, Student, Subject, SubjectKind, Teacher, solve,
};

fn bitmap(open: &[Range<usize>]) -> Vec<u8> {
    let mut slots = vec![0u8; NUM_SLOTS];
    for range in open {
        for t in range.clone() {
            slots[t] = 1;
        }
    }
    slots
}

fn subject(id: u32, capacity: u32, sessions_per_week: u8, minutes: u32) -> Subject {
    Subject {
        id,
        capacity,
        sessions_per_week,
        minutes_per_session: minutes,
        required_features: vec![],
    }
}

fn student(id: u32, availability: Vec<u8>) -> Student {
    Student {
        id,
        availability,
        requested_courses: vec![],
        first_instrument: None,
        second_instrument: None,
        continuation_course: None,
        siblings: vec![],
        antiquity: vec![],
    }
}

fn teacher(id: u32, availability: Vec<u8>, courses: Vec<u32>, instruments: Vec<u32>) -> Teacher {
    Teacher {
        id,
        availability,
        weekly_contract_minutes: 900,
        courses,
        instruments,
    }
}

fn room(id: u32, capacity: u32) -> Room {
    Room {
        id,
        capacity,
        features: vec![],
    }
}

fn options() -> SolveOptions {
    SolveOptions {
        warm_start: false,
        threads: 1,
        stall_timeout: Duration::from_secs(30),
        warm_start_timeout: Duration::from_secs(10),
        max_rounds: None,
        solver_log: false,
    }
}

#[test]
fn round_trip_single_assignment() {
    let window = bitmap(&[0..4]);
    let mut s = student(1, window.clone());
    s.requested_courses = vec![401];
    let input = SchedulingInput {
        students: vec![s],
        teachers: vec![teacher(10, window, vec![401], vec![])],
        rooms: vec![room(100, 5)],
        courses: vec![subject(401, 10, 1, 60)],
        instruments: vec![],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.status, SolveStatus::Optimal);
    assert_eq!(output.assignments.len(), 1);
    let a = &output.assignments[0];
    assert_eq!(a.student_id, 1);
    assert_eq!(a.teacher_id, 10);
    assert_eq!(a.room_id, 100);
    assert_eq!(a.subject_kind, SubjectKind::Course);
    assert_eq!(a.subject_id, 401);
    assert_eq!(a.start_slot, 0);
    assert_eq!(a.session, Session::First);
    assert_eq!(output.objective, 10.0);
    assert!(output.penalties.is_empty());
}

#[test]
fn continuity_schedules_the_first_choice_only() {
    let window = bitmap(&[0..8]);
    let mut s = student(1, window.clone());
    s.first_instrument = Some(InstrumentRequest {
        instrument: 501,
        weight: 2.0,
    });
    s.second_instrument = Some(InstrumentRequest {
        instrument: 502,
        weight: 0.5,
    });
    let input = SchedulingInput {
        students: vec![s],
        teachers: vec![teacher(10, window, vec![], vec![501, 502])],
        rooms: vec![room(100, 2)],
        courses: vec![],
        instruments: vec![subject(501, 1, 1, 60), subject(502, 1, 1, 60)],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.assignments.len(), 1);
    assert_eq!(output.assignments[0].subject_id, 501);
    assert!(output.penalties.is_empty());
}

#[test]
fn high_priority_wins_when_both_instruments_fit() {
    let window = bitmap(&[0..8]);
    let mut s = student(1, window.clone());
    s.first_instrument = Some(InstrumentRequest {
        instrument: 501,
        weight: 1.0,
    });
    s.second_instrument = Some(InstrumentRequest {
        instrument: 502,
        weight: 0.5,
    });
    let input = SchedulingInput {
        students: vec![s],
        teachers: vec![teacher(10, window, vec![], vec![501, 502])],
        rooms: vec![room(100, 2)],
        courses: vec![],
        instruments: vec![subject(501, 1, 1, 60), subject(502, 1, 1, 60)],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.assignments.len(), 1);
    assert_eq!(output.assignments[0].subject_id, 501);
    assert!(output.penalties.is_empty());
    assert_eq!(output.objective, 10.0);
}

#[test]
fn feature_mismatch_falls_back_to_the_second_choice() {
    let window = bitmap(&[0..8]);
    let mut s = student(1, window.clone());
    s.first_instrument = Some(InstrumentRequest {
        instrument: 501,
        weight: 1.0,
    });
    s.second_instrument = Some(InstrumentRequest {
        instrument: 502,
        weight: 0.5,
    });
    let mut piano_lessons = subject(501, 1, 1, 60);
    piano_lessons.required_features = vec![Feature::Piano];
    let input = SchedulingInput {
        students: vec![s],
        teachers: vec![teacher(10, window, vec![], vec![501, 502])],
        rooms: vec![room(100, 2)], // no piano anywhere
        courses: vec![],
        instruments: vec![piano_lessons, subject(502, 1, 1, 60)],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.assignments.len(), 1);
    assert_eq!(output.assignments[0].subject_id, 502);
    assert_eq!(output.penalties.len(), 1);
    assert_eq!(
        output.penalties[0].kind,
        PenaltyKind::InstrumentPrioritization
    );
    assert_eq!(output.objective, 3.0);
}

#[test]
fn biweekly_sessions_land_on_different_days() {
    let window = bitmap(&[0..2, 20..22]);
    let mut s = student(1, window.clone());
    s.first_instrument = Some(InstrumentRequest {
        instrument: 501,
        weight: 1.0,
    });
    let input = SchedulingInput {
        students: vec![s],
        teachers: vec![teacher(10, window, vec![], vec![501])],
        rooms: vec![room(100, 1)],
        courses: vec![],
        instruments: vec![subject(501, 1, 2, 30)],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.assignments.len(), 2);
    let days: Vec<usize> = output
        .assignments
        .iter()
        .map(|a| day_of(a.start_slot))
        .collect();
    assert_ne!(days[0], days[1]);
    let mut sessions: Vec<Session> = output.assignments.iter().map(|a| a.session).collect();
    sessions.sort();
    assert_eq!(sessions, vec![Session::First, Session::Second]);
    assert_eq!(output.objective, 20.0);
}

#[test]
fn biweekly_subject_cannot_fit_in_a_single_day() {
    // plenty of Monday space, nothing on other days: both sessions would
    // share the day, so neither can be scheduled
    let window = bitmap(&[0..8]);
    let mut s = student(1, window.clone());
    s.first_instrument = Some(InstrumentRequest {
        instrument: 501,
        weight: 1.0,
    });
    let input = SchedulingInput {
        students: vec![s],
        teachers: vec![teacher(10, window, vec![], vec![501])],
        rooms: vec![room(100, 1)],
        courses: vec![],
        instruments: vec![subject(501, 1, 2, 30)],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.status, SolveStatus::Optimal);
    assert!(output.assignments.is_empty());
    assert_eq!(output.objective, 0.0);
}

#[test]
fn students_share_a_group_class() {
    let window = bitmap(&[0..4]);
    let mut a = student(1, window.clone());
    a.requested_courses = vec![401];
    let mut b = student(2, window.clone());
    b.requested_courses = vec![401];
    let input = SchedulingInput {
        students: vec![a, b],
        teachers: vec![teacher(10, window, vec![401], vec![])],
        rooms: vec![room(100, 2)],
        courses: vec![subject(401, 2, 1, 60)],
        instruments: vec![],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.assignments.len(), 2);
    assert_eq!(output.assignments[0].start_slot, output.assignments[1].start_slot);
    assert_eq!(output.assignments[0].room_id, output.assignments[1].room_id);
}

#[test]
fn one_teacher_cannot_run_two_classes_at_once() {
    let window = bitmap(&[0..4]);
    let mut a = student(1, window.clone());
    a.requested_courses = vec![401];
    let mut b = student(2, window.clone());
    b.requested_courses = vec![402];
    let input = SchedulingInput {
        students: vec![a, b],
        teachers: vec![teacher(10, window, vec![401, 402], vec![])],
        rooms: vec![room(100, 2), room(101, 2)],
        courses: vec![subject(401, 2, 1, 60), subject(402, 2, 1, 60)],
        instruments: vec![],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.assignments.len(), 1);
}

#[test]
fn subject_capacity_binds_across_teachers_and_rooms() {
    let window = bitmap(&[0..4]);
    let mut a = student(1, window.clone());
    a.requested_courses = vec![401];
    let mut b = student(2, window.clone());
    b.requested_courses = vec![401];
    let input = SchedulingInput {
        students: vec![a, b],
        teachers: vec![
            teacher(10, window.clone(), vec![401], vec![]),
            teacher(11, window, vec![401], vec![]),
        ],
        rooms: vec![room(100, 2), room(101, 2)],
        courses: vec![subject(401, 1, 1, 60)],
        instruments: vec![],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.assignments.len(), 1);
}

#[test]
fn contract_budget_limits_weekly_teaching() {
    let window = bitmap(&[0..20]);
    let mut a = student(1, window.clone());
    a.requested_courses = vec![401];
    let mut b = student(2, window.clone());
    b.requested_courses = vec![402];
    let mut t = teacher(10, window, vec![401, 402], vec![]);
    t.weekly_contract_minutes = 60;
    let input = SchedulingInput {
        students: vec![a, b],
        teachers: vec![t],
        rooms: vec![room(100, 2), room(101, 2)],
        courses: vec![subject(401, 2, 1, 60), subject(402, 2, 1, 60)],
        instruments: vec![],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.assignments.len(), 1);
}

#[test]
fn mandatory_course_conflict_is_solver_infeasible() {
    let window = bitmap(&[0..4]);
    let mut a = student(1, window.clone());
    a.requested_courses = vec![401];
    a.continuation_course = Some(401);
    let mut b = student(2, window.clone());
    b.requested_courses = vec![401];
    b.continuation_course = Some(401);
    let input = SchedulingInput {
        students: vec![a, b],
        teachers: vec![
            teacher(10, window.clone(), vec![401], vec![]),
            teacher(11, window, vec![401], vec![]),
        ],
        rooms: vec![room(100, 2), room(101, 2)],
        courses: vec![subject(401, 1, 1, 60)],
        instruments: vec![],
    };

    let err = solve(&input, &options()).unwrap_err();
    assert!(matches!(err, ScheduleError::Infeasible));
}

#[test]
fn pruned_mandatory_course_fails_fast() {
    let window = bitmap(&[0..4]);
    let mut s = student(7, window.clone());
    s.requested_courses = vec![401];
    s.continuation_course = Some(401);
    let input = SchedulingInput {
        students: vec![s],
        // nobody is qualified to teach the course
        teachers: vec![teacher(10, window, vec![], vec![])],
        rooms: vec![room(100, 2)],
        courses: vec![subject(401, 1, 1, 60)],
        instruments: vec![],
    };

    let err = solve(&input, &options()).unwrap_err();
    match err {
        ScheduleError::StructurallyInfeasible { student_id, .. } => assert_eq!(student_id, 7),
        other => panic!("expected a structural infeasibility, got {other:?}"),
    }
}

#[test]
fn no_start_exists_at_week_or_day_boundaries() {
    // slot 19..=20 crosses Monday into Tuesday, slot 99 runs past the week
    let window = bitmap(&[19..21, 99..100]);
    let mut s = student(1, window.clone());
    s.requested_courses = vec![401];
    let input = SchedulingInput {
        students: vec![s],
        teachers: vec![teacher(10, window, vec![401], vec![])],
        rooms: vec![room(100, 2)],
        courses: vec![subject(401, 1, 1, 30)],
        instruments: vec![],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.status, SolveStatus::Optimal);
    assert!(output.assignments.is_empty());
}

#[test]
fn siblings_attend_on_the_same_days() {
    let window = bitmap(&[0..4, 20..24]);
    let mut a = student(1, window.clone());
    a.requested_courses = vec![401];
    a.continuation_course = Some(401);
    a.siblings = vec![2];
    let mut b = student(2, window.clone());
    b.requested_courses = vec![401];
    b.continuation_course = Some(401);
    b.siblings = vec![1];
    let input = SchedulingInput {
        students: vec![a, b],
        teachers: vec![teacher(10, window, vec![401], vec![])],
        rooms: vec![room(100, 2)],
        courses: vec![subject(401, 2, 1, 60)],
        instruments: vec![],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.assignments.len(), 2);
    assert_eq!(
        day_of(output.assignments[0].start_slot),
        day_of(output.assignments[1].start_slot)
    );
    assert!(
        !output
            .penalties
            .iter()
            .any(|p| p.kind == PenaltyKind::SiblingMismatch)
    );
}

#[test]
fn scheduling_on_a_prior_free_day_is_penalized() {
    let mut antiquity = vec![0u8; NUM_SLOTS];
    antiquity[0] = 1; // Monday class last cycle
    let window = bitmap(&[20..24]); // only Tuesday available now
    let mut s = student(1, window.clone());
    s.first_instrument = Some(InstrumentRequest {
        instrument: 501,
        weight: 1.0,
    });
    s.antiquity = antiquity;
    let input = SchedulingInput {
        students: vec![s],
        teachers: vec![teacher(10, window, vec![], vec![501])],
        rooms: vec![room(100, 1)],
        courses: vec![],
        instruments: vec![subject(501, 1, 1, 60)],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.assignments.len(), 1);
    assert_eq!(output.penalties.len(), 1);
    assert_eq!(output.penalties[0].kind, PenaltyKind::AntiquityDay);
    assert_eq!(output.objective, 8.0);
}

#[test]
fn drifting_far_from_the_prior_start_is_penalized() {
    let mut antiquity = vec![0u8; NUM_SLOTS];
    antiquity[0] = 1; // Monday 16:00 last cycle
    // the prior start itself is still open but too short for the session;
    // the only workable window starts 10 slots later
    let window = bitmap(&[0..2, 10..14]);
    let mut s = student(1, window.clone());
    s.first_instrument = Some(InstrumentRequest {
        instrument: 501,
        weight: 1.0,
    });
    s.antiquity = antiquity;
    let input = SchedulingInput {
        students: vec![s],
        teachers: vec![teacher(10, window, vec![], vec![501])],
        rooms: vec![room(100, 1)],
        courses: vec![],
        instruments: vec![subject(501, 1, 1, 60)],
    };

    let output = solve(&input, &options()).unwrap();
    assert_eq!(output.assignments.len(), 1);
    assert_eq!(output.assignments[0].start_slot, 10);
    assert_eq!(output.penalties.len(), 1);
    assert_eq!(output.penalties[0].kind, PenaltyKind::AntiquityDeviation);
    assert_eq!(output.objective, 9.0);
}

#[test]
fn dangling_references_surface_as_data_issues() {
    let window = bitmap(&[0..4]);
    let mut s = student(1, window.clone());
    s.requested_courses = vec![999];
    let input = SchedulingInput {
        students: vec![s],
        teachers: vec![teacher(10, window, vec![], vec![])],
        rooms: vec![room(100, 1)],
        courses: vec![],
        instruments: vec![],
    };

    let output = solve(&input, &options()).unwrap();
    assert!(output.assignments.is_empty());
    assert_eq!(output.data_issues.len(), 1);
    assert_eq!(output.data_issues[0].entity, "student 1");
}

fn mixed_input() -> SchedulingInput {
    let everywhere = bitmap(&[0..100]);
    let mornings = bitmap(&[0..10, 20..30, 40..50]);
    let mut a = student(1, everywhere.clone());
    a.requested_courses = vec![401];
    a.first_instrument = Some(InstrumentRequest {
        instrument: 501,
        weight: 2.0,
    });
    let mut b = student(2, mornings.clone());
    b.requested_courses = vec![401, 402];
    b.continuation_course = Some(402);
    b.siblings = vec![3];
    let mut c = student(3, mornings);
    c.first_instrument = Some(InstrumentRequest {
        instrument: 501,
        weight: 1.0,
    });
    c.second_instrument = Some(InstrumentRequest {
        instrument: 502,
        weight: 0.5,
    });
    c.siblings = vec![2];
    SchedulingInput {
        students: vec![a, b, c],
        teachers: vec![
            teacher(10, everywhere.clone(), vec![401, 402], vec![501]),
            teacher(11, everywhere, vec![401], vec![501, 502]),
        ],
        rooms: vec![room(100, 4), room(101, 2)],
        courses: vec![subject(401, 4, 1, 60), subject(402, 2, 2, 30)],
        instruments: vec![subject(501, 1, 1, 45), subject(502, 1, 1, 45)],
    }
}

#[test]
fn repeated_runs_reach_the_same_objective() {
    let input = mixed_input();
    let first = solve(&input, &options()).unwrap();
    let second = solve(&input, &options()).unwrap();
    assert_eq!(first.objective, second.objective);
}

#[test]
fn warm_start_reaches_the_cold_start_optimum() {
    let input = mixed_input();
    let cold = solve(&input, &options()).unwrap();
    let mut warm_options = options();
    warm_options.warm_start = true;
    let warm = solve(&input, &warm_options).unwrap();
    assert_eq!(cold.objective, warm.objective);
}

#[test]
fn json_boundary_round_trips() {
    let raw = r#"{
        "students": [{
            "id": 1,
            "availability": [AVAIL],
            "requestedCourses": [401],
            "firstInstrument": {"instrument": 501, "weight": 2.0}
        }],
        "teachers": [{
            "id": 10,
            "availability": [AVAIL],
            "weeklyContractMinutes": 900,
            "courses": [401],
            "instruments": [501]
        }],
        "rooms": [{"id": 100, "capacity": 2, "features": ["piano"]}],
        "courses": [{
            "id": 401, "capacity": 5, "sessionsPerWeek": 1, "minutesPerSession": 60
        }],
        "instruments": [{
            "id": 501, "capacity": 1, "sessionsPerWeek": 1, "minutesPerSession": 45,
            "requiredFeatures": ["piano"]
        }]
    }"#;
    let avail = (0..NUM_SLOTS)
        .map(|t| if t < 20 { "1" } else { "0" })
        .collect::<Vec<_>>()
        .join(",");
    let input: SchedulingInput = serde_json::from_str(&raw.replace("[AVAIL]", &format!("[{avail}]")))
        .unwrap();

    let output = solve(&input, &options()).unwrap();
    // the course and the continuity instrument both fit on Monday
    assert_eq!(output.assignments.len(), 2);
    let encoded = serde_json::to_string(&output).unwrap();
    assert!(encoded.contains("\"startSlot\""));
}
