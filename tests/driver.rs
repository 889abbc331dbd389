//! The sample driver, run against the recording backend.
//! The solution values are scripted: x1 = -π/5 puts 2.5 * x1 at -π/2, where sin is -1.
mod support;

use std::f64::consts::PI;

use float_eq::assert_float_eq;
use genconstr_nl::driver::{self, Report};
use genconstr_nl::{variable, Environment, SolverError, SolverModel, Status};
use support::{Call, Event, Recorder};

fn solved() -> Recorder {
    Recorder::new().with_solution(&[-2.0, -PI / 5., -1.0])
}

#[test]
fn solves_sample_model() {
    let recorder = solved();
    let report = driver::run(|log| recorder.open(log)).expect("solve");

    let names: Vec<&str> = report.values.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["x", "x1", "x2"]);
    assert_float_eq!(report.objective, -2.0, abs <= 1e-9);
    assert_float_eq!(report.value_of("x2").unwrap(), -1.0, abs <= 1e-9);

    let (y, x1, x2) = (
        report.value_of("x").unwrap(),
        report.value_of("x1").unwrap(),
        report.value_of("x2").unwrap(),
    );
    assert!((y - ((2.5 * x1).sin() + x2)).abs() < 1e-6);
    assert_float_eq!(report.objective, y, abs <= 1e-9);
}

#[test]
fn prints_values_and_objective() {
    let recorder = Recorder::new().with_solution(&[-2.0, -0.5, -1.0]);
    let mut out = Vec::new();
    let ok = driver::run_and_report(|log| recorder.open(log), &mut out).unwrap();
    assert!(ok);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "x -2.0\nx1 -0.5\nx2 -1.0\nObj: -2.0\n"
    );
}

#[test]
fn sends_patched_tree_to_solver() {
    let recorder = solved();
    driver::run(|log| recorder.open(log)).expect("solve");
    let events = recorder.events();

    assert_eq!(
        events[0],
        Event::EnvCreated {
            log_file: "genconstrnl.log".to_string()
        }
    );
    assert_eq!(
        events[1],
        Event::ModelCreated {
            name: "genconstrnl".to_string()
        }
    );
    let constraint = events
        .iter()
        .find(|e| matches!(e, Event::ConstraintAdded { .. }))
        .expect("a constraint was added");
    assert_eq!(
        constraint,
        &Event::ConstraintAdded {
            name: Some("nonlinear_constr".to_string()),
            result: 0,
            opcode: vec![2, 9, 4, 0, 1, 1],
            data: vec![-1., -1., -1., 2.5, 1., 2.],
            parent: vec![-1, 0, 1, 2, 2, 0],
        }
    );
}

#[test]
fn releases_model_then_environment() {
    let recorder = solved();
    driver::run(|log| recorder.open(log)).expect("solve");
    let events = recorder.events();
    assert_eq!(
        &events[events.len() - 3..],
        &[Event::Optimized, Event::ModelReleased, Event::EnvReleased]
    );
}

#[test]
fn optimize_failure_is_reported_and_everything_released() {
    let recorder = solved().failing_at(Call::Optimize, 10009, "No Gurobi license found");
    let mut out = Vec::new();
    let ok = driver::run_and_report(|log| recorder.open(log), &mut out).unwrap();

    assert!(!ok);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "Error code: 10009. No Gurobi license found\n"
    );
    assert!(!recorder.events().contains(&Event::Optimized));
    assert_eq!(
        recorder.releases(),
        vec![Event::ModelReleased, Event::EnvReleased]
    );
}

#[test]
fn failure_while_building_releases_everything() {
    for call in [Call::NewModel, Call::AddVariable, Call::AddConstraint] {
        let recorder = solved().failing_at(call, SolverError::OUT_OF_MEMORY, "Out of memory");
        let err = driver::run(|log| recorder.open(log)).unwrap_err();
        assert_eq!(err.code, SolverError::OUT_OF_MEMORY);

        let expected = if call == Call::NewModel {
            vec![Event::EnvReleased]
        } else {
            vec![Event::ModelReleased, Event::EnvReleased]
        };
        assert_eq!(recorder.releases(), expected, "failing at {:?}", call);
    }
}

#[test]
fn environment_failure_has_nothing_to_release() {
    let recorder = Recorder::new().failing_at(Call::OpenEnv, 10009, "No Gurobi license found");
    let err = driver::run(|log| recorder.open(log)).unwrap_err();
    assert_eq!(err.code, 10009);
    assert!(!err.message.is_empty());
    assert!(recorder.events().is_empty());
}

#[test]
fn no_solution_means_no_report() {
    let recorder = solved().ending_with(Status::Infeasible);
    let err = driver::run(|log| recorder.open(log)).unwrap_err();
    assert_eq!(err.code, SolverError::DATA_NOT_AVAILABLE);
    assert!(!err.message.is_empty());
    assert_eq!(
        recorder.releases(),
        vec![Event::ModelReleased, Event::EnvReleased]
    );
}

#[test]
fn attribute_reads_are_idempotent() {
    let recorder = solved();
    let env = recorder.open("test.log").unwrap();
    let mut model = env.new_model("idempotence").unwrap();
    let y = model.add_variable(variable().obj(1).name("y")).unwrap();
    model.optimize().unwrap();

    assert_eq!(model.value(y).unwrap(), model.value(y).unwrap());
    assert_eq!(
        model.objective_value().unwrap(),
        model.objective_value().unwrap()
    );
    assert_eq!(model.variable_name(y).unwrap(), "y");
    assert_eq!(model.status().unwrap(), Status::Optimal);
}

#[test]
fn degenerate_bounds_are_accepted() {
    let recorder = Recorder::new();
    let env = recorder.open("test.log").unwrap();
    let mut model = env.new_model("fixed").unwrap();
    let z = model
        .add_variable(variable().clamp(0.25, 0.25).name("z"))
        .expect("equal bounds are valid");
    assert_eq!(
        model.get_var_dbl(genconstr_nl::DoubleAttr::LB, z).unwrap(),
        model.get_var_dbl(genconstr_nl::DoubleAttr::UB, z).unwrap()
    );
}

#[test]
fn report_round_trips_through_display() {
    let report = Report {
        values: vec![("x1".to_string(), -0.6566)],
        objective: -2.0,
    };
    assert_eq!(report.to_string(), "x1 -0.6566\nObj: -2.0\n");
}
