//! An in-memory solver backend for tests.
//!
//! It does not optimize anything: the values it reports are the ones the test
//! scripted with [Recorder::with_solution]. What it does do is journal every
//! handle creation and release, so tests can check that resources are freed,
//! and in which order. It can also be told to fail at a given call.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use genconstr_nl::solvers::{check_nl_constraint, AttrName};
use genconstr_nl::{
    ConstraintReference, DoubleAttr, Environment, IntAttr, NlConstraint, SolverError, SolverModel,
    Status, StringAttr, Variable, VariableDefinition,
};

/// Something the backend was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    EnvCreated { log_file: String },
    ModelCreated { name: String },
    VariableAdded { index: usize, name: String },
    ConstraintAdded {
        name: Option<String>,
        result: usize,
        opcode: Vec<i32>,
        data: Vec<f64>,
        parent: Vec<i32>,
    },
    Optimized,
    ModelReleased,
    EnvReleased,
}

/// Calls that can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    OpenEnv,
    NewModel,
    AddVariable,
    AddConstraint,
    Optimize,
}

#[derive(Default)]
struct Script {
    solution: Vec<f64>,
    failure: Option<(Call, SolverError)>,
    status: Option<Status>,
}

/// Scripts the backend and keeps its journal
#[derive(Clone, Default)]
pub struct Recorder {
    journal: Rc<RefCell<Vec<Event>>>,
    script: Rc<RefCell<Script>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values reported for the variables after optimizing, by index
    pub fn with_solution(self, values: &[f64]) -> Self {
        self.script.borrow_mut().solution = values.to_vec();
        self
    }

    /// Make `call` fail with the given error
    pub fn failing_at(self, call: Call, code: i32, message: &str) -> Self {
        self.script.borrow_mut().failure = Some((call, SolverError::new(code, message)));
        self
    }

    /// Optimizing ends with this status instead of [Status::Optimal]
    pub fn ending_with(self, status: Status) -> Self {
        self.script.borrow_mut().status = Some(status);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.journal.borrow().clone()
    }

    /// The release events, in order
    pub fn releases(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::ModelReleased | Event::EnvReleased))
            .collect()
    }

    fn record(&self, event: Event) {
        self.journal.borrow_mut().push(event);
    }

    fn check(&self, call: Call) -> Result<(), SolverError> {
        match &self.script.borrow().failure {
            Some((failing, err)) if *failing == call => Err(err.clone()),
            _ => Ok(()),
        }
    }

    /// Open an environment, the way a solver binding would
    pub fn open(&self, log_file: &str) -> Result<RecordingEnv, SolverError> {
        self.check(Call::OpenEnv)?;
        self.record(Event::EnvCreated {
            log_file: log_file.to_string(),
        });
        Ok(RecordingEnv {
            recorder: self.clone(),
        })
    }
}

pub struct RecordingEnv {
    recorder: Recorder,
}

impl Drop for RecordingEnv {
    fn drop(&mut self) {
        self.recorder.record(Event::EnvReleased);
    }
}

impl Environment for RecordingEnv {
    type Model<'env> = RecordingModel<'env>;

    fn new_model(&self, name: &str) -> Result<RecordingModel<'_>, SolverError> {
        self.recorder.check(Call::NewModel)?;
        self.recorder.record(Event::ModelCreated {
            name: name.to_string(),
        });
        Ok(RecordingModel {
            env: self,
            name: name.to_string(),
            variables: vec![],
            constraints: 0,
            status: Status::Loaded,
        })
    }
}

pub struct RecordingModel<'env> {
    env: &'env RecordingEnv,
    name: String,
    variables: Vec<VariableDefinition>,
    constraints: usize,
    status: Status,
}

impl RecordingModel<'_> {
    fn recorder(&self) -> &Recorder {
        &self.env.recorder
    }

    fn definition(&self, var: Variable) -> Result<&VariableDefinition, SolverError> {
        self.variables.get(var.index()).ok_or_else(|| {
            SolverError::new(
                SolverError::INDEX_OUT_OF_RANGE,
                format!("Index out of range for attribute '{}'", var.index()),
            )
        })
    }

    fn solution_value(&self, var: Variable) -> Result<f64, SolverError> {
        if !self.status.has_solution() {
            return Err(SolverError::new(
                SolverError::DATA_NOT_AVAILABLE,
                "Unable to retrieve attribute 'X'",
            ));
        }
        self.definition(var)?;
        Ok(self
            .recorder()
            .script
            .borrow()
            .solution
            .get(var.index())
            .copied()
            .unwrap_or(0.))
    }
}

impl Drop for RecordingModel<'_> {
    fn drop(&mut self) {
        self.recorder().record(Event::ModelReleased);
    }
}

impl SolverModel for RecordingModel<'_> {
    fn add_variable(&mut self, definition: VariableDefinition) -> Result<Variable, SolverError> {
        self.recorder().check(Call::AddVariable)?;
        let var = Variable::at(self.variables.len());
        self.recorder().record(Event::VariableAdded {
            index: var.index(),
            name: definition.get_name().to_string(),
        });
        self.variables.push(definition);
        Ok(var)
    }

    fn add_nl_constraint(
        &mut self,
        constraint: NlConstraint,
    ) -> Result<ConstraintReference, SolverError> {
        self.recorder().check(Call::AddConstraint)?;
        check_nl_constraint(&constraint, self.variables.len())?;
        let tree = constraint.tree();
        self.recorder().record(Event::ConstraintAdded {
            name: constraint.name().map(str::to_string),
            result: constraint.result().index(),
            opcode: tree.opcode_codes(),
            data: tree.data().to_vec(),
            parent: tree.parents().to_vec(),
        });
        self.constraints += 1;
        Ok(ConstraintReference::at(self.constraints - 1))
    }

    fn optimize(&mut self) -> Result<(), SolverError> {
        self.recorder().check(Call::Optimize)?;
        self.recorder().record(Event::Optimized);
        let status = self
            .recorder()
            .script
            .borrow()
            .status
            .unwrap_or(Status::Optimal);
        self.status = status;
        Ok(())
    }

    fn get_int(&self, attr: IntAttr) -> Result<i32, SolverError> {
        Ok(match attr {
            IntAttr::Status => self.status.code(),
            IntAttr::NumVars => self.variables.len() as i32,
            IntAttr::NumGenConstrs => self.constraints as i32,
            IntAttr::SolCount => self.status.has_solution() as i32,
        })
    }

    fn get_dbl(&self, attr: DoubleAttr) -> Result<f64, SolverError> {
        match attr {
            DoubleAttr::ObjVal => (0..self.variables.len())
                .map(|i| -> Result<f64, SolverError> {
                    let var = Variable::at(i);
                    Ok(self.variables[i].objective_coefficient() * self.solution_value(var)?)
                })
                .sum(),
            DoubleAttr::Runtime => Ok(0.),
            other => Err(SolverError::new(
                SolverError::UNKNOWN_ATTRIBUTE,
                format!("Unknown model attribute '{}'", other.name()),
            )),
        }
    }

    fn get_var_dbl(&self, attr: DoubleAttr, var: Variable) -> Result<f64, SolverError> {
        let def = self.definition(var)?;
        match attr {
            DoubleAttr::LB => Ok(def.lower_bound()),
            DoubleAttr::UB => Ok(def.upper_bound()),
            DoubleAttr::Obj => Ok(def.objective_coefficient()),
            DoubleAttr::X => self.solution_value(var),
            other => Err(SolverError::new(
                SolverError::UNKNOWN_ATTRIBUTE,
                format!("Unknown variable attribute '{}'", other.name()),
            )),
        }
    }

    fn get_var_str(&self, attr: StringAttr, var: Variable) -> Result<String, SolverError> {
        match attr {
            StringAttr::VarName => Ok(self.definition(var)?.get_name().to_string()),
            StringAttr::ModelName => Ok(self.name.clone()),
        }
    }

    fn name() -> &'static str {
        "Recording"
    }
}
