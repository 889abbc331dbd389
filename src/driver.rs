//! Builds and solves the sample model
//!
//! ```text
//! minimize    x
//! subject to  x = sin(2.5 * x1) + x2
//!             x free
//!             -1 <= x1, x2 <= 1
//! ```
//!
//! The expression tree is written out by hand with placeholder leaves, then
//! patched with the indices the solver assigns to `x1` and `x2`.
use std::fmt::{Display, Formatter};
use std::io::Write;

use tracing::{debug, info};

use crate::constraint::NlConstraint;
use crate::expression_tree::{ExpressionTree, Opcode, NO_PARENT, UNBOUND};
use crate::solvers::{Environment, SolverError, SolverModel};
use crate::variable::{variable, Variable};

/// File the solver environment logs to
pub const LOG_FILE: &str = "genconstrnl.log";

/// Name of the model
pub const MODEL_NAME: &str = "genconstrnl";

/// Name of the nonlinear constraint
pub const CONSTRAINT_NAME: &str = "nonlinear_constr";

/// Positions of the `x1` and `x2` leaves in [sin_plus_tree]
pub const X1_NODE: usize = 4;
/// See [X1_NODE]
pub const X2_NODE: usize = 5;

/// `sin(2.5 * ?) + ?`, the variable leaves at [X1_NODE] and [X2_NODE] unbound.
pub fn sin_plus_tree() -> Result<ExpressionTree, SolverError> {
    let opcode = vec![
        Opcode::Plus,
        Opcode::Sin,
        Opcode::Multiply,
        Opcode::Constant,
        Opcode::Var,
        Opcode::Var,
    ];
    let data = vec![UNBOUND, UNBOUND, UNBOUND, 2.5, UNBOUND, UNBOUND];
    let parent = vec![NO_PARENT, 0, 1, 2, 2, 0];
    Ok(ExpressionTree::new(opcode, data, parent)?)
}

/// What the driver reads back after optimizing
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Name and solved value of each variable, in creation order
    pub values: Vec<(String, f64)>,
    /// Objective value of the solution
    pub objective: f64,
}

impl Report {
    /// The solved value of the variable with the given name
    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, value)| value)
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (name, value) in &self.values {
            writeln!(f, "{} {:?}", name, value)?;
        }
        writeln!(f, "Obj: {:?}", self.objective)
    }
}

/// Build the sample model in a new model of `env`, optimize it, and read the solution.
/// The model is released before returning, whatever the outcome.
pub fn build_and_solve<E: Environment>(env: &E) -> Result<Report, SolverError> {
    let mut model = env.new_model(MODEL_NAME)?;

    // only the free variable is in the objective
    let x = model.add_variable(variable().obj(1.0).name("x"))?;
    let x1 = model.add_variable(variable().clamp(-1.0, 1.0).name("x1"))?;
    let x2 = model.add_variable(variable().clamp(-1.0, 1.0).name("x2"))?;

    let tree = sin_plus_tree()?.bind(X1_NODE, x1)?.bind(X2_NODE, x2)?;
    let constraint = NlConstraint::new(x, tree).set_name(CONSTRAINT_NAME);
    debug!(
        component = "driver",
        operation = "add_genconstr_nl",
        constraint = ?constraint,
        "Adding nonlinear constraint"
    );
    model.add_nl_constraint(constraint)?;

    model.optimize()?;

    let values = [x, x1, x2]
        .iter()
        .map(|&var| read_value(&model, var))
        .collect::<Result<Vec<_>, _>>()?;
    let objective = model.objective_value()?;
    info!(component = "driver", objective, "Read solution");
    Ok(Report { values, objective })
}

fn read_value<M: SolverModel>(model: &M, var: Variable) -> Result<(String, f64), SolverError> {
    Ok((model.variable_name(var)?, model.value(var)?))
}

/// Open an environment with `open`, then [build_and_solve] in it.
/// The environment is released after the model, on every path.
pub fn run<E, F>(open: F) -> Result<Report, SolverError>
where
    E: Environment,
    F: FnOnce(&str) -> Result<E, SolverError>,
{
    let env = open(LOG_FILE)?;
    build_and_solve(&env)
}

/// [run], printing the report to `out` on success and the error on failure.
/// Returns whether the run succeeded.
pub fn run_and_report<E, F, W>(open: F, out: &mut W) -> std::io::Result<bool>
where
    E: Environment,
    F: FnOnce(&str) -> Result<E, SolverError>,
    W: Write,
{
    match run(open) {
        Ok(report) => {
            write!(out, "{}", report)?;
            Ok(true)
        }
        Err(err) => {
            writeln!(out, "{}", err)?;
            Ok(false)
        }
    }
}
