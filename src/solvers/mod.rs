//! The interface between models and the external solver.
//!
//! An [Environment] hands out models, a [SolverModel] accepts variables and
//! general nonlinear constraints, optimizes, and answers attribute queries.
//! Solver handles release themselves when dropped; since a model borrows its
//! environment, the model is always released before the environment.

#[cfg(feature = "gurobi")]
pub mod gurobi;

use std::fmt::{Display, Formatter};

use crate::constraint::{ConstraintReference, NlConstraint};
use crate::expression_tree::TreeError;
use crate::variable::{Variable, VariableDefinition};

/// Represents an error reported by the solver, or detected before calling it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverError {
    /// The solver's numeric error code
    pub code: i32,
    /// A human-readable description
    pub message: String,
}

impl SolverError {
    /// Exhausted available memory
    pub const OUT_OF_MEMORY: i32 = 10001;
    /// NULL argument value
    pub const NULL_ARGUMENT: i32 = 10002;
    /// Invalid argument value
    pub const INVALID_ARGUMENT: i32 = 10003;
    /// Unknown attribute name
    pub const UNKNOWN_ATTRIBUTE: i32 = 10004;
    /// Requested data not available, typically a solution attribute without a solution
    pub const DATA_NOT_AVAILABLE: i32 = 10005;
    /// Variable or constraint index out of range
    pub const INDEX_OUT_OF_RANGE: i32 = 10006;
    /// Unknown parameter name
    pub const UNKNOWN_PARAMETER: i32 = 10007;
    /// Parameter value outside of valid range
    pub const VALUE_OUT_OF_RANGE: i32 = 10008;
    /// No license found
    pub const NO_LICENSE: i32 = 10009;
    /// Exceeded licensed model size limit
    pub const SIZE_LIMIT_EXCEEDED: i32 = 10010;
    /// Numeric error encountered
    pub const NUMERIC: i32 = 10014;
    /// Requested operation is not supported
    pub const NOT_SUPPORTED: i32 = 10024;
    /// Variable or constraint not in model
    pub const NOT_IN_MODEL: i32 = 20001;
    /// Failed to create the requested model
    pub const FAILED_TO_CREATE_MODEL: i32 = 20002;
    /// Internal solver error
    pub const INTERNAL: i32 = 20003;

    /// An error with the given code and message
    pub fn new<S: Into<String>>(code: i32, message: S) -> Self {
        SolverError {
            code,
            message: message.into(),
        }
    }
}

impl Display for SolverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error code: {}. {}", self.code, self.message)
    }
}

impl std::error::Error for SolverError {}

impl From<TreeError> for SolverError {
    fn from(err: TreeError) -> Self {
        SolverError::new(SolverError::INVALID_ARGUMENT, err.to_string())
    }
}

/// Optimization status of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Model loaded, but no solution information available
    Loaded,
    /// Solved to optimality, subject to tolerances
    Optimal,
    /// Model is infeasible
    Infeasible,
    /// Model is either infeasible or unbounded
    InfOrUnbd,
    /// Model is unbounded
    Unbounded,
    /// Objective is worse than the specified cutoff
    Cutoff,
    /// Stopped at the iteration limit
    IterationLimit,
    /// Stopped at the node limit
    NodeLimit,
    /// Stopped at the time limit
    TimeLimit,
    /// Stopped at the solution limit
    SolutionLimit,
    /// Interrupted by the user
    Interrupted,
    /// Stopped because of numerical issues
    Numeric,
    /// Stopped with a sub-optimal solution
    Suboptimal,
    /// Optimization in progress
    InProgress,
    /// Reached the user objective limit
    UserObjLimit,
    /// Stopped at the work limit
    WorkLimit,
    /// Stopped at the soft memory limit
    MemLimit,
}

impl Status {
    const ALL: [Status; 17] = [
        Status::Loaded,
        Status::Optimal,
        Status::Infeasible,
        Status::InfOrUnbd,
        Status::Unbounded,
        Status::Cutoff,
        Status::IterationLimit,
        Status::NodeLimit,
        Status::TimeLimit,
        Status::SolutionLimit,
        Status::Interrupted,
        Status::Numeric,
        Status::Suboptimal,
        Status::InProgress,
        Status::UserObjLimit,
        Status::WorkLimit,
        Status::MemLimit,
    ];

    /// The status with the given solver code (1 to 17)
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|c| c.checked_sub(1))
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// The solver code of this status
    pub fn code(self) -> i32 {
        Self::ALL
            .iter()
            .position(|&s| s == self)
            .map_or(0, |i| i as i32 + 1)
    }

    /// Whether the solver stopped with a solution that can be queried
    pub fn has_solution(self) -> bool {
        matches!(
            self,
            Status::Optimal | Status::Suboptimal | Status::SolutionLimit | Status::UserObjLimit
        )
    }
}

/// Integer attributes of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntAttr {
    /// Optimization status code, see [Status]
    Status,
    /// Number of variables
    NumVars,
    /// Number of general constraints
    NumGenConstrs,
    /// Number of stored solutions
    SolCount,
}

/// Floating point attributes, of a model or of its variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoubleAttr {
    /// Lower bound of a variable
    LB,
    /// Upper bound of a variable
    UB,
    /// Objective coefficient of a variable
    Obj,
    /// Value of a variable in the current solution
    X,
    /// Objective value of the current solution
    ObjVal,
    /// Wall clock time of the last optimization, in seconds
    Runtime,
}

/// String attributes, of a model or of its variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringAttr {
    /// Name of a variable
    VarName,
    /// Name of the model
    ModelName,
}

/// Attribute identifiers map to the solver's attribute names
pub trait AttrName {
    /// The attribute name, as the solver knows it
    fn name(&self) -> &'static str;
}

impl AttrName for IntAttr {
    fn name(&self) -> &'static str {
        match self {
            IntAttr::Status => "Status",
            IntAttr::NumVars => "NumVars",
            IntAttr::NumGenConstrs => "NumGenConstrs",
            IntAttr::SolCount => "SolCount",
        }
    }
}

impl AttrName for DoubleAttr {
    fn name(&self) -> &'static str {
        match self {
            DoubleAttr::LB => "LB",
            DoubleAttr::UB => "UB",
            DoubleAttr::Obj => "Obj",
            DoubleAttr::X => "X",
            DoubleAttr::ObjVal => "ObjVal",
            DoubleAttr::Runtime => "Runtime",
        }
    }
}

impl AttrName for StringAttr {
    fn name(&self) -> &'static str {
        match self {
            StringAttr::VarName => "VarName",
            StringAttr::ModelName => "ModelName",
        }
    }
}

/// A solver environment, from which models are created.
pub trait Environment {
    /// The models this environment creates. They cannot outlive it.
    type Model<'env>: SolverModel
    where
        Self: 'env;

    /// Create an empty model with the given name
    fn new_model(&self, name: &str) -> Result<Self::Model<'_>, SolverError>;
}

/// A solver's own representation of a model, to which variables and constraints can be added.
pub trait SolverModel {
    /// Add a variable. The solver assigns its index.
    fn add_variable(&mut self, definition: VariableDefinition) -> Result<Variable, SolverError>;

    /// Add a general nonlinear constraint. Its tree must be complete.
    fn add_nl_constraint(
        &mut self,
        constraint: NlConstraint,
    ) -> Result<ConstraintReference, SolverError>;

    /// Run the solver. Blocks until it returns.
    fn optimize(&mut self) -> Result<(), SolverError>;

    /// Read an integer model attribute
    fn get_int(&self, attr: IntAttr) -> Result<i32, SolverError>;

    /// Read a floating point model attribute
    fn get_dbl(&self, attr: DoubleAttr) -> Result<f64, SolverError>;

    /// Read a floating point variable attribute
    fn get_var_dbl(&self, attr: DoubleAttr, var: Variable) -> Result<f64, SolverError>;

    /// Read a string variable attribute
    fn get_var_str(&self, attr: StringAttr, var: Variable) -> Result<String, SolverError>;

    /// The optimization status
    fn status(&self) -> Result<Status, SolverError> {
        let code = self.get_int(IntAttr::Status)?;
        Status::from_code(code).ok_or_else(|| {
            SolverError::new(
                SolverError::INTERNAL,
                format!("unknown optimization status {}", code),
            )
        })
    }

    /// The value of a variable in the current solution
    fn value(&self, var: Variable) -> Result<f64, SolverError> {
        self.get_var_dbl(DoubleAttr::X, var)
    }

    /// The name of a variable
    fn variable_name(&self, var: Variable) -> Result<String, SolverError> {
        self.get_var_str(StringAttr::VarName, var)
    }

    /// The objective value of the current solution
    fn objective_value(&self) -> Result<f64, SolverError> {
        self.get_dbl(DoubleAttr::ObjVal)
    }

    /// The name of the solver backend
    fn name() -> &'static str
    where
        Self: Sized;
}

/// Checks a constraint before it is handed to a solver holding `num_vars` variables:
/// its tree must be complete, and every variable it mentions must exist.
pub fn check_nl_constraint(constraint: &NlConstraint, num_vars: usize) -> Result<(), SolverError> {
    if let Some(node) = constraint.tree.unbound_nodes().next() {
        return Err(SolverError::new(
            SolverError::INVALID_ARGUMENT,
            format!("variable node {} of the expression tree is not bound", node),
        ));
    }
    let out_of_range = std::iter::once(constraint.result)
        .chain(constraint.tree.variables())
        .find(|var| var.index() >= num_vars);
    match out_of_range {
        Some(var) => Err(SolverError::new(
            SolverError::INDEX_OUT_OF_RANGE,
            format!(
                "variable index {} out of range (model has {} variables)",
                var.index(),
                num_vars
            ),
        )),
        None => Ok(()),
    }
}
