//! Build nonlinear expressions as flattened trees and hand them to an external
//! solver as general nonlinear constraints.
//!
//! ```rust
//! use genconstr_nl::{nl_eq, sin, Variable};
//!
//! // Variables come from a solver model; here they are made up for illustration.
//! let (y, x1, x2) = (Variable::at(0), Variable::at(1), Variable::at(2));
//! let constraint = nl_eq(y, sin(2.5 * x1) + x2)?.set_name("nonlinear_constr");
//!
//! let tree = constraint.tree();
//! assert_eq!(tree.opcode_codes(), vec![2, 9, 4, 0, 1, 1]);
//! assert_eq!(tree.data(), &[-1., -1., -1., 2.5, 1., 2.]);
//! assert_eq!(tree.parents(), &[-1, 0, 1, 2, 2, 0]);
//! # Ok::<_, genconstr_nl::TreeError>(())
//! ```
//!
//! With the `gurobi` feature, [solvers::gurobi] solves such models, and
//! [driver] runs the complete sample.

pub use constraint::{nl_eq, ConstraintReference, NlConstraint};
pub use expression::{cos, exp, log, log10, log2, logistic, sin, sqrt, square, tan, NlExpr};
pub use expression_tree::{ExpressionTree, Opcode, TreeError};
pub use solvers::{
    DoubleAttr, Environment, IntAttr, SolverError, SolverModel, Status, StringAttr,
};
pub use variable::{variable, VarType, Variable, VariableDefinition};

pub mod constraint;
pub mod driver;
mod expression;
pub mod expression_tree;
pub mod solvers;
pub mod variable;
