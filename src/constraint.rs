//! General nonlinear constraints state that a variable equals the value of an expression.
use core::fmt::{Debug, Formatter};

use crate::expression::NlExpr;
use crate::expression_tree::{ExpressionTree, TreeError};
use crate::variable::{FormatWithVars, Variable};

/// A general nonlinear constraint: `result == expression`.
#[derive(Clone, PartialEq)]
pub struct NlConstraint {
    /// The variable constrained to hold the value of the expression
    pub(crate) result: Variable,
    /// The flattened expression
    pub(crate) tree: ExpressionTree,
    /// Optional constraint name
    pub(crate) name: Option<String>,
}

impl NlConstraint {
    /// Constrain `result` to be equal to the value of `tree`
    pub fn new(result: Variable, tree: ExpressionTree) -> Self {
        NlConstraint {
            result,
            tree,
            name: None,
        }
    }

    /// set the constraint name
    pub fn set_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The variable on the left hand side
    pub fn result(&self) -> Variable {
        self.result
    }

    /// The expression on the right hand side
    pub fn tree(&self) -> &ExpressionTree {
        &self.tree
    }

    /// The constraint name, if one was set
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// `result == expr`, flattening the expression.
/// Fails when the flattened expression is not a valid tree.
///
/// ```
/// use genconstr_nl::{nl_eq, sin, Variable};
/// let (y, x1, x2) = (Variable::at(0), Variable::at(1), Variable::at(2));
/// let c = nl_eq(y, sin(2.5 * x1) + x2)?.set_name("nonlinear_constr");
/// assert_eq!(format!("{:?}", c), "v0 = sin(2.5 * v1) + v2");
///
/// assert!(nl_eq(y, sin(x1) + f64::NAN).is_err());
/// # Ok::<_, genconstr_nl::TreeError>(())
/// ```
pub fn nl_eq<E: Into<NlExpr>>(result: Variable, expr: E) -> Result<NlConstraint, TreeError> {
    Ok(NlConstraint::new(result, expr.into().flatten()?))
}

impl FormatWithVars for NlConstraint {
    fn format_with<FUN>(&self, f: &mut Formatter<'_>, mut variable_format: FUN) -> std::fmt::Result
    where
        FUN: FnMut(&mut Formatter<'_>, Variable) -> std::fmt::Result,
    {
        variable_format(f, self.result)?;
        write!(f, " = ")?;
        self.tree.format_with(f, variable_format)
    }
}

impl Debug for NlConstraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.format_debug(f)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// A constraint reference contains the sequence id of the constraint within the model
pub struct ConstraintReference {
    pub(crate) index: usize,
}

impl ConstraintReference {
    /// Reference to the general constraint at the given position.
    /// Backends call this when the solver accepts a constraint.
    pub fn at(index: usize) -> Self {
        ConstraintReference { index }
    }

    /// Position of the constraint among the model's general constraints
    pub fn index(&self) -> usize {
        self.index
    }
}
