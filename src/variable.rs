//! A [Variable] is a decision variable owned by a solver model.
//! The solver assigns each variable an index when it is added, and that index is
//! what the leaves of an [ExpressionTree](crate::ExpressionTree) refer to.
//!
//! Each variable is added from a [VariableDefinition] that sets its bounds,
//! objective coefficient, type and name.
use std::collections::Bound;
use std::fmt::Formatter;
use std::ops::RangeBounds;

/// A variable in a model, as returned by
/// [SolverModel::add_variable](crate::SolverModel::add_variable).
///
/// ## Warning
/// `Eq` is implemented on this type, but
/// `v1 == v2` is true only if the two variables have the same index,
/// so comparing variables coming from two different models is meaningless.
///
/// ```
/// # use genconstr_nl::Variable;
/// let v1 = Variable::at(0);
/// let v1_copy = v1;
/// assert_eq!(v1, v1_copy);
/// assert_ne!(v1, Variable::at(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    /// A variable is nothing more than its position in the solver's column list.
    /// That's why it can be `Copy`.
    /// All the actual information about the variable (name, bounds, ...) lives in the model.
    index: usize,
}

impl Variable {
    /// The variable at the given position of a model.
    /// Backends call this when the solver hands out a new column.
    pub fn at(index: usize) -> Self {
        Self { index }
    }

    /// The index the solver assigned to this variable
    pub fn index(&self) -> usize {
        self.index
    }
}

/// An element that can be displayed if you give a variable display function
pub trait FormatWithVars {
    /// Write the element to the formatter. See [std::fmt::Display]
    fn format_with<FUN>(&self, f: &mut Formatter<'_>, variable_format: FUN) -> std::fmt::Result
    where
        FUN: FnMut(&mut Formatter<'_>, Variable) -> std::fmt::Result;

    /// Write the elements, naming the variables v0, v1, ... vn
    fn format_debug(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.format_with(f, |f, var| write!(f, "v{}", var.index()))
    }
}

/// The kind of values a variable may take in the solution.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    /// Any real value within the bounds
    #[default]
    Continuous,
    /// 0 or 1
    Binary,
    /// Any integer value within the bounds
    Integer,
    /// 0, or any real value within the bounds
    SemiContinuous,
    /// 0, or any integer value within the bounds
    SemiInteger,
}

impl VarType {
    /// The one-character code used by the solver's C interface
    pub fn as_char(self) -> u8 {
        match self {
            VarType::Continuous => b'C',
            VarType::Binary => b'B',
            VarType::Integer => b'I',
            VarType::SemiContinuous => b'S',
            VarType::SemiInteger => b'N',
        }
    }
}

/// Defines the properties of a variable, such as its lower and upper bounds.
#[derive(Clone, PartialEq, Debug)]
pub struct VariableDefinition {
    pub(crate) min: f64,
    pub(crate) max: f64,
    pub(crate) obj: f64,
    pub(crate) var_type: VarType,
    pub(crate) name: String,
}

impl VariableDefinition {
    /// Creates an unbounded continuous variable, absent from the objective
    pub fn new() -> Self {
        VariableDefinition {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            obj: 0.,
            var_type: VarType::Continuous,
            name: String::new(),
        }
    }

    /// Set the lower and/or higher bounds of the variable
    ///
    /// ## Examples
    /// ```
    /// # use genconstr_nl::variable;
    /// assert_eq!(
    ///     variable().bounds(-1..=1),
    ///     variable().min(-1).max(1)
    /// );
    ///
    /// assert_eq!(
    ///     variable().bounds(1..),
    ///     variable().min(1)
    /// );
    ///
    /// # assert_eq!(variable().bounds::<f64, _>(..), variable());
    /// ```
    pub fn bounds<N: Into<f64> + Copy, B: RangeBounds<N>>(self, bounds: B) -> Self {
        self.min(match bounds.start_bound() {
            Bound::Included(&x) => x.into(),
            Bound::Excluded(&x) => x.into(),
            Bound::Unbounded => f64::NEG_INFINITY,
        })
        .max(match bounds.end_bound() {
            Bound::Included(&x) => x.into(),
            Bound::Excluded(&x) => x.into(),
            Bound::Unbounded => f64::INFINITY,
        })
    }

    /// Set the lower bound of the variable
    pub fn min<N: Into<f64>>(mut self, min: N) -> Self {
        self.min = min.into();
        self
    }

    /// Set the higher bound of the variable
    pub fn max<N: Into<f64>>(mut self, max: N) -> Self {
        self.max = max.into();
        self
    }

    /// Set both the lower and higher bounds of the variable.
    /// Equal bounds are allowed and fix the variable.
    pub fn clamp<N1: Into<f64>, N2: Into<f64>>(self, min: N1, max: N2) -> Self {
        self.min(min).max(max)
    }

    /// Set the coefficient of this variable in the (linear) objective
    pub fn obj<N: Into<f64>>(mut self, coefficient: N) -> Self {
        self.obj = coefficient.into();
        self
    }

    /// Set the type of the variable
    pub fn var_type(mut self, var_type: VarType) -> Self {
        self.var_type = var_type;
        self
    }

    /// Shorthand for `.var_type(VarType::Integer)`
    pub fn integer(self) -> Self {
        self.var_type(VarType::Integer)
    }

    /// Set the name of the variable, as reported by the solver
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// The lower bound
    pub fn lower_bound(&self) -> f64 {
        self.min
    }

    /// The upper bound
    pub fn upper_bound(&self) -> f64 {
        self.max
    }

    /// The objective coefficient
    pub fn objective_coefficient(&self) -> f64 {
        self.obj
    }

    /// The variable type
    pub fn get_type(&self) -> VarType {
        self.var_type
    }

    /// The name, empty when the variable is anonymous
    pub fn get_name(&self) -> &str {
        &self.name
    }
}

/// Creates an unbounded continuous variable
impl Default for VariableDefinition {
    fn default() -> Self {
        VariableDefinition::new()
    }
}

/// Returns an anonymous unbounded continuous variable definition
pub fn variable() -> VariableDefinition {
    VariableDefinition::default()
}
