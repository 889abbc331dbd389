//! Build nonlinear expressions with ordinary Rust operators and functions,
//! then [flatten](NlExpr::flatten) them into the array form the solver expects.
//!
//! ```
//! use genconstr_nl::{sin, NlExpr, Variable};
//!
//! let (x1, x2) = (Variable::at(1), Variable::at(2));
//! let expr: NlExpr = sin(2.5 * x1) + x2;
//! let tree = expr.flatten()?;
//! assert_eq!(tree.opcode_codes(), vec![2, 9, 4, 0, 1, 1]);
//! assert_eq!(tree.data(), &[-1., -1., -1., 2.5, 1., 2.]);
//! assert_eq!(tree.parents(), &[-1, 0, 1, 2, 2, 0]);
//! # Ok::<_, genconstr_nl::TreeError>(())
//! ```
use std::fmt::{Debug, Display, Formatter};
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::expression_tree::{ExpressionTree, Opcode, TreeError, NO_PARENT, UNBOUND};
use crate::variable::{FormatWithVars, Variable};

/// A nonlinear expression in nested form.
#[derive(Clone, PartialEq)]
pub enum NlExpr {
    /// A constant value
    Constant(f64),
    /// A reference to a variable of the model
    Variable(Variable),
    /// An operation applied to sub-expressions
    Node {
        /// The operation
        opcode: Opcode,
        /// Its operands, in order
        children: Vec<NlExpr>,
    },
}

impl NlExpr {
    /// A constant expression
    pub fn constant<N: Into<f64>>(value: N) -> Self {
        NlExpr::Constant(value.into())
    }

    fn unary(opcode: Opcode, operand: NlExpr) -> Self {
        NlExpr::Node {
            opcode,
            children: vec![operand],
        }
    }

    fn binary(opcode: Opcode, lhs: NlExpr, rhs: NlExpr) -> Self {
        NlExpr::Node {
            opcode,
            children: vec![lhs, rhs],
        }
    }

    /// Extend an n-ary sum or product with one more operand,
    /// instead of nesting a new node on top of it.
    fn variadic(opcode: Opcode, lhs: NlExpr, rhs: NlExpr) -> Self {
        match lhs {
            NlExpr::Node {
                opcode: op,
                mut children,
            } if op == opcode => {
                children.push(rhs);
                NlExpr::Node { opcode, children }
            }
            lhs => NlExpr::binary(opcode, lhs, rhs),
        }
    }

    /// `self` raised to the power `exponent`
    pub fn pow<E: Into<NlExpr>>(self, exponent: E) -> Self {
        NlExpr::binary(Opcode::Pow, self, exponent.into())
    }

    /// The number of nodes of the flattened tree
    pub fn node_count(&self) -> usize {
        match self {
            NlExpr::Node { children, .. } => {
                1 + children.iter().map(NlExpr::node_count).sum::<usize>()
            }
            _ => 1,
        }
    }

    /// Lay the expression out in pre-order as an [ExpressionTree].
    /// Every variable leaf is bound, so a tree that passes validation is complete.
    ///
    /// Fails like [ExpressionTree::new] on non-finite constants, nodes with
    /// the wrong number of children, or variable indices the solver cannot address.
    pub fn flatten(&self) -> Result<ExpressionTree, TreeError> {
        let capacity = self.node_count();
        let mut opcode = Vec::with_capacity(capacity);
        let mut data = Vec::with_capacity(capacity);
        let mut parent = Vec::with_capacity(capacity);
        let mut pending = vec![(self, NO_PARENT)];
        while let Some((expr, up)) = pending.pop() {
            let position = opcode.len() as i32;
            parent.push(up);
            match expr {
                NlExpr::Constant(value) => {
                    opcode.push(Opcode::Constant);
                    data.push(*value);
                }
                NlExpr::Variable(var) => {
                    opcode.push(Opcode::Var);
                    data.push(var.index() as f64);
                }
                NlExpr::Node {
                    opcode: op,
                    children,
                } => {
                    opcode.push(*op);
                    data.push(UNBOUND);
                    pending.extend(children.iter().rev().map(|child| (child, position)));
                }
            }
        }
        ExpressionTree::new(opcode, data, parent)
    }
}

macro_rules! nl_functions {
    ($($(#[$doc:meta])* $name:ident => $opcode:ident;)*) => {$(
        $(#[$doc])*
        pub fn $name<E: Into<NlExpr>>(operand: E) -> NlExpr {
            NlExpr::unary(Opcode::$opcode, operand.into())
        }
    )*};
}

nl_functions! {
    /// sin(x)
    sin => Sin;
    /// cos(x)
    cos => Cos;
    /// tan(x)
    tan => Tan;
    /// eˣ
    exp => Exp;
    /// Natural logarithm
    log => Log;
    /// Base 2 logarithm
    log2 => Log2;
    /// Base 10 logarithm
    log10 => Log10;
    /// 1 / (1 + e⁻ˣ)
    logistic => Logistic;
    /// √x
    sqrt => Sqrt;
    /// x²
    square => Square;
}

impl From<Variable> for NlExpr {
    fn from(var: Variable) -> Self {
        NlExpr::Variable(var)
    }
}

impl<'a> From<&'a Variable> for NlExpr {
    fn from(var: &'a Variable) -> Self {
        NlExpr::Variable(*var)
    }
}

macro_rules! impl_from_num {
    ($($num:ty),*) => {$(
        impl From<$num> for NlExpr {
            fn from(value: $num) -> Self {
                NlExpr::Constant(f64::from(value))
            }
        }
    )*};
}

impl_from_num!(f64, f32, u32, u16, u8, i32, i16, i8);

// NlExpr and Variable on the left hand side
macro_rules! impl_ops {
    ($($t:ty),*) => {$(
        impl<RHS: Into<NlExpr>> Add<RHS> for $t {
            type Output = NlExpr;
            fn add(self, rhs: RHS) -> Self::Output {
                NlExpr::variadic(Opcode::Plus, self.into(), rhs.into())
            }
        }

        impl<RHS: Into<NlExpr>> Sub<RHS> for $t {
            type Output = NlExpr;
            fn sub(self, rhs: RHS) -> Self::Output {
                NlExpr::binary(Opcode::Minus, self.into(), rhs.into())
            }
        }

        impl<RHS: Into<NlExpr>> Mul<RHS> for $t {
            type Output = NlExpr;
            fn mul(self, rhs: RHS) -> Self::Output {
                NlExpr::variadic(Opcode::Multiply, self.into(), rhs.into())
            }
        }

        impl<RHS: Into<NlExpr>> Div<RHS> for $t {
            type Output = NlExpr;
            fn div(self, rhs: RHS) -> Self::Output {
                NlExpr::binary(Opcode::Divide, self.into(), rhs.into())
            }
        }

        impl Neg for $t {
            type Output = NlExpr;
            fn neg(self) -> Self::Output {
                NlExpr::unary(Opcode::Uminus, self.into())
            }
        }
    )*};
}

impl_ops!(NlExpr, Variable);

// Numbers on the left hand side
macro_rules! impl_num_ops {
    ($($num:ty),*) => {$(
        impl Add<NlExpr> for $num {
            type Output = NlExpr;
            fn add(self, rhs: NlExpr) -> Self::Output {
                NlExpr::variadic(Opcode::Plus, self.into(), rhs)
            }
        }

        impl Add<Variable> for $num {
            type Output = NlExpr;
            fn add(self, rhs: Variable) -> Self::Output {
                NlExpr::variadic(Opcode::Plus, self.into(), rhs.into())
            }
        }

        impl Sub<NlExpr> for $num {
            type Output = NlExpr;
            fn sub(self, rhs: NlExpr) -> Self::Output {
                NlExpr::binary(Opcode::Minus, self.into(), rhs)
            }
        }

        impl Sub<Variable> for $num {
            type Output = NlExpr;
            fn sub(self, rhs: Variable) -> Self::Output {
                NlExpr::binary(Opcode::Minus, self.into(), rhs.into())
            }
        }

        impl Mul<NlExpr> for $num {
            type Output = NlExpr;
            fn mul(self, rhs: NlExpr) -> Self::Output {
                NlExpr::variadic(Opcode::Multiply, self.into(), rhs)
            }
        }

        impl Mul<Variable> for $num {
            type Output = NlExpr;
            fn mul(self, rhs: Variable) -> Self::Output {
                NlExpr::variadic(Opcode::Multiply, self.into(), rhs.into())
            }
        }

        impl Div<NlExpr> for $num {
            type Output = NlExpr;
            fn div(self, rhs: NlExpr) -> Self::Output {
                NlExpr::binary(Opcode::Divide, self.into(), rhs)
            }
        }

        impl Div<Variable> for $num {
            type Output = NlExpr;
            fn div(self, rhs: Variable) -> Self::Output {
                NlExpr::binary(Opcode::Divide, self.into(), rhs.into())
            }
        }
    )*};
}

impl_num_ops!(f64, f32, u32, u16, u8, i32, i16, i8);

impl FormatWithVars for NlExpr {
    fn format_with<FUN>(&self, f: &mut Formatter<'_>, variable_format: FUN) -> std::fmt::Result
    where
        FUN: FnMut(&mut Formatter<'_>, Variable) -> std::fmt::Result,
    {
        match self.flatten() {
            Ok(tree) => tree.format_with(f, variable_format),
            Err(err) => write!(f, "<invalid expression: {}>", err),
        }
    }
}

impl Debug for NlExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.format_debug(f)
    }
}

impl Display for NlExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.format_debug(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression_tree::Opcode::*;

    #[test]
    fn sums_and_products_stay_flat() {
        let (a, b, c) = (Variable::at(0), Variable::at(1), Variable::at(2));
        let tree = (a + b + c).flatten().unwrap();
        assert_eq!(tree.opcodes(), &[Plus, Var, Var, Var]);
        assert_eq!(tree.parents(), &[-1, 0, 0, 0]);

        let tree = (2_i32 * a * b).flatten().unwrap();
        assert_eq!(tree.opcodes(), &[Multiply, Constant, Var, Var]);
    }

    #[test]
    fn flatten_is_pre_order() {
        let (x, y) = (Variable::at(0), Variable::at(1));
        let tree = (exp(x) - y / 2).flatten().unwrap();
        assert_eq!(tree.opcodes(), &[Minus, Exp, Var, Divide, Var, Constant]);
        assert_eq!(tree.data(), &[-1., -1., 0., -1., 1., 2.]);
        assert_eq!(tree.parents(), &[-1, 0, 1, 0, 3, 3]);
        assert!(tree.is_complete());
    }

    #[test]
    fn node_count_matches_tree_length() {
        let x = Variable::at(3);
        let expr = logistic(square(x) + 1).pow(0.5) - -x;
        assert_eq!(expr.node_count(), expr.flatten().unwrap().len());
    }

    #[test]
    fn display_uses_tree_rendering() {
        let (x1, x2) = (Variable::at(1), Variable::at(2));
        assert_eq!((sin(2.5 * x1) + x2).to_string(), "sin(2.5 * v1) + v2");
        assert_eq!((1_i32 - (x1 - x2)).to_string(), "1 - (v1 - v2)");
    }

    #[test]
    fn a_lone_leaf_is_a_valid_tree() {
        let tree = NlExpr::constant(4).flatten().unwrap();
        assert_eq!(tree.opcodes(), &[Constant]);
        assert_eq!(tree.parents(), &[-1]);
    }

    #[test]
    fn non_finite_constants_are_rejected() {
        let x = Variable::at(1);
        let err = (sin(x) + f64::NAN).flatten().unwrap_err();
        assert_eq!(err, TreeError::NonFiniteConstant { node: 3 });
        assert!((x / f64::INFINITY).flatten().is_err());
    }

    #[test]
    fn childless_operator_is_rejected() {
        let empty = NlExpr::Node {
            opcode: Sin,
            children: vec![],
        };
        assert_eq!(
            empty.flatten(),
            Err(TreeError::WrongArity {
                node: 0,
                opcode: Sin,
                children: 0
            })
        );
        assert_eq!(
            empty.to_string(),
            "<invalid expression: node 0 (Sin) has 0 children, expected Unary>"
        );
    }

    #[test]
    fn index_beyond_the_c_interface_is_rejected() {
        let far = Variable::at(i32::MAX as usize + 1);
        assert_eq!(
            square(far).flatten(),
            Err(TreeError::InvalidVariableIndex {
                node: 1,
                data: i32::MAX as f64 + 1.
            })
        );
        assert!(square(Variable::at(i32::MAX as usize)).flatten().is_ok());
    }
}
