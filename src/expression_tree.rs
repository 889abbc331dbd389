//! The flattened form of a nonlinear expression, as the solver consumes it.
//!
//! A tree with `n` nodes is stored as three parallel arrays:
//!  - `opcode[i]`: the operation (or leaf kind) of node `i`
//!  - `data[i]`: the value of a constant leaf, or the index of a variable leaf
//!  - `parent[i]`: the index of the parent of node `i`, `-1` for the root
//!
//! Nodes are laid out in pre-order, so the root is node 0 and every parent comes
//! before its children. The children of a node are its successors in the arrays
//! that point to it, in array order.
//!
//! ```
//! use genconstr_nl::{ExpressionTree, Variable};
//! use genconstr_nl::Opcode::*;
//!
//! // sin(2.5 * x1) + x2, with the variable leaves left unbound
//! let tree = ExpressionTree::new(
//!     vec![Plus, Sin, Multiply, Constant, Var, Var],
//!     vec![-1., -1., -1., 2.5, -1., -1.],
//!     vec![-1, 0, 1, 2, 2, 0],
//! )?;
//! assert!(!tree.is_complete());
//!
//! let tree = tree.bind(4, Variable::at(1))?.bind(5, Variable::at(2))?;
//! assert!(tree.is_complete());
//! assert_eq!(tree.data(), &[-1., -1., -1., 2.5, 1., 2.]);
//! assert_eq!(tree.to_string(), "sin(2.5 * v1) + v2");
//! # Ok::<_, genconstr_nl::TreeError>(())
//! ```
use std::fmt::{Display, Formatter};

use crate::variable::{FormatWithVars, Variable};

/// The `data` value of a variable leaf whose index is not known yet.
/// Operator nodes also carry it, the solver ignores their data.
pub const UNBOUND: f64 = -1.0;

/// The `parent` value of the root node
pub const NO_PARENT: i32 = -1;

/// The operation represented by one node of an [ExpressionTree].
/// The discriminants are the solver's opcode values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Opcode {
    /// A constant leaf, its value is in `data`
    Constant = 0,
    /// A variable leaf, its index is in `data`
    Var = 1,
    /// Sum of all children
    Plus = 2,
    /// First child minus second child
    Minus = 3,
    /// Product of all children
    Multiply = 4,
    /// First child divided by second child
    Divide = 5,
    /// Negation
    Uminus = 6,
    /// x²
    Square = 7,
    /// √x
    Sqrt = 8,
    /// sin(x)
    Sin = 9,
    /// cos(x)
    Cos = 10,
    /// tan(x)
    Tan = 11,
    /// First child raised to the power of the second child
    Pow = 12,
    /// eˣ
    Exp = 13,
    /// Natural logarithm
    Log = 14,
    /// Base 2 logarithm
    Log2 = 15,
    /// Base 10 logarithm
    Log10 = 16,
    /// 1 / (1 + e⁻ˣ)
    Logistic = 17,
}

// binding strength of `^` when rendering, `+ -` bind at 1 and `* /` at 2
const POW_PRECEDENCE: u8 = 3;

/// How many children a node with a given [Opcode] must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No children
    Leaf,
    /// Exactly one child
    Unary,
    /// Exactly two children, the order matters
    Binary,
    /// One child or more
    Variadic,
}

impl Arity {
    fn accepts(self, children: usize) -> bool {
        match self {
            Arity::Leaf => children == 0,
            Arity::Unary => children == 1,
            Arity::Binary => children == 2,
            Arity::Variadic => children >= 1,
        }
    }
}

impl Opcode {
    const ALL: [Opcode; 18] = [
        Opcode::Constant,
        Opcode::Var,
        Opcode::Plus,
        Opcode::Minus,
        Opcode::Multiply,
        Opcode::Divide,
        Opcode::Uminus,
        Opcode::Square,
        Opcode::Sqrt,
        Opcode::Sin,
        Opcode::Cos,
        Opcode::Tan,
        Opcode::Pow,
        Opcode::Exp,
        Opcode::Log,
        Opcode::Log2,
        Opcode::Log10,
        Opcode::Logistic,
    ];

    /// The solver's integer code for this opcode
    pub fn code(self) -> i32 {
        self as i32
    }

    /// The opcode with the given solver code, if there is one
    ///
    /// ```
    /// # use genconstr_nl::Opcode;
    /// assert_eq!(Opcode::from_code(9), Some(Opcode::Sin));
    /// assert_eq!(Opcode::from_code(18), None);
    /// ```
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// The number of children a node with this opcode takes
    pub fn arity(self) -> Arity {
        match self {
            Opcode::Constant | Opcode::Var => Arity::Leaf,
            Opcode::Minus | Opcode::Divide | Opcode::Pow => Arity::Binary,
            Opcode::Plus | Opcode::Multiply => Arity::Variadic,
            _ => Arity::Unary,
        }
    }

    /// Name used when rendering a unary node as a function call
    fn function_name(self) -> &'static str {
        match self {
            Opcode::Square => "square",
            Opcode::Sqrt => "sqrt",
            Opcode::Sin => "sin",
            Opcode::Cos => "cos",
            Opcode::Tan => "tan",
            Opcode::Exp => "exp",
            Opcode::Log => "log",
            Opcode::Log2 => "log2",
            Opcode::Log10 => "log10",
            Opcode::Logistic => "logistic",
            _ => "",
        }
    }

    fn infix(self) -> Option<(&'static str, u8)> {
        match self {
            Opcode::Plus => Some((" + ", 1)),
            Opcode::Minus => Some((" - ", 1)),
            Opcode::Multiply => Some((" * ", 2)),
            Opcode::Divide => Some((" / ", 2)),
            Opcode::Pow => Some((" ^ ", POW_PRECEDENCE)),
            _ => None,
        }
    }

    fn precedence(self) -> u8 {
        self.infix().map(|(_, p)| p).unwrap_or(4)
    }
}

/// Represents an error in the shape of a flattened expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum TreeError {
    /// A tree needs at least a root node
    Empty,
    /// The three arrays must have the same length
    LengthMismatch {
        /// length of the opcode array
        opcodes: usize,
        /// length of the data array
        data: usize,
        /// length of the parent array
        parents: usize,
    },
    /// An opcode array element is not a known solver opcode
    UnknownOpcode {
        /// position of the node
        node: usize,
        /// the offending code
        code: i32,
    },
    /// Node 0 must be the root, with parent -1
    RootHasParent {
        /// the parent found for node 0
        parent: i32,
    },
    /// Each non-root node must point to an earlier node
    InvalidParent {
        /// position of the node
        node: usize,
        /// the offending parent index
        parent: i32,
    },
    /// A node has the wrong number of children for its opcode
    WrongArity {
        /// position of the node
        node: usize,
        /// its opcode
        opcode: Opcode,
        /// how many children it has
        children: usize,
    },
    /// A constant leaf holds NaN or an infinity
    NonFiniteConstant {
        /// position of the node
        node: usize,
    },
    /// A variable leaf holds neither the placeholder nor a variable index
    InvalidVariableIndex {
        /// position of the node
        node: usize,
        /// the offending value
        data: f64,
    },
    /// [ExpressionTree::bind] was called on a node that is not a variable leaf
    NotAVariable {
        /// position of the node
        node: usize,
    },
    /// A node index is past the end of the tree
    NodeOutOfRange {
        /// the requested node
        node: usize,
        /// number of nodes in the tree
        len: usize,
    },
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::Empty => write!(f, "expression tree has no nodes"),
            TreeError::LengthMismatch {
                opcodes,
                data,
                parents,
            } => write!(
                f,
                "opcode, data and parent arrays differ in length ({}, {}, {})",
                opcodes, data, parents
            ),
            TreeError::UnknownOpcode { node, code } => {
                write!(f, "node {} has unknown opcode {}", node, code)
            }
            TreeError::RootHasParent { parent } => {
                write!(f, "root node must have parent -1, found {}", parent)
            }
            TreeError::InvalidParent { node, parent } => write!(
                f,
                "node {} has parent {}, expected an earlier node",
                node, parent
            ),
            TreeError::WrongArity {
                node,
                opcode,
                children,
            } => write!(
                f,
                "node {} ({:?}) has {} children, expected {:?}",
                node,
                opcode,
                children,
                opcode.arity()
            ),
            TreeError::NonFiniteConstant { node } => {
                write!(f, "constant node {} is not finite", node)
            }
            TreeError::InvalidVariableIndex { node, data } => {
                write!(f, "variable node {} holds invalid index {}", node, data)
            }
            TreeError::NotAVariable { node } => write!(f, "node {} is not a variable", node),
            TreeError::NodeOutOfRange { node, len } => {
                write!(f, "node {} is out of range for a tree of {} nodes", node, len)
            }
        }
    }
}

impl std::error::Error for TreeError {}

/// A nonlinear expression, flattened into opcode, data and parent arrays.
///
/// Trees are values: [bind](ExpressionTree::bind) consumes a tree and
/// returns the patched one, so a tree built for one model is never shared
/// with another by accident.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionTree {
    opcode: Vec<Opcode>,
    data: Vec<f64>,
    parent: Vec<i32>,
}

impl ExpressionTree {
    /// Check the shape of the arrays and build a tree from them.
    pub fn new(opcode: Vec<Opcode>, data: Vec<f64>, parent: Vec<i32>) -> Result<Self, TreeError> {
        if opcode.len() != data.len() || opcode.len() != parent.len() {
            return Err(TreeError::LengthMismatch {
                opcodes: opcode.len(),
                data: data.len(),
                parents: parent.len(),
            });
        }
        if opcode.is_empty() {
            return Err(TreeError::Empty);
        }
        if parent[0] != NO_PARENT {
            return Err(TreeError::RootHasParent { parent: parent[0] });
        }
        let mut children = vec![0usize; opcode.len()];
        for (node, &p) in parent.iter().enumerate().skip(1) {
            if p < 0 || p as usize >= node {
                return Err(TreeError::InvalidParent { node, parent: p });
            }
            children[p as usize] += 1;
        }
        for (node, (&op, &value)) in opcode.iter().zip(&data).enumerate() {
            if !op.arity().accepts(children[node]) {
                return Err(TreeError::WrongArity {
                    node,
                    opcode: op,
                    children: children[node],
                });
            }
            match op {
                Opcode::Constant if !value.is_finite() => {
                    return Err(TreeError::NonFiniteConstant { node })
                }
                Opcode::Var if !is_variable_data(value) => {
                    return Err(TreeError::InvalidVariableIndex { node, data: value })
                }
                _ => {}
            }
        }
        Ok(ExpressionTree {
            opcode,
            data,
            parent,
        })
    }

    /// Like [new](ExpressionTree::new), with opcodes given as solver codes.
    pub fn from_codes(codes: &[i32], data: Vec<f64>, parent: Vec<i32>) -> Result<Self, TreeError> {
        let opcode = codes
            .iter()
            .enumerate()
            .map(|(node, &code)| {
                Opcode::from_code(code).ok_or(TreeError::UnknownOpcode { node, code })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(opcode, data, parent)
    }

    /// Set the index of the variable leaf at position `node`.
    /// Works both on unbound leaves and on leaves that already refer to a variable.
    pub fn bind(mut self, node: usize, variable: Variable) -> Result<Self, TreeError> {
        match self.opcode.get(node) {
            None => Err(TreeError::NodeOutOfRange {
                node,
                len: self.len(),
            }),
            Some(Opcode::Var) => {
                self.data[node] = variable.index() as f64;
                Ok(self)
            }
            Some(_) => Err(TreeError::NotAVariable { node }),
        }
    }

    /// The number of nodes
    pub fn len(&self) -> usize {
        self.opcode.len()
    }

    /// Always false: a valid tree has at least a root
    pub fn is_empty(&self) -> bool {
        self.opcode.is_empty()
    }

    /// The opcode array
    pub fn opcodes(&self) -> &[Opcode] {
        &self.opcode
    }

    /// The opcode array, as solver codes
    pub fn opcode_codes(&self) -> Vec<i32> {
        self.opcode.iter().map(|op| op.code()).collect()
    }

    /// The data array
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// The parent array
    pub fn parents(&self) -> &[i32] {
        &self.parent
    }

    /// Positions of the variable leaves that still hold the placeholder
    pub fn unbound_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.opcode
            .iter()
            .zip(&self.data)
            .enumerate()
            .filter(|(_, (&op, &value))| op == Opcode::Var && value < 0.)
            .map(|(node, _)| node)
    }

    /// True when every variable leaf refers to a variable
    pub fn is_complete(&self) -> bool {
        self.unbound_nodes().next().is_none()
    }

    /// The variables referenced by bound leaves, in node order, with repetitions
    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.opcode
            .iter()
            .zip(&self.data)
            .filter(|(&op, &value)| op == Opcode::Var && value >= 0.)
            .map(|(_, &value)| Variable::at(value as usize))
    }

    fn children(&self) -> Vec<Vec<usize>> {
        let mut children = vec![vec![]; self.len()];
        for (node, &p) in self.parent.iter().enumerate().skip(1) {
            children[p as usize].push(node);
        }
        children
    }

    /// A negation, or a constant that prints with a minus sign
    fn is_negative(&self, node: usize) -> bool {
        match self.opcode[node] {
            Opcode::Uminus => true,
            Opcode::Constant => self.data[node].is_sign_negative(),
            _ => false,
        }
    }

    fn format_node<FUN>(
        &self,
        f: &mut Formatter<'_>,
        node: usize,
        children: &[Vec<usize>],
        variable_format: &mut FUN,
    ) -> std::fmt::Result
    where
        FUN: FnMut(&mut Formatter<'_>, Variable) -> std::fmt::Result,
    {
        let op = self.opcode[node];
        let kids = &children[node];
        match op {
            Opcode::Constant => write!(f, "{}", self.data[node]),
            Opcode::Var if self.data[node] < 0. => write!(f, "?"),
            Opcode::Var => variable_format(f, Variable::at(self.data[node] as usize)),
            Opcode::Uminus if self.is_negative(kids[0]) => {
                write!(f, "-(")?;
                self.format_node(f, kids[0], children, variable_format)?;
                write!(f, ")")
            }
            Opcode::Uminus => {
                write!(f, "-")?;
                self.format_operand(f, kids[0], 4, false, children, variable_format)
            }
            _ => match op.infix() {
                Some((symbol, precedence)) => {
                    let ordered = matches!(op, Opcode::Minus | Opcode::Divide | Opcode::Pow);
                    for (position, &kid) in kids.iter().enumerate() {
                        if position > 0 {
                            write!(f, "{}", symbol)?;
                        }
                        // powers are wrapped on both sides, `a ^ b ^ c` reads either way
                        let strict = op == Opcode::Pow || (ordered && position > 0);
                        self.format_operand(f, kid, precedence, strict, children, variable_format)?;
                    }
                    Ok(())
                }
                None => {
                    write!(f, "{}(", op.function_name())?;
                    self.format_node(f, kids[0], children, variable_format)?;
                    write!(f, ")")
                }
            },
        }
    }

    fn format_operand<FUN>(
        &self,
        f: &mut Formatter<'_>,
        node: usize,
        outer: u8,
        strict: bool,
        children: &[Vec<usize>],
        variable_format: &mut FUN,
    ) -> std::fmt::Result
    where
        FUN: FnMut(&mut Formatter<'_>, Variable) -> std::fmt::Result,
    {
        let inner = self.opcode[node].precedence();
        let single_child = children[node].len() == 1 && self.opcode[node].infix().is_some();
        let wrap = (!single_child && (inner < outer || (strict && inner == outer)))
            || (outer >= POW_PRECEDENCE && self.is_negative(node));
        if wrap {
            write!(f, "(")?;
        }
        self.format_node(f, node, children, variable_format)?;
        if wrap {
            write!(f, ")")?;
        }
        Ok(())
    }
}

fn is_variable_data(value: f64) -> bool {
    value == UNBOUND || (value >= 0. && value.fract() == 0. && value <= i32::MAX as f64)
}

impl FormatWithVars for ExpressionTree {
    fn format_with<FUN>(&self, f: &mut Formatter<'_>, mut variable_format: FUN) -> std::fmt::Result
    where
        FUN: FnMut(&mut Formatter<'_>, Variable) -> std::fmt::Result,
    {
        let children = self.children();
        self.format_node(f, 0, &children, &mut variable_format)
    }
}

impl Display for ExpressionTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.format_debug(f)
    }
}
