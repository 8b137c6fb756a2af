//! Variables, linear expressions and constraints.

use serde::{Deserialize, Serialize};

use super::Assignment;

/// Index of a variable inside a [`MipModel`](super::MipModel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub(crate) usize);

impl VarId {
    /// Position of the variable in the model and in an [`Assignment`].
    pub fn index(self) -> usize {
        self.0
    }
}

/// Domain type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    /// Integer variable restricted to {0, 1}.
    Binary,
    /// Real variable.
    Continuous,
}

/// A decision variable with its bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Unique name, e.g. `x_0_3_1`.
    pub name: String,
    /// Domain type.
    pub kind: VarKind,
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

impl Variable {
    /// Creates a binary variable.
    pub fn binary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VarKind::Binary,
            lower: 0.0,
            upper: 1.0,
        }
    }

    /// Creates a continuous variable bounded to `[lower, upper]`.
    pub fn continuous(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            kind: VarKind::Continuous,
            lower,
            upper,
        }
    }

    /// Whether this is a binary variable.
    pub fn is_binary(&self) -> bool {
        self.kind == VarKind::Binary
    }
}

/// A linear expression `Σ coef·var + constant`.
///
/// # Examples
///
/// ```
/// use u_cvrptw::formulation::{Assignment, LinearExpr, MipModel, Variable};
///
/// let mut model = MipModel::minimize("demo");
/// let a = model.add_variable(Variable::binary("a"));
/// let b = model.add_variable(Variable::continuous("b", 0.0, 10.0));
///
/// let expr = LinearExpr::new().with_term(a, 2.0).with_term(b, -1.0).with_constant(3.0);
/// let values = Assignment::new(vec![1.0, 4.0]);
/// assert_eq!(expr.evaluate(&values), 1.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    /// Creates the empty expression `0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `coef·var` and returns the expression.
    pub fn with_term(mut self, var: VarId, coef: f64) -> Self {
        self.add_term(var, coef);
        self
    }

    /// Sets the constant part and returns the expression.
    pub fn with_constant(mut self, constant: f64) -> Self {
        self.constant = constant;
        self
    }

    /// Adds `coef·var` in place.
    pub fn add_term(&mut self, var: VarId, coef: f64) {
        self.terms.push((var, coef));
    }

    /// The `(variable, coefficient)` terms.
    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    /// The constant part.
    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Evaluates the expression under an assignment.
    ///
    /// # Panics
    ///
    /// Panics if a term references a variable outside the assignment.
    pub fn evaluate(&self, assignment: &Assignment) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coef)| coef * assignment.value(var))
            .sum::<f64>()
            + self.constant
    }
}

impl FromIterator<(VarId, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
            constant: 0.0,
        }
    }
}

/// Relation between the left-hand side and the right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    /// `lhs ≤ rhs`
    LessEqual,
    /// `lhs ≥ rhs`
    GreaterEqual,
    /// `lhs = rhs`
    Equal,
}

/// The CVRPTW constraint family a constraint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintFamily {
    /// Each customer is entered exactly once.
    CustomerAssignment,
    /// Inflow equals outflow per vehicle and node.
    FlowConservation,
    /// Each vehicle leaves the depot at most once.
    DepotDeparture,
    /// Big-M load propagation along used arcs.
    LoadPropagation,
    /// Big-M arrival-time propagation along used arcs.
    TimePropagation,
    /// MTZ ordering between customers.
    SubtourElimination,
}

/// A linear constraint `expr (≤ | ≥ | =) rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Unique name, e.g. `time_2_5_0`.
    pub name: String,
    /// Family tag.
    pub family: ConstraintFamily,
    /// Left-hand side.
    pub expr: LinearExpr,
    /// Relation.
    pub sense: Sense,
    /// Right-hand side.
    pub rhs: f64,
}

impl Constraint {
    /// Creates a constraint.
    pub fn new(
        name: impl Into<String>,
        family: ConstraintFamily,
        expr: LinearExpr,
        sense: Sense,
        rhs: f64,
    ) -> Self {
        Self {
            name: name.into(),
            family,
            expr,
            sense,
            rhs,
        }
    }

    /// Returns `true` if `lhs` satisfies the relation within `tol`.
    pub fn holds(&self, lhs: f64, tol: f64) -> bool {
        match self.sense {
            Sense::LessEqual => lhs <= self.rhs + tol,
            Sense::GreaterEqual => lhs >= self.rhs - tol,
            Sense::Equal => (lhs - self.rhs).abs() <= tol,
        }
    }
}
