//! Solver-independent mixed-integer model.

use serde::{Deserialize, Serialize};

use super::expr::{Constraint, ConstraintFamily, LinearExpr, VarId, Variable};
use crate::error::FormulationError;

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Minimize the objective expression.
    Minimize,
    /// Maximize the objective expression.
    Maximize,
}

/// Objective function: a direction and a linear expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    /// Optimization direction.
    pub direction: Direction,
    /// Expression to optimize.
    pub expr: LinearExpr,
}

/// Values for every variable of a model, indexed by [`VarId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    values: Vec<f64>,
}

impl Assignment {
    /// Wraps a dense value vector.
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// All-zero assignment for `len` variables.
    pub fn zeros(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    /// Value of a variable.
    ///
    /// # Panics
    ///
    /// Panics if `var` is out of range.
    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.0]
    }

    /// Sets the value of a variable.
    pub fn set(&mut self, var: VarId, value: f64) {
        self.values[var.0] = value;
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw value vector.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// A way in which an assignment fails a model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelViolation {
    /// Assignment length differs from the number of variables.
    Size { expected: usize, actual: usize },
    /// Value outside the variable bounds.
    Bound { var: VarId, value: f64 },
    /// Binary variable with a non-integral value.
    Integrality { var: VarId, value: f64 },
    /// Linear constraint not satisfied.
    Constraint { index: usize, lhs: f64, rhs: f64 },
}

/// A mixed-integer linear model: variables, constraints and an objective.
///
/// This is the abstract optimization model handed to a
/// [`MipSolver`](crate::solver::MipSolver). It does not know about routing;
/// the CVRPTW structure lives in the [`VarLayout`](super::VarLayout) that
/// accompanies it.
///
/// # Examples
///
/// ```
/// use u_cvrptw::formulation::{
///     Assignment, Constraint, ConstraintFamily, LinearExpr, MipModel, Sense, Variable,
/// };
///
/// let mut model = MipModel::minimize("pick-one");
/// let a = model.add_variable(Variable::binary("a"));
/// let b = model.add_variable(Variable::binary("b"));
/// model.add_constraint(Constraint::new(
///     "one",
///     ConstraintFamily::CustomerAssignment,
///     LinearExpr::new().with_term(a, 1.0).with_term(b, 1.0),
///     Sense::Equal,
///     1.0,
/// ));
/// model.set_objective(LinearExpr::new().with_term(a, 3.0).with_term(b, 2.0));
///
/// let pick_b = Assignment::new(vec![0.0, 1.0]);
/// assert!(model.is_feasible(&pick_b, 1e-9));
/// assert_eq!(model.objective_value(&pick_b), 2.0);
/// assert!(!model.is_feasible(&Assignment::new(vec![1.0, 1.0]), 1e-9));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MipModel {
    name: String,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Objective,
}

impl MipModel {
    /// Creates an empty model with the given direction.
    pub fn new(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
            constraints: Vec::new(),
            objective: Objective {
                direction,
                expr: LinearExpr::new(),
            },
        }
    }

    /// Creates an empty minimization model.
    pub fn minimize(name: impl Into<String>) -> Self {
        Self::new(name, Direction::Minimize)
    }

    /// Adds a variable and returns its id.
    pub fn add_variable(&mut self, var: Variable) -> VarId {
        self.variables.push(var);
        VarId(self.variables.len() - 1)
    }

    /// Adds a constraint.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Replaces the objective expression, keeping the direction.
    pub fn set_objective(&mut self, expr: LinearExpr) {
        self.objective.expr = expr;
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All variables, indexed by [`VarId::index`].
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Variable by id.
    pub fn variable(&self, var: VarId) -> &Variable {
        &self.variables[var.0]
    }

    /// All constraints.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Objective function.
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Number of variables.
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Number of binary variables.
    pub fn num_binary(&self) -> usize {
        self.variables.iter().filter(|v| v.is_binary()).count()
    }

    /// Number of constraints.
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Constraints of one family.
    pub fn constraints_of(&self, family: ConstraintFamily) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(move |c| c.family == family)
    }

    /// Checks the model for structural consistency.
    ///
    /// Every referenced variable must exist, bounds must be ordered and
    /// every coefficient finite.
    pub fn validate(&self) -> Result<(), FormulationError> {
        for var in &self.variables {
            if var.lower.is_nan() || var.upper.is_nan() || var.lower > var.upper {
                return Err(FormulationError::InvalidBounds {
                    name: var.name.clone(),
                    lower: var.lower,
                    upper: var.upper,
                });
            }
        }
        let n = self.variables.len();
        let exprs = self
            .constraints
            .iter()
            .map(|c| (c.name.as_str(), &c.expr, c.rhs))
            .chain(std::iter::once(("objective", &self.objective.expr, 0.0)));
        for (name, expr, rhs) in exprs {
            if !rhs.is_finite() || !expr.constant().is_finite() {
                return Err(FormulationError::NonFiniteCoefficient(name.to_string()));
            }
            for &(var, coef) in expr.terms() {
                if var.0 >= n {
                    return Err(FormulationError::UnknownVariable {
                        constraint: name.to_string(),
                        var: var.0,
                    });
                }
                if !coef.is_finite() {
                    return Err(FormulationError::NonFiniteCoefficient(name.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Objective value of an assignment.
    pub fn objective_value(&self, assignment: &Assignment) -> f64 {
        self.objective.expr.evaluate(assignment)
    }

    /// Lists every bound, integrality and constraint violation of an
    /// assignment, using absolute tolerance `tol`.
    pub fn check(&self, assignment: &Assignment, tol: f64) -> Vec<ModelViolation> {
        if assignment.len() != self.variables.len() {
            return vec![ModelViolation::Size {
                expected: self.variables.len(),
                actual: assignment.len(),
            }];
        }
        let mut violations = Vec::new();
        for (index, var) in self.variables.iter().enumerate() {
            let id = VarId(index);
            let value = assignment.value(id);
            if !(value >= var.lower - tol && value <= var.upper + tol) {
                violations.push(ModelViolation::Bound { var: id, value });
            } else if var.is_binary() && (value - value.round()).abs() > tol {
                violations.push(ModelViolation::Integrality { var: id, value });
            }
        }
        for (index, constraint) in self.constraints.iter().enumerate() {
            let lhs = constraint.expr.evaluate(assignment);
            if !constraint.holds(lhs, tol) {
                violations.push(ModelViolation::Constraint {
                    index,
                    lhs,
                    rhs: constraint.rhs,
                });
            }
        }
        violations
    }

    /// Returns `true` if the assignment satisfies every bound and constraint.
    pub fn is_feasible(&self, assignment: &Assignment, tol: f64) -> bool {
        self.check(assignment, tol).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::Sense;

    fn knapsack() -> MipModel {
        let mut model = MipModel::minimize("test");
        let a = model.add_variable(Variable::binary("a"));
        let t = model.add_variable(Variable::continuous("t", 2.0, 8.0));
        model.add_constraint(Constraint::new(
            "link",
            ConstraintFamily::TimePropagation,
            LinearExpr::new().with_term(t, 1.0).with_term(a, -4.0),
            Sense::GreaterEqual,
            0.0,
        ));
        model.set_objective(LinearExpr::new().with_term(t, 1.0).with_term(a, 10.0));
        model
    }

    #[test]
    fn test_counts() {
        let model = knapsack();
        assert_eq!(model.name(), "test");
        assert_eq!(model.num_variables(), 2);
        assert_eq!(model.num_binary(), 1);
        assert_eq!(model.num_constraints(), 1);
        assert_eq!(model.constraints_of(ConstraintFamily::TimePropagation).count(), 1);
        assert_eq!(model.constraints_of(ConstraintFamily::LoadPropagation).count(), 0);
        assert_eq!(model.objective().direction, Direction::Minimize);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_check_violations() {
        let model = knapsack();
        assert!(model.is_feasible(&Assignment::new(vec![1.0, 4.0]), 1e-9));
        assert_eq!(model.objective_value(&Assignment::new(vec![1.0, 4.0])), 14.0);

        let v = model.check(&Assignment::new(vec![1.0, 3.0]), 1e-9);
        assert_eq!(v, vec![ModelViolation::Constraint { index: 0, lhs: -1.0, rhs: 0.0 }]);

        let v = model.check(&Assignment::new(vec![0.5, 2.0]), 1e-9);
        assert!(matches!(v[0], ModelViolation::Integrality { .. }));

        let v = model.check(&Assignment::new(vec![0.0, 9.0]), 1e-9);
        assert!(matches!(v[0], ModelViolation::Bound { value, .. } if value == 9.0));

        let v = model.check(&Assignment::new(vec![0.0]), 1e-9);
        assert_eq!(v, vec![ModelViolation::Size { expected: 2, actual: 1 }]);
    }

    #[test]
    fn test_validate_unknown_variable() {
        let mut model = knapsack();
        model.add_constraint(Constraint::new(
            "bad",
            ConstraintFamily::FlowConservation,
            LinearExpr::new().with_term(VarId(7), 1.0),
            Sense::Equal,
            0.0,
        ));
        assert_eq!(
            model.validate(),
            Err(FormulationError::UnknownVariable {
                constraint: "bad".into(),
                var: 7
            })
        );
    }

    #[test]
    fn test_validate_bounds_and_coefficients() {
        let mut model = knapsack();
        model.add_variable(Variable::continuous("z", 5.0, 1.0));
        assert!(matches!(
            model.validate(),
            Err(FormulationError::InvalidBounds { .. })
        ));

        let mut model = knapsack();
        model.add_constraint(Constraint::new(
            "nan",
            ConstraintFamily::LoadPropagation,
            LinearExpr::new().with_term(VarId(0), f64::NAN),
            Sense::LessEqual,
            0.0,
        ));
        assert_eq!(
            model.validate(),
            Err(FormulationError::NonFiniteCoefficient("nan".into()))
        );
    }

    #[test]
    fn test_assignment() {
        let mut a = Assignment::zeros(3);
        assert_eq!(a.len(), 3);
        assert!(!a.is_empty());
        a.set(VarId(1), 2.5);
        assert_eq!(a.value(VarId(1)), 2.5);
        assert_eq!(a.values(), &[0.0, 2.5, 0.0]);
    }
}
