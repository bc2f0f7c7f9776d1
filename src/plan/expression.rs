//! Guard and body expressions.
//!
//! Expressions evaluate under a frame's bindings and the agent's belief base.
//! A belief query binds its variables on success; conjunctions see the
//! bindings of their left side. There is no backtracking: the first matching
//! belief wins.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::belief::BeliefBase;
use crate::error::InstructionError;
use crate::term::{Literal, Term};
use crate::unify::Substitution;

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Term(Term),
}

impl Value {
    /// Truth degree for fuzzy tests and guards.
    ///
    /// Booleans map to 0 or 1, numbers inside `[0, 1]` are taken as degrees.
    ///
    /// # Errors
    ///
    /// Returns `InstructionError::TypeMismatch` for anything else.
    pub fn truth(&self) -> Result<f64, InstructionError> {
        match self {
            Self::Bool(true) => Ok(1.0),
            Self::Bool(false) => Ok(0.0),
            Self::Number(n) if (0.0..=1.0).contains(n) => Ok(*n),
            other => Err(InstructionError::TypeMismatch {
                expected: "truth value",
                found: other.to_string(),
            }),
        }
    }

    fn number(&self) -> Result<f64, InstructionError> {
        match self {
            Self::Number(n) => Ok(*n),
            other => Err(InstructionError::TypeMismatch {
                expected: "number",
                found: other.to_string(),
            }),
        }
    }

    fn boolean(&self) -> Result<bool, InstructionError> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(InstructionError::TypeMismatch {
                expected: "boolean",
                found: other.to_string(),
            }),
        }
    }

    /// The value as a term, for binding into a variable.
    #[must_use]
    pub fn into_term(self) -> Term {
        match self {
            Self::Number(n) => Term::Number(n),
            Self::Bool(b) => Term::boolean(b),
            Self::Term(t) => t,
        }
    }

    fn from_term(term: Term) -> Self {
        match term {
            Term::Number(n) => Self::Number(n),
            other => match other.as_bool() {
                Some(b) => Self::Bool(b),
                None => Self::Term(other),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", Term::Number(*n)),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Term(t) => write!(f, "{t}"),
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Not,
    Negate,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Xor,
}

impl BinaryOperator {
    const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Power => "**",
            Self::Equal => "==",
            Self::NotEqual => "\\==",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Xor => "^",
        }
    }
}

/// An expression tree.
///
/// # Examples
///
/// ```
/// use bdi_engine::plan::{BinaryOperator, Expression};
/// use bdi_engine::{BeliefBase, Substitution, Term};
///
/// let mut bindings = Substitution::new();
/// bindings.bind("X", Term::number(4.0));
///
/// let expr = Expression::binary(
///     BinaryOperator::Greater,
///     Expression::term(Term::var("X")),
///     Expression::term(Term::number(3.0)),
/// );
/// let value = expr.evaluate(&mut bindings, &BeliefBase::new()).unwrap();
/// assert_eq!(value.truth().unwrap(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Expression {
    Term(Term),
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// True if some belief unifies with the literal.
    Belief(Literal),
}

impl Expression {
    #[must_use]
    pub const fn term(term: Term) -> Self {
        Self::Term(term)
    }

    #[must_use]
    pub const fn belief(literal: Literal) -> Self {
        Self::Belief(literal)
    }

    #[must_use]
    pub fn not(operand: Expression) -> Self {
        Self::Unary {
            operator: UnaryOperator::Not,
            operand: Box::new(operand),
        }
    }

    #[must_use]
    pub fn negate(operand: Expression) -> Self {
        Self::Unary {
            operator: UnaryOperator::Negate,
            operand: Box::new(operand),
        }
    }

    #[must_use]
    pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Self {
        Self::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Evaluates the expression.
    ///
    /// # Errors
    ///
    /// Returns an `InstructionError` for unbound variables, type mismatches
    /// and division by zero.
    pub fn evaluate(
        &self,
        bindings: &mut Substitution,
        beliefs: &BeliefBase,
    ) -> Result<Value, InstructionError> {
        match self {
            Self::Term(term) => {
                let resolved = bindings.apply(term);
                if let Term::Variable(var) = &resolved {
                    return Err(InstructionError::UnboundVariable {
                        name: var.name().to_string(),
                    });
                }
                Ok(Value::from_term(resolved))
            }
            Self::Unary { operator, operand } => {
                let value = operand.evaluate(bindings, beliefs)?;
                match operator {
                    UnaryOperator::Not => Ok(Value::Bool(!value.boolean()?)),
                    UnaryOperator::Negate => Ok(Value::Number(-value.number()?)),
                }
            }
            Self::Binary {
                operator,
                left,
                right,
            } => evaluate_binary(*operator, left, right, bindings, beliefs),
            Self::Belief(literal) => {
                let found = beliefs
                    .unify_query(literal, bindings)
                    .next()
                    .map(|(_, s)| s);
                match found {
                    Some(extended) => {
                        *bindings = extended;
                        Ok(Value::Bool(true))
                    }
                    None => Ok(Value::Bool(false)),
                }
            }
        }
    }
}

fn evaluate_binary(
    operator: BinaryOperator,
    left: &Expression,
    right: &Expression,
    bindings: &mut Substitution,
    beliefs: &BeliefBase,
) -> Result<Value, InstructionError> {
    use BinaryOperator as Op;

    let lhs = left.evaluate(bindings, beliefs)?;
    // short circuit before the right side can bind anything
    match operator {
        Op::And if !lhs.boolean()? => return Ok(Value::Bool(false)),
        Op::Or if lhs.boolean()? => return Ok(Value::Bool(true)),
        _ => {}
    }
    let rhs = right.evaluate(bindings, beliefs)?;

    let value = match operator {
        Op::Add => Value::Number(lhs.number()? + rhs.number()?),
        Op::Subtract => Value::Number(lhs.number()? - rhs.number()?),
        Op::Multiply => Value::Number(lhs.number()? * rhs.number()?),
        Op::Divide => {
            let divisor = rhs.number()?;
            if divisor == 0.0 {
                return Err(InstructionError::DivisionByZero);
            }
            Value::Number(lhs.number()? / divisor)
        }
        Op::Modulo => {
            let divisor = rhs.number()?;
            if divisor == 0.0 {
                return Err(InstructionError::DivisionByZero);
            }
            Value::Number(lhs.number()?.rem_euclid(divisor))
        }
        Op::Power => Value::Number(lhs.number()?.powf(rhs.number()?)),
        Op::Equal => Value::Bool(lhs == rhs),
        Op::NotEqual => Value::Bool(lhs != rhs),
        Op::Less => Value::Bool(lhs.number()? < rhs.number()?),
        Op::LessEqual => Value::Bool(lhs.number()? <= rhs.number()?),
        Op::Greater => Value::Bool(lhs.number()? > rhs.number()?),
        Op::GreaterEqual => Value::Bool(lhs.number()? >= rhs.number()?),
        Op::And | Op::Or => Value::Bool(rhs.boolean()?),
        Op::Xor => Value::Bool(lhs.boolean()? ^ rhs.boolean()?),
    };
    Ok(value)
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term(term) => write!(f, "{term}"),
            Self::Unary { operator, operand } => match operator {
                UnaryOperator::Not => write!(f, "~({operand})"),
                UnaryOperator::Negate => write!(f, "-({operand})"),
            },
            Self::Binary {
                operator,
                left,
                right,
            } => write!(f, "({left} {} {right})", operator.symbol()),
            Self::Belief(literal) => write!(f, "{literal}"),
        }
    }
}
