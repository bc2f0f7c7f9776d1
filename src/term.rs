//! Term model.
//!
//! Terms are immutable values: atoms, numbers, strings, sequences, structured
//! literals and variables. Literals compare by functor, negation and
//! arguments. Annotations are carried for introspection but do not take part
//! in equality or hashing; use [`Literal::identical`] when they must.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::path::Path;

/// Name of the anonymous variable. It unifies with anything and never binds.
pub const ANONYMOUS: &str = "_";

/// A term of the agent language.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Term {
    Atom(String),
    Number(f64),
    Text(String),
    Sequence(Vec<Term>),
    Literal(Literal),
    Variable(Variable),
}

impl Term {
    #[must_use]
    pub fn atom(name: impl Into<String>) -> Self {
        Self::Atom(name.into())
    }

    #[must_use]
    pub const fn number(value: f64) -> Self {
        Self::Number(value)
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(Variable::new(name))
    }

    #[must_use]
    pub const fn sequence(items: Vec<Term>) -> Self {
        Self::Sequence(items)
    }

    /// Boolean values are represented by the atoms `true` and `false`.
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::Atom(if value { "true" } else { "false" }.to_string())
    }

    /// Returns true if no unbound variable occurs in this term, transitively.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        match self {
            Self::Atom(_) | Self::Number(_) | Self::Text(_) => true,
            Self::Sequence(items) => items.iter().all(Term::is_ground),
            Self::Literal(literal) => literal.is_ground(),
            Self::Variable(var) => var.value().is_some_and(Term::is_ground),
        }
    }

    /// Names of all unbound variables, in first-occurrence order.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Self::Atom(_) | Self::Number(_) | Self::Text(_) => {}
            Self::Sequence(items) => items.iter().for_each(|t| t.collect_variables(out)),
            Self::Literal(literal) => literal.collect_variables(out),
            Self::Variable(var) => match var.value() {
                Some(value) => value.collect_variables(out),
                None => {
                    if !var.is_anonymous() && !out.iter().any(|n| n == var.name()) {
                        out.push(var.name().to_string());
                    }
                }
            },
        }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Atom(name) if name == "true" => Some(true),
            Self::Atom(name) if name == "false" => Some(false),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Atom(_) => "atom",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Sequence(_) => "sequence",
            Self::Literal(_) => "literal",
            Self::Variable(_) => "variable",
        }
    }
}

/// Canonical bit pattern so that `-0.0 == 0.0` and `NaN == NaN` for hashing.
fn number_key(value: f64) -> u64 {
    if value == 0.0 {
        0
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Atom(a), Self::Atom(b)) | (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => number_key(*a) == number_key(*b),
            (Self::Sequence(a), Self::Sequence(b)) => a == b,
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Variable(a), Self::Variable(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Atom(v) | Self::Text(v) => v.hash(state),
            Self::Number(v) => number_key(*v).hash(state),
            Self::Sequence(items) => items.hash(state),
            Self::Literal(literal) => literal.hash(state),
            Self::Variable(var) => var.hash(state),
        }
    }
}

impl fmt::Display for Term {
    #[allow(clippy::cast_possible_truncation)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(name) => write!(f, "{name}"),
            Self::Number(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{}", *v as i64)
                } else {
                    write!(f, "{v}")
                }
            }
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Sequence(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Self::Literal(literal) => write!(f, "{literal}"),
            Self::Variable(var) => write!(f, "{var}"),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl From<Literal> for Term {
    fn from(value: Literal) -> Self {
        Self::Literal(value)
    }
}

impl From<f64> for Term {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// A named placeholder, optionally carrying its own bound value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Box<Term>>,
}

impl Variable {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// A variable that already carries a value.
    #[must_use]
    pub fn bound(name: impl Into<String>, value: Term) -> Self {
        Self {
            name: name.into(),
            value: Some(Box::new(value)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> Option<&Term> {
        self.value.as_deref()
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.name == ANONYMOUS
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "{value}"),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A structured literal: functor path, ordered arguments and an annotation set.
///
/// # Examples
///
/// ```
/// use bdi_engine::{Literal, Term};
///
/// let fact = Literal::new("father", vec![Term::atom("tom"), Term::atom("bob")])
///     .with_annotation(Literal::new("source", vec![Term::atom("self")]));
/// assert!(fact.is_ground());
/// assert_eq!(fact.to_string(), "father(tom, bob)[source(self)]");
///
/// // annotations do not affect equality
/// assert_eq!(fact, Literal::new("father", vec![Term::atom("tom"), Term::atom("bob")]));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Literal {
    functor: Path,
    #[serde(default)]
    negated: bool,
    #[serde(default)]
    arguments: Vec<Term>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    annotations: Vec<Literal>,
}

impl Literal {
    /// Creates a positive literal. The functor is parsed as a path.
    #[must_use]
    pub fn new(functor: &str, arguments: Vec<Term>) -> Self {
        Self::with_path(Path::new(functor), arguments)
    }

    #[must_use]
    pub const fn with_path(functor: Path, arguments: Vec<Term>) -> Self {
        Self {
            functor,
            negated: false,
            arguments,
            annotations: Vec::new(),
        }
    }

    /// A literal without arguments.
    #[must_use]
    pub fn atom(functor: &str) -> Self {
        Self::new(functor, Vec::new())
    }

    /// Strong negation, `~p(...)`.
    #[must_use]
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Adds an annotation; annotations form a set, duplicates are ignored.
    #[must_use]
    pub fn with_annotation(mut self, annotation: Literal) -> Self {
        if !self.annotations.iter().any(|a| a.identical(&annotation)) {
            self.annotations.push(annotation);
        }
        self
    }

    #[must_use]
    pub fn functor(&self) -> &Path {
        &self.functor
    }

    #[must_use]
    pub const fn is_negated(&self) -> bool {
        self.negated
    }

    #[must_use]
    pub fn arguments(&self) -> &[Term] {
        &self.arguments
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    #[must_use]
    pub fn annotations(&self) -> &[Literal] {
        &self.annotations
    }

    /// First annotation whose functor suffix equals `name`.
    #[must_use]
    pub fn annotation(&self, name: &str) -> Option<&Literal> {
        self.annotations
            .iter()
            .find(|a| a.functor.suffix() == Some(name))
    }

    /// Returns true if neither arguments nor annotations hold unbound variables.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.arguments.iter().all(Term::is_ground)
            && self.annotations.iter().all(Literal::is_ground)
    }

    /// Names of all unbound variables in the arguments, in first-occurrence order.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        for arg in &self.arguments {
            arg.collect_variables(out);
        }
    }

    /// Structural equality that also compares the annotation set.
    #[must_use]
    pub fn identical(&self, other: &Self) -> bool {
        self == other
            && self.annotations.len() == other.annotations.len()
            && self
                .annotations
                .iter()
                .all(|a| other.annotations.iter().any(|b| a.identical(b)))
    }

    /// Same functor, negation and arity.
    #[must_use]
    pub fn same_signature(&self, other: &Self) -> bool {
        self.functor == other.functor
            && self.negated == other.negated
            && self.arguments.len() == other.arguments.len()
    }

    /// Replaces arguments and annotations, keeping functor and negation.
    #[must_use]
    pub(crate) fn rebuild(&self, arguments: Vec<Term>, annotations: Vec<Literal>) -> Self {
        Self {
            functor: self.functor.clone(),
            negated: self.negated,
            arguments,
            annotations,
        }
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        self.functor == other.functor
            && self.negated == other.negated
            && self.arguments == other.arguments
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.functor.hash(state);
        self.negated.hash(state);
        self.arguments.hash(state);
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "~")?;
        }
        write!(f, "{}", self.functor)?;
        if !self.arguments.is_empty() {
            write!(f, "(")?;
            write_list(f, &self.arguments)?;
            write!(f, ")")?;
        }
        if !self.annotations.is_empty() {
            write!(f, "[")?;
            write_list(f, &self.annotations)?;
            write!(f, "]")?;
        }
        Ok(())
    }
}
