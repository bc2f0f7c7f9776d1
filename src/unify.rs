//! Unification engine.
//!
//! [`unify`] computes a [`Substitution`] that makes two terms structurally
//! equal. Failure is an expected, frequent outcome (plan search probes many
//! heads) and is reported as [`UnifyFail`], never as an engine error.
//!
//! No occurs check is performed: unifying `X` with `f(X)` succeeds and leaves
//! a cyclic binding that [`Substitution::apply`] cannot resolve. Terms handed
//! to the engine are assumed to be free of such cycles.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::term::{Literal, Term};

/// The two terms do not unify.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("terms do not unify")]
pub struct UnifyFail;

/// Mapping from variable name to term.
///
/// Ordered by name so iteration and display are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Substitution {
    bindings: BTreeMap<String, Term>,
}

impl Substitution {
    /// Creates an empty substitution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The raw binding of `name`, not resolved through other variables.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Term> {
        self.bindings.get(name)
    }

    /// The fully resolved value of `name`, if it is bound.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<Term> {
        self.bindings.get(name).map(|t| self.apply(t))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Binds (or rebinds) a variable.
    pub fn bind(&mut self, name: impl Into<String>, term: Term) {
        self.bindings.insert(name.into(), term);
    }

    /// Binds `name` for assignment.
    ///
    /// If `name` is an alias for another unbound variable, the end of the
    /// alias chain is bound instead, so every alias sees the value.
    pub fn assign(&mut self, name: &str, term: Term) {
        let mut current = name.to_string();
        for _ in 0..=self.bindings.len() {
            match self.bindings.get(&current) {
                Some(Term::Variable(var))
                    if var.value().is_none() && !var.is_anonymous() && var.name() != current =>
                {
                    current = var.name().to_string();
                }
                _ => break,
            }
        }
        self.bindings.insert(current, term);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Follows one step of binding for a variable term.
    fn lookup<'a>(&'a self, term: &'a Term) -> Option<&'a Term> {
        match term {
            Term::Variable(var) => match var.value() {
                Some(value) => Some(value),
                None if var.is_anonymous() => None,
                None => self.bindings.get(var.name()),
            },
            _ => None,
        }
    }

    /// Replaces every bound variable, transitively. Unbound variables pass
    /// through unchanged.
    #[must_use]
    pub fn apply(&self, term: &Term) -> Term {
        match term {
            Term::Variable(_) => match self.lookup(term) {
                Some(bound) => self.apply(bound),
                None => term.clone(),
            },
            Term::Sequence(items) => Term::Sequence(items.iter().map(|t| self.apply(t)).collect()),
            Term::Literal(literal) => Term::Literal(self.apply_literal(literal)),
            Term::Atom(_) | Term::Number(_) | Term::Text(_) => term.clone(),
        }
    }

    /// [`apply`](Self::apply) for a literal, covering arguments and annotations.
    #[must_use]
    pub fn apply_literal(&self, literal: &Literal) -> Literal {
        literal.rebuild(
            literal.arguments().iter().map(|t| self.apply(t)).collect(),
            literal
                .annotations()
                .iter()
                .map(|a| self.apply_literal(a))
                .collect(),
        )
    }

    /// Composes `self` with `other`.
    ///
    /// Applying the result equals applying `self` and then `other` until no
    /// bound variable remains. Bindings of `self` win on conflict.
    #[must_use]
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut merged = self.bindings.clone();
        for (name, term) in &other.bindings {
            merged.entry(name.clone()).or_insert_with(|| term.clone());
        }
        let merged = Substitution { bindings: merged };
        let bindings = merged
            .bindings
            .iter()
            .map(|(name, term)| (name.clone(), merged.apply(term)))
            .collect();
        Substitution { bindings }
    }

    /// Keeps only the bindings for `names`, resolved.
    #[must_use]
    pub fn restrict(&self, names: &[String]) -> Substitution {
        let bindings = names
            .iter()
            .filter_map(|n| self.value(n).map(|v| (n.clone(), v)))
            .collect();
        Substitution { bindings }
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (name, term)) in self.bindings.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name} -> {term}")?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(String, Term)> for Substitution {
    fn from_iter<T: IntoIterator<Item = (String, Term)>>(iter: T) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

/// Unifies two terms under an existing substitution.
///
/// On success the returned substitution extends `existing`. On failure
/// nothing leaks: `existing` is untouched and the scratch copy is dropped.
///
/// # Examples
///
/// ```
/// use bdi_engine::{unify, Literal, Substitution, Term};
///
/// let pattern = Term::from(Literal::new("father", vec![Term::var("X"), Term::var("Y")]));
/// let fact = Term::from(Literal::new("father", vec![Term::atom("tom"), Term::atom("bob")]));
///
/// let subst = unify(&pattern, &fact, &Substitution::new()).unwrap();
/// assert_eq!(subst.value("X"), Some(Term::atom("tom")));
/// assert_eq!(subst.apply(&pattern), fact);
/// ```
pub fn unify(a: &Term, b: &Term, existing: &Substitution) -> Result<Substitution, UnifyFail> {
    let mut scratch = existing.clone();
    unify_terms(a, b, &mut scratch)?;
    Ok(scratch)
}

/// [`unify`] for two literals. Annotations are ignored.
pub fn unify_literals(
    a: &Literal,
    b: &Literal,
    existing: &Substitution,
) -> Result<Substitution, UnifyFail> {
    let mut scratch = existing.clone();
    unify_literal_args(a, b, &mut scratch)?;
    Ok(scratch)
}

fn unify_literal_args(a: &Literal, b: &Literal, s: &mut Substitution) -> Result<(), UnifyFail> {
    if !a.same_signature(b) {
        return Err(UnifyFail);
    }
    // left to right, later arguments see earlier bindings
    for (x, y) in a.arguments().iter().zip(b.arguments()) {
        unify_terms(x, y, s)?;
    }
    Ok(())
}

fn unify_terms(a: &Term, b: &Term, s: &mut Substitution) -> Result<(), UnifyFail> {
    if is_anonymous(a) || is_anonymous(b) {
        return Ok(());
    }
    if let Some(bound) = s.lookup(a) {
        let bound = bound.clone();
        return unify_terms(&bound, b, s);
    }
    if let Some(bound) = s.lookup(b) {
        let bound = bound.clone();
        return unify_terms(a, &bound, s);
    }

    match (a, b) {
        (Term::Variable(x), Term::Variable(y)) if x.name() == y.name() => Ok(()),
        (Term::Variable(x), _) => {
            s.bind(x.name(), b.clone());
            Ok(())
        }
        (_, Term::Variable(y)) => {
            s.bind(y.name(), a.clone());
            Ok(())
        }
        (Term::Atom(_), Term::Atom(_))
        | (Term::Number(_), Term::Number(_))
        | (Term::Text(_), Term::Text(_)) => {
            if a == b {
                Ok(())
            } else {
                Err(UnifyFail)
            }
        }
        (Term::Sequence(xs), Term::Sequence(ys)) => {
            if xs.len() != ys.len() {
                return Err(UnifyFail);
            }
            for (x, y) in xs.iter().zip(ys) {
                unify_terms(x, y, s)?;
            }
            Ok(())
        }
        (Term::Literal(x), Term::Literal(y)) => unify_literal_args(x, y, s),
        _ => Err(UnifyFail),
    }
}

fn is_anonymous(term: &Term) -> bool {
    matches!(term, Term::Variable(v) if v.is_anonymous() && v.value().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Variable;

    fn lit(functor: &str, args: Vec<Term>) -> Term {
        Term::from(Literal::new(functor, args))
    }

    fn ground_samples() -> Vec<Term> {
        vec![
            Term::atom("tom"),
            Term::number(1.0),
            Term::text("tom"),
            lit("father", vec![Term::atom("tom"), Term::atom("bob")]),
            lit("father", vec![Term::atom("tom"), Term::atom("ann")]),
            lit("mother", vec![Term::atom("tom"), Term::atom("bob")]),
            Term::sequence(vec![Term::number(1.0), Term::number(2.0)]),
        ]
    }

    #[test]
    fn test_constants() {
        let empty = Substitution::new();
        assert!(unify(&Term::atom("a"), &Term::atom("a"), &empty).is_ok());
        assert!(unify(&Term::atom("a"), &Term::atom("b"), &empty).is_err());
        assert!(unify(&Term::number(2.0), &Term::number(2.0), &empty).is_ok());
        assert!(unify(&Term::atom("a"), &Term::text("a"), &empty).is_err());
    }

    #[test]
    fn test_symmetric_for_ground_terms() {
        let empty = Substitution::new();
        for a in ground_samples() {
            for b in ground_samples() {
                let ab = unify(&a, &b, &empty);
                let ba = unify(&b, &a, &empty);
                assert_eq!(ab.is_ok(), ba.is_ok(), "{a} vs {b}");
                if let (Ok(s1), Ok(s2)) = (ab, ba) {
                    assert_eq!(s1.apply(&a), s1.apply(&b));
                    assert_eq!(s2.apply(&a), s2.apply(&b));
                }
            }
        }
    }

    #[test]
    fn test_variable_binding_and_apply() {
        let pattern = lit("p", vec![Term::var("X"), Term::atom("b")]);
        let target = lit("p", vec![Term::number(3.0), Term::atom("b")]);
        let s = unify(&pattern, &target, &Substitution::new()).unwrap();
        assert_eq!(s.get("X"), Some(&Term::number(3.0)));
        assert_eq!(s.apply(&pattern), target);
    }

    #[test]
    fn test_later_arguments_see_earlier_bindings() {
        let pattern = lit("p", vec![Term::var("X"), Term::var("X")]);
        let same = lit("p", vec![Term::atom("a"), Term::atom("a")]);
        let differ = lit("p", vec![Term::atom("a"), Term::atom("b")]);
        assert!(unify(&pattern, &same, &Substitution::new()).is_ok());
        assert!(unify(&pattern, &differ, &Substitution::new()).is_err());
    }

    #[test]
    fn test_existing_bindings_are_respected() {
        let mut existing = Substitution::new();
        existing.bind("X", Term::atom("tom"));
        let pattern = lit("father", vec![Term::var("X"), Term::var("Y")]);

        let ok = lit("father", vec![Term::atom("tom"), Term::atom("bob")]);
        let s = unify(&pattern, &ok, &existing).unwrap();
        assert_eq!(s.value("Y"), Some(Term::atom("bob")));

        let bad = lit("father", vec![Term::atom("sam"), Term::atom("bob")]);
        assert_eq!(unify(&pattern, &bad, &existing), Err(UnifyFail));
        // failure leaves the input untouched
        assert_eq!(existing.len(), 1);
    }

    #[test]
    fn test_variable_chains_resolve() {
        let s = unify(&Term::var("X"), &Term::var("Y"), &Substitution::new()).unwrap();
        let s = unify(&Term::var("Y"), &Term::atom("z"), &s).unwrap();
        assert_eq!(s.apply(&Term::var("X")), Term::atom("z"));
        assert_eq!(s.value("X"), Some(Term::atom("z")));
    }

    #[test]
    fn test_anonymous_never_binds() {
        let pattern = lit("p", vec![Term::var("_"), Term::var("_")]);
        let target = lit("p", vec![Term::atom("a"), Term::atom("b")]);
        let s = unify(&pattern, &target, &Substitution::new()).unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn test_self_bound_variable() {
        let bound = Term::Variable(Variable::bound("X", Term::number(4.0)));
        assert!(unify(&bound, &Term::number(4.0), &Substitution::new()).is_ok());
        assert!(unify(&bound, &Term::number(5.0), &Substitution::new()).is_err());
    }

    #[test]
    fn test_signature_mismatch() {
        let empty = Substitution::new();
        let a = Literal::new("p", vec![Term::var("X")]);
        assert!(unify_literals(&a, &Literal::new("p", vec![]), &empty).is_err());
        assert!(unify_literals(&a, &Literal::new("q", vec![Term::atom("a")]), &empty).is_err());
        assert!(unify_literals(&a, &Literal::new("p", vec![Term::atom("a")]).negate(), &empty).is_err());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let pattern = lit(
            "p",
            vec![Term::var("X"), Term::sequence(vec![Term::var("Y"), Term::var("Z")])],
        );
        let target = lit(
            "p",
            vec![Term::var("Y"), Term::sequence(vec![Term::atom("b"), Term::var("W")])],
        );
        let s = unify(&pattern, &target, &Substitution::new()).unwrap();
        let once = s.apply(&pattern);
        assert_eq!(s.apply(&once), once);
        assert_eq!(once, s.apply(&target));
    }

    #[test]
    fn test_compose_matches_sequential_apply() {
        let mut first = Substitution::new();
        first.bind("X", Term::var("Y"));
        let mut second = Substitution::new();
        second.bind("Y", Term::number(7.0));
        second.bind("Z", Term::atom("q"));

        let term = lit("p", vec![Term::var("X"), Term::var("Z")]);
        let composed = first.compose(&second);
        assert_eq!(composed.apply(&term), second.apply(&first.apply(&term)));
        assert_eq!(composed.get("X"), Some(&Term::number(7.0)));
    }

    #[test]
    fn test_assign_binds_alias_target() {
        let mut s = Substitution::new();
        s.bind("F", Term::var("X#1"));
        s.assign("F", Term::number(5.0));
        assert_eq!(s.value("X#1"), Some(Term::number(5.0)));
        assert_eq!(s.value("F"), Some(Term::number(5.0)));

        // a bound value is simply replaced
        s.assign("F", Term::number(6.0));
        assert_eq!(s.value("F"), Some(Term::number(6.0)));
    }

    #[test]
    fn test_restrict() {
        let mut s = Substitution::new();
        s.bind("X", Term::var("Y"));
        s.bind("Y", Term::atom("a"));
        let r = s.restrict(&["X".to_string()]);
        assert_eq!(r.len(), 1);
        assert_eq!(r.get("X"), Some(&Term::atom("a")));
    }
}
