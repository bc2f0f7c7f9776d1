//! The belief base: a set of ground literals partitioned by functor path.

use std::collections::btree_map::Range;
use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;

use crate::error::{EngineResult, ValidationError};
use crate::path::Path;
use crate::term::Literal;
use crate::unify::{unify_literals, Substitution};

use super::event::{BeliefEvent, BeliefEventKind};
use super::probe::{BeliefProbe, ProbeConfig, ProbeHub};

/// Set of ground literals with change-event generation.
///
/// Literals under one path keep insertion order, and paths iterate in
/// lexicographic order, so every query is deterministic. Each successful
/// mutation queues exactly one event per literal added or removed (one event
/// in total for an in-place update).
///
/// # Examples
///
/// ```
/// use bdi_engine::{BeliefBase, Literal, Path, Term};
///
/// let mut beliefs = BeliefBase::new();
/// let fact = Literal::new("father", vec![Term::atom("tom"), Term::atom("bob")]);
/// assert!(beliefs.add(fact.clone()).unwrap());
/// assert!(!beliefs.add(fact).unwrap());
///
/// assert_eq!(beliefs.query(&Path::new("father")).count(), 1);
/// assert_eq!(beliefs.drain_events().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct BeliefBase {
    by_path: BTreeMap<Path, Vec<Literal>>,
    len: usize,
    events: VecDeque<BeliefEvent>,
    sequence: u64,
    probes: ProbeHub,
}

impl BeliefBase {
    /// Creates an empty belief base.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if a literal with the same functor, arguments and
    /// annotation set is stored.
    #[must_use]
    pub fn contains(&self, literal: &Literal) -> bool {
        self.by_path
            .get(literal.functor())
            .is_some_and(|bucket| bucket.iter().any(|l| l.identical(literal)))
    }

    /// Adds a ground literal.
    ///
    /// Returns `Ok(false)` without emitting an event if the literal is
    /// already stored.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NonGroundLiteral` or
    /// `ValidationError::EmptyFunctor` for literals that cannot be beliefs.
    pub fn add(&mut self, literal: Literal) -> EngineResult<bool> {
        validate(&literal)?;
        if !self.insert(literal.clone()) {
            return Ok(false);
        }
        self.emit(BeliefEventKind::Add, literal, None);
        Ok(true)
    }

    /// Removes a literal, emitting a Remove event only if it existed.
    ///
    /// An exact match (annotations included) is preferred; a literal given
    /// without annotations also removes the first stored literal equal to it.
    pub fn remove(&mut self, literal: &Literal) -> bool {
        match self.take(literal) {
            Some(removed) => {
                self.emit(BeliefEventKind::Remove, removed, None);
                true
            }
            None => false,
        }
    }

    /// Replaces `old` by `new`.
    ///
    /// When both share a functor and `old` existed, a single Update event is
    /// emitted. Otherwise this behaves as a remove followed by an add, each
    /// emitting its own event if it changed anything.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `new` cannot be a belief; nothing is
    /// changed in that case.
    pub fn update(&mut self, old: &Literal, new: Literal) -> EngineResult<bool> {
        validate(&new)?;
        let removed = self.take(old);
        let added = self.insert(new.clone());

        match (removed, added) {
            (Some(previous), true) if previous.functor() == new.functor() => {
                self.emit(BeliefEventKind::Update, new, Some(previous));
            }
            (Some(previous), true) => {
                self.emit(BeliefEventKind::Remove, previous, None);
                self.emit(BeliefEventKind::Add, new, None);
            }
            (Some(previous), false) => self.emit(BeliefEventKind::Remove, previous, None),
            (None, true) => self.emit(BeliefEventKind::Add, new, None),
            (None, false) => return Ok(false),
        }
        Ok(true)
    }

    /// Literals whose functor starts with `prefix`, lazily.
    ///
    /// The iterator is `Clone`, so a query can be restarted from any point.
    pub fn query<'a>(&'a self, prefix: &'a Path) -> Query<'a> {
        let empty: &'a [Literal] = &[];
        Query {
            range: self
                .by_path
                .range::<Path, _>((Bound::Included(prefix), Bound::Unbounded)),
            prefix,
            current: empty.iter(),
        }
    }

    /// All stored literals in path order.
    pub fn iter(&self) -> impl Iterator<Item = &Literal> + Clone {
        self.by_path.values().flatten()
    }

    /// Unifies `pattern` against every literal stored under its exact
    /// functor and yields each extended substitution.
    pub fn unify_query<'a>(
        &'a self,
        pattern: &'a Literal,
        bindings: &'a Substitution,
    ) -> impl Iterator<Item = (&'a Literal, Substitution)> + 'a {
        self.by_path
            .get(pattern.functor())
            .into_iter()
            .flatten()
            .filter_map(move |literal| {
                unify_literals(pattern, literal, bindings)
                    .ok()
                    .map(|s| (literal, s))
            })
    }

    /// Takes every queued event in emission order.
    pub fn drain_events(&mut self) -> Vec<BeliefEvent> {
        self.events.drain(..).collect()
    }

    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Subscribes an external observer to future events.
    pub fn subscribe(&mut self, config: &ProbeConfig) -> BeliefProbe {
        self.probes.subscribe(config)
    }

    /// Events lost by slow probes so far.
    #[must_use]
    pub fn dropped_probe_events(&self) -> u64 {
        self.probes.dropped()
    }

    fn insert(&mut self, literal: Literal) -> bool {
        let bucket = self.by_path.entry(literal.functor().clone()).or_default();
        if bucket.iter().any(|l| l.identical(&literal)) {
            return false;
        }
        bucket.push(literal);
        self.len += 1;
        true
    }

    fn take(&mut self, literal: &Literal) -> Option<Literal> {
        let bucket = self.by_path.get_mut(literal.functor())?;
        let index = bucket
            .iter()
            .position(|l| l.identical(literal))
            .or_else(|| {
                if literal.annotations().is_empty() {
                    bucket.iter().position(|l| l == literal)
                } else {
                    None
                }
            })?;
        let removed = bucket.remove(index);
        if bucket.is_empty() {
            self.by_path.remove(literal.functor());
        }
        self.len -= 1;
        Some(removed)
    }

    fn emit(&mut self, kind: BeliefEventKind, literal: Literal, previous: Option<Literal>) {
        self.sequence += 1;
        let event = BeliefEvent {
            kind,
            literal,
            previous,
            sequence: self.sequence,
        };
        self.probes.publish(&event);
        self.events.push_back(event);
    }
}

fn validate(literal: &Literal) -> Result<(), ValidationError> {
    if literal.functor().is_empty() {
        return Err(ValidationError::EmptyFunctor);
    }
    if !literal.is_ground() {
        return Err(ValidationError::NonGroundLiteral {
            literal: literal.to_string(),
        });
    }
    Ok(())
}

/// Lazy prefix query over a [`BeliefBase`].
#[derive(Debug, Clone)]
pub struct Query<'a> {
    range: Range<'a, Path, Vec<Literal>>,
    prefix: &'a Path,
    current: std::slice::Iter<'a, Literal>,
}

impl<'a> Iterator for Query<'a> {
    type Item = &'a Literal;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(literal) = self.current.next() {
                return Some(literal);
            }
            let (path, bucket) = self.range.next()?;
            // prefix runs are contiguous in path order
            if !path.starts_with(self.prefix) {
                return None;
            }
            self.current = bucket.iter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    fn lit(functor: &str, args: &[&str]) -> Literal {
        Literal::new(functor, args.iter().map(|a| Term::atom(*a)).collect())
    }

    #[test]
    fn test_add_is_set_semantic() {
        let mut base = BeliefBase::new();
        assert!(base.add(lit("father", &["tom", "bob"])).unwrap());
        assert!(!base.add(lit("father", &["tom", "bob"])).unwrap());
        assert_eq!(base.len(), 1);

        let events = base.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, BeliefEventKind::Add);
        assert_eq!(events[0].sequence, 1);
    }

    #[test]
    fn test_annotation_set_distinguishes_beliefs() {
        let mut base = BeliefBase::new();
        let plain = lit("p", &["a"]);
        let annotated = plain.clone().with_annotation(lit("source", &["percept"]));
        assert!(base.add(plain.clone()).unwrap());
        assert!(base.add(annotated.clone()).unwrap());
        assert_eq!(base.len(), 2);
        assert!(base.contains(&annotated));

        // exact match wins over the annotation-free fallback
        assert!(base.remove(&annotated));
        assert!(base.contains(&plain));
        assert!(!base.contains(&annotated));
    }

    #[test]
    fn test_add_rejects_non_ground() {
        let mut base = BeliefBase::new();
        let err = base
            .add(Literal::new("p", vec![Term::var("X")]))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(base.add(Literal::with_path(Path::root(), vec![])).is_err());
        assert_eq!(base.pending_events(), 0);
    }

    #[test]
    fn test_remove_emits_only_if_present() {
        let mut base = BeliefBase::new();
        assert!(!base.remove(&lit("p", &["a"])));
        assert_eq!(base.pending_events(), 0);

        base.add(lit("p", &["a"]).with_annotation(lit("source", &["self"])))
            .unwrap();
        base.drain_events();
        // annotation-free literal removes the annotated belief
        assert!(base.remove(&lit("p", &["a"])));
        let events = base.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, BeliefEventKind::Remove);
        assert!(base.is_empty());
    }

    #[test]
    fn test_update_same_functor_emits_single_event() {
        let mut base = BeliefBase::new();
        base.add(lit("temp", &["low"])).unwrap();
        base.drain_events();

        assert!(base.update(&lit("temp", &["low"]), lit("temp", &["high"])).unwrap());
        let events = base.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, BeliefEventKind::Update);
        assert_eq!(events[0].literal, lit("temp", &["high"]));
        assert_eq!(events[0].previous, Some(lit("temp", &["low"])));
        assert_eq!(base.len(), 1);
    }

    #[test]
    fn test_update_different_functor_emits_two_events() {
        let mut base = BeliefBase::new();
        base.add(lit("cold", &[])).unwrap();
        base.drain_events();

        base.update(&lit("cold", &[]), lit("warm", &[])).unwrap();
        let kinds: Vec<_> = base.drain_events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![BeliefEventKind::Remove, BeliefEventKind::Add]);
    }

    #[test]
    fn test_update_missing_old_is_add() {
        let mut base = BeliefBase::new();
        base.update(&lit("temp", &["low"]), lit("temp", &["high"])).unwrap();
        let events = base.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, BeliefEventKind::Add);

        assert!(!base.update(&lit("temp", &["low"]), lit("temp", &["high"])).unwrap());
        assert_eq!(base.pending_events(), 0);
    }

    #[test]
    fn test_prefix_query() {
        let mut base = BeliefBase::new();
        base.add(lit("second/sub3", &["x"])).unwrap();
        base.add(lit("first/sub1", &["a"])).unwrap();
        base.add(lit("firstx", &["no"])).unwrap();
        base.add(lit("first/sub2", &["b"])).unwrap();
        base.add(lit("first/sub1", &["c"])).unwrap();

        let prefix = Path::new("first");
        let found: Vec<String> = base.query(&prefix).map(ToString::to_string).collect();
        assert_eq!(found, vec!["first/sub1(a)", "first/sub1(c)", "first/sub2(b)"]);

        // restartable and stable
        let query = base.query(&prefix);
        assert_eq!(query.clone().count(), 3);
        assert_eq!(query.count(), 3);
        assert_eq!(base.query(&Path::root()).count(), 5);
    }

    #[test]
    fn test_unify_query() {
        let mut base = BeliefBase::new();
        base.add(lit("father", &["tom", "bob"])).unwrap();
        base.add(lit("father", &["tom", "ann"])).unwrap();
        base.add(lit("father", &["sam", "joe"])).unwrap();

        let pattern = Literal::new("father", vec![Term::atom("tom"), Term::var("C")]);
        let children: Vec<Term> = base
            .unify_query(&pattern, &Substitution::new())
            .filter_map(|(_, s)| s.value("C"))
            .collect();
        assert_eq!(children, vec![Term::atom("bob"), Term::atom("ann")]);
    }

    #[test]
    fn test_probe_receives_events_and_counts_drops() {
        let mut base = BeliefBase::new();
        let probe = base.subscribe(&ProbeConfig { capacity: 1 });
        base.add(lit("a", &[])).unwrap();
        base.add(lit("b", &[])).unwrap();

        let seen = probe.drain();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].literal, lit("a", &[]));
        assert_eq!(probe.dropped(), 1);
        // the agent queue never drops
        assert_eq!(base.pending_events(), 2);
    }

    #[test]
    fn test_dropped_probe_is_pruned() {
        let mut base = BeliefBase::new();
        drop(base.subscribe(&ProbeConfig::default()));
        base.add(lit("a", &[])).unwrap();
        assert_eq!(base.dropped_probe_events(), 0);
    }
}
