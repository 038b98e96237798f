//! Best-error tracking and monotonic search-space tightening.
//!
//! A limit is the lexicographically smallest failing combination seen so far,
//! as an index vector. Traversal only admits index vectors below it. With the
//! per-argument policy, every accepted limit additionally caps each
//! argument's index on its own.

pub mod pending;

use std::cmp::Ordering;

use tessera_ir::value::{Args, Combination, Value};

use crate::domain::resolver::DomainResolver;

use self::pending::{PendingLimit, PendingLimits};

/// Decides, per argument, whether an accepted limit caps that argument's
/// index independently of the lexicographic bound.
pub enum LimitArgPolicy {
    Never,
    Always,
    Predicate(Box<dyn Fn(&ArgLimitContext<'_>) -> bool>),
}

impl LimitArgPolicy {
    fn enforces(&self, ctx: &ArgLimitContext<'_>) -> bool {
        match self {
            LimitArgPolicy::Never => false,
            LimitArgPolicy::Always => true,
            LimitArgPolicy::Predicate(f) => f(ctx),
        }
    }
}

impl From<bool> for LimitArgPolicy {
    fn from(enabled: bool) -> Self {
        if enabled {
            LimitArgPolicy::Always
        } else {
            LimitArgPolicy::Never
        }
    }
}

impl std::fmt::Debug for LimitArgPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitArgPolicy::Never => f.write_str("Never"),
            LimitArgPolicy::Always => f.write_str("Always"),
            LimitArgPolicy::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

/// What the per-argument predicate gets to look at.
#[derive(Debug)]
pub struct ArgLimitContext<'a> {
    pub name: &'a str,
    pub position: usize,
    /// Index of the failing value within its domain.
    pub index: usize,
    pub value: &'a Value,
}

/// The best known failing combination.
#[derive(Debug, Clone)]
pub struct Limit<E> {
    pub combination: Combination,
    pub indexes: Vec<usize>,
    pub error: Option<E>,
    /// Tests executed before this failure was found.
    pub tests: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitOutcome {
    /// Became the new best limit.
    Accepted,
    /// Only the per-cycle count cap was lowered.
    Capped,
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Argument names do not match the configured arguments.
    Malformed,
    /// A value could not be located in its domain.
    Unmapped,
    /// Not lexicographically smaller than the current best.
    NotSmaller,
    /// No explicit combination and nothing has been yielded yet.
    NoCurrent,
    /// An index-only cap that did not lower the current cap.
    NotLower,
}

/// Lexicographic order of index vectors: the first differing position decides.
pub fn compare_indexes(a: &[usize], b: &[usize]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// Index ceilings consulted by the navigator.
#[derive(Debug, Clone)]
pub struct Bounds {
    limit: Option<Vec<usize>>,
    arg_limits: Vec<Option<usize>>,
    include_limit: bool,
}

impl Bounds {
    pub fn new(arity: usize, include_limit: bool) -> Self {
        Self {
            limit: None,
            arg_limits: vec![None; arity],
            include_limit,
        }
    }

    pub fn limit(&self) -> Option<&[usize]> {
        self.limit.as_deref()
    }

    pub fn arg_limit(&self, pos: usize) -> Option<usize> {
        self.arg_limits.get(pos).copied().flatten()
    }

    pub fn include_limit(&self) -> bool {
        self.include_limit
    }

    /// Highest admissible index at `pos`, given the indexes chosen before it.
    /// `None` when the domain is empty.
    ///
    /// The lexicographic ceiling applies only while every earlier position
    /// sits exactly on the limit; once one is below, later positions are free
    /// up to their per-argument cap.
    pub fn max_index(&self, pos: usize, domain_len: usize, chosen: &[usize]) -> Option<usize> {
        if domain_len == 0 {
            return None;
        }
        let mut max = domain_len - 1;
        if let Some(cap) = self.arg_limit(pos) {
            max = max.min(cap);
        }
        if let Some(limit) = &self.limit {
            if limit.len() > pos && chosen == &limit[..pos] {
                max = max.min(limit[pos]);
            }
        }
        Some(max)
    }

    /// The limit point itself while it is not admissible.
    pub fn is_excluded_point(&self, indexes: &[usize]) -> bool {
        !self.include_limit && self.limit.as_deref() == Some(indexes)
    }

    /// Lexicographically past the limit (or on it, when it is excluded).
    pub fn is_beyond(&self, indexes: &[usize]) -> bool {
        match &self.limit {
            Some(limit) => match compare_indexes(indexes, limit) {
                Ordering::Greater => true,
                Ordering::Equal => !self.include_limit,
                Ordering::Less => false,
            },
            None => false,
        }
    }

    fn tighten_arg(&mut self, pos: usize, index: usize) {
        let slot = &mut self.arg_limits[pos];
        *slot = Some(slot.map_or(index, |cap| cap.min(index)));
    }
}

/// Owns the best limit, the per-argument ceilings, the per-cycle count cap,
/// and the queue of limits not yet applied to the live traversal position.
pub struct LimitEngine<E> {
    best: Option<Limit<E>>,
    bounds: Bounds,
    policy: LimitArgPolicy,
    count: Option<u64>,
    pending: PendingLimits,
}

impl<E> LimitEngine<E> {
    pub fn new(arity: usize, policy: LimitArgPolicy, include_error_variant: bool) -> Self {
        Self {
            best: None,
            bounds: Bounds::new(arity, include_error_variant),
            policy,
            count: None,
            pending: PendingLimits::new(),
        }
    }

    pub fn best(&self) -> Option<&Limit<E>> {
        self.best.as_ref()
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Per-cycle cap on yielded combinations.
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Lower the per-cycle count cap. Never raises it.
    pub fn cap(&mut self, index: u64) -> bool {
        match self.count {
            Some(current) if current <= index => false,
            _ => {
                log::debug!("count capped at {index}");
                self.count = Some(index);
                true
            }
        }
    }

    /// Offer a mapped candidate. Accepted only if strictly smaller than the
    /// current best (or if there is none); accepted limits only ever tighten.
    pub fn offer(
        &mut self,
        combination: Combination,
        indexes: Vec<usize>,
        error: Option<E>,
        tests: u64,
    ) -> LimitOutcome {
        if let Some(best) = &self.best {
            if compare_indexes(&indexes, &best.indexes) != Ordering::Less {
                log::debug!(
                    "limit {:?} rejected, not below {:?}",
                    indexes,
                    best.indexes
                );
                return LimitOutcome::Rejected(RejectReason::NotSmaller);
            }
        }

        for (pos, ((name, value), &index)) in combination.args.iter().zip(&indexes).enumerate() {
            let ctx = ArgLimitContext {
                name,
                position: pos,
                index,
                value,
            };
            if self.policy.enforces(&ctx) {
                self.bounds.tighten_arg(pos, index);
            }
        }

        log::debug!("limit accepted at {:?} after {} tests", indexes, tests);
        self.bounds.limit = Some(indexes.clone());
        self.pending.push(PendingLimit {
            indexes: indexes.clone(),
            tests,
        });
        self.best = Some(Limit {
            combination,
            indexes,
            error,
            tests,
        });
        LimitOutcome::Accepted
    }

    /// Drain limits not yet applied to the live position.
    pub fn take_pending(&mut self) -> Vec<PendingLimit> {
        self.pending.drain()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl<E: std::fmt::Debug> std::fmt::Debug for LimitEngine<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitEngine")
            .field("best", &self.best)
            .field("bounds", &self.bounds)
            .field("policy", &self.policy)
            .field("count", &self.count)
            .finish()
    }
}

/// Map a candidate's values to per-position indexes, in configured order.
///
/// Each position is resolved against the candidate's own prefix; unseen
/// values extend their domain so replayed failures stay reproducible.
/// Returns the canonical (configuration-ordered) args alongside.
pub fn map_candidate(
    resolver: &mut DomainResolver,
    args: &Args,
) -> Result<(Args, Vec<usize>), RejectReason> {
    if args.len() != resolver.len() {
        return Err(RejectReason::Malformed);
    }
    let mut prefix = Args::new();
    let mut indexes = Vec::with_capacity(resolver.len());
    for pos in 0..resolver.len() {
        let name = resolver.name(pos).to_string();
        let value = args.get(&name).ok_or(RejectReason::Malformed)?.clone();
        let index = resolver
            .index_of(pos, &prefix, &value)
            .ok_or(RejectReason::Unmapped)?;
        indexes.push(index);
        prefix.push(name, value);
    }
    Ok((prefix, indexes))
}
