//! Mixed-radix counter over argument positions.
//!
//! The current combination is an index per position plus the domain resolved
//! for that position under the current prefix. The last argument is the least
//! significant digit. Changing a digit re-resolves every digit to its right,
//! since dynamic domains depend on the prefix.
//!
//! All walks use an explicit position cursor (no recursion), so the state
//! is always a plain index array that can be snapshotted and replayed.

use rand::Rng;
use tessera_ir::value::{Args, Value};

use crate::domain::resolver::DomainResolver;
use crate::limit::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct Navigator {
    names: Vec<String>,
    indexes: Vec<usize>,
    /// Resolved domain per position, valid for the current prefix.
    domains: Vec<Vec<Value>>,
    /// Resolver generation each buffer was filled at.
    resolved_at: Vec<Option<u64>>,
    /// Values for the chosen positions, in order. Full when `started`.
    prefix: Args,
    /// A full combination is current.
    started: bool,
    /// The position was pushed past a new limit and could not be snapped
    /// back onto it; the current forward pass is over.
    spent: bool,
}

impl Navigator {
    pub fn new(names: Vec<String>) -> Self {
        let arity = names.len();
        Self {
            names,
            indexes: vec![0; arity],
            domains: vec![Vec::new(); arity],
            resolved_at: vec![None; arity],
            prefix: Args::new(),
            started: false,
            spent: false,
        }
    }

    pub fn arity(&self) -> usize {
        self.names.len()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Index vector of the current combination.
    pub fn indexes(&self) -> Option<&[usize]> {
        self.started.then_some(&self.indexes[..])
    }

    /// Values of the current combination.
    pub fn args(&self) -> Option<&Args> {
        self.started.then_some(&self.prefix)
    }

    /// Back to "uninitialized": the next step starts a fresh pass.
    pub fn reset(&mut self) {
        self.started = false;
        self.spent = false;
        self.prefix.truncate(0);
    }

    /// Step to the next admissible combination in ascending order.
    /// Returns false (and resets) once the pass is exhausted.
    pub fn advance(&mut self, resolver: &DomainResolver, bounds: &Bounds) -> bool {
        if self.spent {
            self.reset();
            return false;
        }
        if !self.started {
            return self.walk(0, true, Direction::Up, resolver, bounds);
        }
        match self.arity() {
            0 => {
                self.reset();
                false
            }
            k => self.walk(k - 1, false, Direction::Up, resolver, bounds),
        }
    }

    /// Step to the next admissible combination in descending order. A fresh
    /// pass starts at the largest admissible combination.
    pub fn retreat(&mut self, resolver: &DomainResolver, bounds: &Bounds) -> bool {
        if self.spent {
            self.spent = false;
            self.started = false;
        }
        if !self.started {
            return self.walk(0, true, Direction::Down, resolver, bounds);
        }
        match self.arity() {
            0 => {
                self.reset();
                false
            }
            k => self.walk(k - 1, false, Direction::Down, resolver, bounds),
        }
    }

    /// Sample every position independently within its admissible range.
    ///
    /// Dead ends (an empty domain under the sampled prefix) and the excluded
    /// limit point fall back to the nearest admissible predecessor, then to
    /// the nearest successor. Returns false only if neither exists.
    pub fn random_pick<R: Rng + ?Sized>(
        &mut self,
        resolver: &DomainResolver,
        bounds: &Bounds,
        rng: &mut R,
    ) -> bool {
        self.started = false;
        self.spent = false;
        for pos in 0..self.arity() {
            self.ensure_domain(pos, true, resolver);
            match bounds.max_index(pos, self.domains[pos].len(), &self.indexes[..pos]) {
                Some(max) => {
                    let index = rng.gen_range(0..=max);
                    self.choose(pos, index);
                }
                None => return self.fall_back(pos, resolver, bounds),
            }
        }
        if bounds.is_excluded_point(&self.indexes) {
            return self.fall_back(self.arity(), resolver, bounds);
        }
        self.started = true;
        true
    }

    /// Reposition onto a saved index vector, validating each index against
    /// the current domains and bounds. On failure the navigator is reset.
    pub fn restore(&mut self, saved: &[usize], resolver: &DomainResolver, bounds: &Bounds) -> bool {
        self.reset();
        if saved.len() != self.arity() || !self.replay(saved, resolver, bounds) {
            self.reset();
            return false;
        }
        if bounds.is_excluded_point(&self.indexes) {
            self.reset();
            return false;
        }
        self.started = true;
        true
    }

    /// Apply a newly accepted limit to the live position. If the current
    /// combination lies past it, snap onto the limit point so the next
    /// descending step lands on its nearest predecessor and the next
    /// ascending step ends the pass. Returns true if the position moved.
    pub fn clamp(&mut self, resolver: &DomainResolver, bounds: &Bounds) -> bool {
        if !self.started || !bounds.is_beyond(&self.indexes) {
            return false;
        }
        let Some(limit) = bounds.limit().map(<[usize]>::to_vec) else {
            return false;
        };
        log::debug!("position {:?} is past limit {:?}", self.indexes, limit);
        if self.replay(&limit, resolver, bounds) {
            self.started = true;
        } else {
            self.reset();
            self.spent = true;
        }
        true
    }

    fn fall_back(&mut self, pos: usize, resolver: &DomainResolver, bounds: &Bounds) -> bool {
        if pos == 0 {
            self.reset();
            return false;
        }
        let chosen = self.indexes[..pos].to_vec();
        if self.walk(pos - 1, false, Direction::Down, resolver, bounds) {
            return true;
        }
        if !self.replay(&chosen, resolver, bounds) {
            return false;
        }
        self.walk(pos - 1, false, Direction::Up, resolver, bounds)
    }

    /// Re-choose `indexes` for positions `0..indexes.len()`.
    fn replay(&mut self, indexes: &[usize], resolver: &DomainResolver, bounds: &Bounds) -> bool {
        self.started = false;
        for (pos, &index) in indexes.iter().enumerate() {
            self.ensure_domain(pos, true, resolver);
            match bounds.max_index(pos, self.domains[pos].len(), &self.indexes[..pos]) {
                Some(max) if index <= max => self.choose(pos, index),
                _ => {
                    self.reset();
                    return false;
                }
            }
        }
        true
    }

    /// Drive the counter from `pos`.
    ///
    /// `entering`: `pos` has no chosen index yet and takes its first value in
    /// `dir` (0 going up, max going down). Otherwise the index at `pos` is
    /// stepped one in `dir`, carrying leftward when it cannot move.
    fn walk(
        &mut self,
        mut pos: usize,
        mut entering: bool,
        dir: Direction,
        resolver: &DomainResolver,
        bounds: &Bounds,
    ) -> bool {
        let arity = self.arity();
        loop {
            if entering {
                if pos == arity {
                    if bounds.is_excluded_point(&self.indexes) {
                        // Ascending, the limit point is the last admissible
                        // slot; descending, skip it.
                        if dir == Direction::Up || arity == 0 {
                            self.reset();
                            return false;
                        }
                        entering = false;
                        pos = arity - 1;
                        continue;
                    }
                    self.started = true;
                    return true;
                }
                self.ensure_domain(pos, true, resolver);
                match bounds.max_index(pos, self.domains[pos].len(), &self.indexes[..pos]) {
                    Some(max) => {
                        let index = match dir {
                            Direction::Up => 0,
                            Direction::Down => max,
                        };
                        self.choose(pos, index);
                        pos += 1;
                    }
                    None => {
                        if pos == 0 {
                            self.reset();
                            return false;
                        }
                        entering = false;
                        pos -= 1;
                    }
                }
            } else {
                self.ensure_domain(pos, false, resolver);
                let current = self.indexes[pos];
                let max = bounds.max_index(pos, self.domains[pos].len(), &self.indexes[..pos]);
                let next = match (dir, max) {
                    (Direction::Up, Some(max)) if current < max => Some(current + 1),
                    (Direction::Down, Some(max)) if current > 0 => Some((current - 1).min(max)),
                    _ => None,
                };
                match next {
                    Some(index) => {
                        self.choose(pos, index);
                        pos += 1;
                        entering = true;
                    }
                    None => {
                        if pos == 0 {
                            self.reset();
                            return false;
                        }
                        pos -= 1;
                    }
                }
            }
        }
    }

    /// Make `domains[pos]` current. Entering a position always recomputes a
    /// dynamic domain (its prefix changed); static domains are reused until
    /// the resolver gains an extension.
    fn ensure_domain(&mut self, pos: usize, entering: bool, resolver: &DomainResolver) {
        let generation = resolver.generation();
        let fresh = self.resolved_at[pos] == Some(generation);
        if fresh && (!entering || resolver.is_static(pos)) {
            return;
        }
        self.prefix.truncate(pos);
        resolver.resolve_into(pos, &self.prefix, &mut self.domains[pos]);
        self.resolved_at[pos] = Some(generation);
    }

    fn choose(&mut self, pos: usize, index: usize) {
        self.indexes[pos] = index;
        self.prefix.truncate(pos);
        self.prefix
            .push(self.names[pos].clone(), self.domains[pos][index].clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ArgTemplates;
    use crate::limit::{LimitArgPolicy, LimitEngine};
    use crate::rng::{stream_rng, SAMPLING_STREAM};
    use tessera_ir::value::Combination;

    fn setup(templates: ArgTemplates) -> (DomainResolver, Navigator) {
        let names = templates.names().map(str::to_string).collect();
        let resolver = DomainResolver::new(templates.into_specs(), None);
        (resolver, Navigator::new(names))
    }

    fn collect_up(nav: &mut Navigator, r: &DomainResolver, b: &Bounds) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        while nav.advance(r, b) {
            out.push(nav.indexes().unwrap().to_vec());
        }
        out
    }

    fn collect_down(nav: &mut Navigator, r: &DomainResolver, b: &Bounds) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        while nav.retreat(r, b) {
            out.push(nav.indexes().unwrap().to_vec());
        }
        out
    }

    fn limited(arity: usize, indexes: Vec<usize>, policy: LimitArgPolicy) -> LimitEngine<()> {
        let mut engine = LimitEngine::new(arity, policy, false);
        let mut args = Args::new();
        for (i, idx) in indexes.iter().enumerate() {
            args.insert(format!("p{i}"), Value::Int(*idx as i64));
        }
        engine.offer(Combination::new(args), indexes, None, 0);
        engine
    }

    #[test]
    fn test_advance_counts_mixed_radix() {
        let (r, mut nav) = setup(ArgTemplates::new().fixed("a", [1, 2]).fixed("b", [1, 2, 3]));
        let bounds = Bounds::new(2, false);
        let seen = collect_up(&mut nav, &r, &bounds);
        assert_eq!(
            seen,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2]
            ]
        );
        assert!(!nav.is_started());
        // Exhaustion resets; the next advance starts a new pass.
        assert!(nav.advance(&r, &bounds));
        assert_eq!(nav.indexes(), Some(&[0, 0][..]));
    }

    #[test]
    fn test_retreat_is_reverse() {
        let (r, mut nav) = setup(ArgTemplates::new().fixed("a", [1, 2]).fixed("b", [1, 2, 3]));
        let bounds = Bounds::new(2, false);
        let up = collect_up(&mut nav, &r, &bounds);
        let mut down = collect_down(&mut nav, &r, &bounds);
        down.reverse();
        assert_eq!(up, down);
    }

    #[test]
    fn test_zero_args_yield_one_empty_combination() {
        let (r, mut nav) = setup(ArgTemplates::new());
        let bounds = Bounds::new(0, false);
        assert!(nav.advance(&r, &bounds));
        assert!(nav.args().unwrap().is_empty());
        assert!(!nav.advance(&r, &bounds));
        assert!(nav.retreat(&r, &bounds));
        assert!(!nav.retreat(&r, &bounds));
    }

    #[test]
    fn test_empty_domain_yields_nothing() {
        let (r, mut nav) = setup(
            ArgTemplates::new()
                .fixed("a", [1, 2])
                .fixed("b", Vec::<i64>::new()),
        );
        let bounds = Bounds::new(2, false);
        assert!(!nav.advance(&r, &bounds));
        assert!(!nav.retreat(&r, &bounds));
    }

    #[test]
    fn test_dynamic_domain_skips_empty_branches() {
        let (r, mut nav) = setup(
            ArgTemplates::new()
                .fixed("n", [0, 2, 1])
                .dynamic("k", |args| match args.get("n") {
                    Some(Value::Int(n)) => (0..*n).map(Value::Int).collect(),
                    _ => Vec::new(),
                }),
        );
        let bounds = Bounds::new(2, false);
        let seen = collect_up(&mut nav, &r, &bounds);
        assert_eq!(seen, vec![vec![1, 0], vec![1, 1], vec![2, 0]]);
        let mut down = collect_down(&mut nav, &r, &bounds);
        down.reverse();
        assert_eq!(seen, down);
    }

    #[test]
    fn test_limit_excludes_point_and_everything_after() {
        let (r, mut nav) = setup(ArgTemplates::new().fixed("a", 0..3).fixed("b", 0..3));
        let engine = limited(2, vec![1, 1], LimitArgPolicy::Never);
        let seen = collect_up(&mut nav, &r, engine.bounds());
        assert_eq!(
            seen,
            vec![vec![0, 0], vec![0, 1], vec![0, 2], vec![1, 0]]
        );
        let mut down = collect_down(&mut nav, &r, engine.bounds());
        down.reverse();
        assert_eq!(seen, down);
    }

    #[test]
    fn test_limit_arg_policy_caps_every_prefix() {
        let (r, mut nav) = setup(ArgTemplates::new().fixed("a", 0..3).fixed("b", 0..3));
        let engine = limited(2, vec![1, 1], LimitArgPolicy::Always);
        let seen = collect_up(&mut nav, &r, engine.bounds());
        assert_eq!(seen, vec![vec![0, 0], vec![0, 1], vec![1, 0]]);
    }

    #[test]
    fn test_include_error_variant_keeps_limit_point() {
        let (r, mut nav) = setup(ArgTemplates::new().fixed("a", 0..4));
        let mut engine: LimitEngine<()> = LimitEngine::new(1, LimitArgPolicy::Never, true);
        engine.offer(Combination::new(Args::new().with("a", 2)), vec![2], None, 0);
        let seen = collect_up(&mut nav, &r, engine.bounds());
        assert_eq!(seen, vec![vec![0], vec![1], vec![2]]);
        let down = collect_down(&mut nav, &r, engine.bounds());
        assert_eq!(down, vec![vec![2], vec![1], vec![0]]);
    }

    #[test]
    fn test_restore_resumes_after_saved_position() {
        let (r, mut nav) = setup(ArgTemplates::new().fixed("a", 0..3).fixed("b", 0..3));
        let bounds = Bounds::new(2, false);
        assert!(nav.restore(&[1, 2], &r, &bounds));
        assert!(nav.advance(&r, &bounds));
        assert_eq!(nav.indexes(), Some(&[2, 0][..]));
    }

    #[test]
    fn test_restore_rejects_stale_indexes() {
        let (r, mut nav) = setup(ArgTemplates::new().fixed("a", 0..3).fixed("b", 0..3));
        let bounds = Bounds::new(2, false);
        assert!(!nav.restore(&[1, 7], &r, &bounds));
        assert!(!nav.is_started());
        assert!(!nav.restore(&[1], &r, &bounds));

        let engine = limited(2, vec![1, 0], LimitArgPolicy::Never);
        assert!(!nav.restore(&[1, 2], &r, engine.bounds()));
        assert!(!nav.restore(&[1, 0], &r, engine.bounds()));
        assert!(nav.restore(&[0, 2], &r, engine.bounds()));
    }

    #[test]
    fn test_clamp_past_limit_ends_forward_pass() {
        let (r, mut nav) = setup(ArgTemplates::new().fixed("a", 0..4));
        let bounds = Bounds::new(1, false);
        for _ in 0..3 {
            assert!(nav.advance(&r, &bounds));
        }
        let engine = limited(1, vec![1], LimitArgPolicy::Never);
        assert!(nav.clamp(&r, engine.bounds()));
        assert!(!nav.advance(&r, engine.bounds()));
    }

    #[test]
    fn test_clamp_past_limit_lands_backward_on_predecessor() {
        let (r, mut nav) = setup(ArgTemplates::new().fixed("a", 0..3).fixed("b", 0..3));
        let bounds = Bounds::new(2, false);
        assert!(nav.retreat(&r, &bounds));
        assert_eq!(nav.indexes(), Some(&[2, 2][..]));
        let engine = limited(2, vec![1, 1], LimitArgPolicy::Never);
        assert!(nav.clamp(&r, engine.bounds()));
        assert!(nav.retreat(&r, engine.bounds()));
        assert_eq!(nav.indexes(), Some(&[1, 0][..]));
    }

    #[test]
    fn test_clamp_ignores_positions_below_limit() {
        let (r, mut nav) = setup(ArgTemplates::new().fixed("a", 0..4));
        let bounds = Bounds::new(1, false);
        assert!(nav.advance(&r, &bounds));
        let engine = limited(1, vec![2], LimitArgPolicy::Never);
        assert!(!nav.clamp(&r, engine.bounds()));
        assert!(nav.advance(&r, engine.bounds()));
        assert_eq!(nav.indexes(), Some(&[1][..]));
    }

    #[test]
    fn test_random_pick_stays_below_limit() {
        let (r, mut nav) = setup(ArgTemplates::new().fixed("a", 0..3).fixed("b", 0..3));
        let engine = limited(2, vec![1, 1], LimitArgPolicy::Never);
        let mut rng = stream_rng(7, SAMPLING_STREAM);
        for _ in 0..200 {
            assert!(nav.random_pick(&r, engine.bounds(), &mut rng));
            let idx = nav.indexes().unwrap();
            assert!(crate::limit::compare_indexes(idx, &[1, 1]).is_lt());
        }
    }

    #[test]
    fn test_random_pick_falls_back_from_limit_point() {
        // Only admissible combinations are [0] and the excluded limit [1].
        let (r, mut nav) = setup(ArgTemplates::new().fixed("a", 0..2));
        let engine = limited(1, vec![1], LimitArgPolicy::Never);
        let mut rng = stream_rng(3, SAMPLING_STREAM);
        for _ in 0..50 {
            assert!(nav.random_pick(&r, engine.bounds(), &mut rng));
            assert_eq!(nav.indexes(), Some(&[0][..]));
        }
    }

    #[test]
    fn test_random_pick_fails_when_nothing_admissible() {
        let (r, mut nav) = setup(ArgTemplates::new().fixed("a", 0..2));
        let engine = limited(1, vec![0], LimitArgPolicy::Never);
        let mut rng = stream_rng(3, SAMPLING_STREAM);
        assert!(!nav.random_pick(&r, engine.bounds(), &mut rng));
    }

    #[test]
    fn test_random_pick_escapes_dead_end() {
        // n=0 has an empty k domain; the only combinations live under n=1.
        let (r, mut nav) = setup(
            ArgTemplates::new()
                .fixed("n", [0, 1])
                .dynamic("k", |args| match args.get("n") {
                    Some(Value::Int(1)) => vec![Value::Int(5)],
                    _ => Vec::new(),
                }),
        );
        let bounds = Bounds::new(2, false);
        let mut rng = stream_rng(11, SAMPLING_STREAM);
        for _ in 0..50 {
            assert!(nav.random_pick(&r, &bounds, &mut rng));
            assert_eq!(nav.indexes(), Some(&[1, 0][..]));
        }
    }
}
