//! The public iterator: cycles of combinations, failure feedback, progress.

use tessera_ir::parse::{validate_arg_names, validate_modes, ConfigError};
use tessera_ir::types::{ModeConfig, ModeKind, SequentialMode, VariantsConfig};
use tessera_ir::value::{Combination, Value};

use super::navigator::Navigator;
use super::scheduler::{ModeStats, Scheduler};
use crate::clock::{Clock, SystemClock};
use crate::domain::resolver::DomainResolver;
use crate::domain::{ArgTemplates, EqualsFn};
use crate::limit::{map_candidate, Limit, LimitArgPolicy, LimitEngine, LimitOutcome, RejectReason};
use crate::rng::{stream_rng, VariantSeeds, SAMPLING_STREAM};

/// Everything besides the argument templates.
pub struct VariantsOptions {
    pub modes: Vec<ModeConfig>,
    /// Keep the best failing combination itself admissible.
    pub include_error_variant: bool,
    pub limit_arg_on_error: LimitArgPolicy,
    /// Seeds random sampling and the per-combination seeds. Without it,
    /// sampling is seeded from entropy and combinations carry no seed.
    pub seed: Option<u64>,
    pub equals: Option<EqualsFn>,
    pub clock: Box<dyn Clock>,
}

impl Default for VariantsOptions {
    fn default() -> Self {
        Self {
            modes: vec![ModeConfig::Forward(SequentialMode::default())],
            include_error_variant: false,
            limit_arg_on_error: LimitArgPolicy::Never,
            seed: None,
            equals: None,
            clock: Box::new(SystemClock::new()),
        }
    }
}

impl VariantsOptions {
    pub fn from_config(config: &VariantsConfig) -> Self {
        Self {
            modes: config.modes.clone(),
            include_error_variant: config.include_error_variant,
            limit_arg_on_error: config.limit_arg_on_error.into(),
            seed: config.seed,
            ..Self::default()
        }
    }

    pub fn with_modes(mut self, modes: Vec<ModeConfig>) -> Self {
        self.modes = modes;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_equals(mut self, equals: impl Fn(&Value, &Value) -> bool + 'static) -> Self {
        self.equals = Some(Box::new(equals));
        self
    }

    pub fn with_limit_arg_policy(mut self, policy: LimitArgPolicy) -> Self {
        self.limit_arg_on_error = policy;
        self
    }

    pub fn include_error_variant(mut self, include: bool) -> Self {
        self.include_error_variant = include;
        self
    }
}

/// Failure feedback for [`VariantsIterator::add_limit`].
///
/// With a combination, that combination is the candidate limit and `index`
/// (if any) also caps the per-cycle count. Without one, `index` alone caps
/// the count; with neither, the combination last yielded is the candidate.
/// In that last form its position caps the count only when the position
/// equals its rank in ascending order: a forward pass that began fresh in
/// this cycle, with nothing else yielded before it and no repeats.
#[derive(Debug, Clone)]
pub struct LimitRequest<E> {
    pub combination: Option<Combination>,
    pub error: Option<E>,
    /// Tests run when the failure was seen. Defaults to `tests()`.
    pub tests: Option<u64>,
    pub index: Option<u64>,
}

impl<E> LimitRequest<E> {
    /// The combination last yielded failed.
    pub fn current() -> Self {
        Self {
            combination: None,
            error: None,
            tests: None,
            index: None,
        }
    }

    pub fn combination(combination: Combination) -> Self {
        Self {
            combination: Some(combination),
            ..Self::current()
        }
    }

    pub fn index(index: u64) -> Self {
        Self {
            index: Some(index),
            ..Self::current()
        }
    }

    pub fn with_error(mut self, error: E) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_tests(mut self, tests: u64) -> Self {
        self.tests = Some(tests);
        self
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }
}

#[derive(Debug, Clone)]
struct Yielded {
    combination: Combination,
    indexes: Vec<usize>,
    repeat: u32,
    kind: ModeKind,
    rank: Option<u64>,
}

/// Enumerates argument combinations in external cycles.
///
/// Each cycle runs the configured modes in order and ends with `None`;
/// call [`start`](Self::start) to begin the next one. The first `next`
/// starts a cycle implicitly. Failures fed back through
/// [`add_limit`](Self::add_limit) shrink what later cycles enumerate.
pub struct VariantsIterator<E> {
    resolver: DomainResolver,
    limits: LimitEngine<E>,
    scheduler: Scheduler,
    clock: Box<dyn Clock>,
    seeds: Option<VariantSeeds>,
    current: Option<Yielded>,
    /// Position of the last yield within the cycle.
    index: Option<u64>,
    cycle_yields: u64,
    tests: u64,
    cycles_finished: u64,
    cycle_open: bool,
    started: bool,
}

impl<E> VariantsIterator<E> {
    pub fn new(templates: ArgTemplates, options: VariantsOptions) -> Result<Self, ConfigError> {
        validate_modes(&options.modes)?;
        validate_arg_names(templates.names())?;

        let names: Vec<String> = templates.names().map(str::to_string).collect();
        let arity = names.len();
        let sampling_seed = options.seed.unwrap_or_else(rand::random);
        log::debug!(
            "variants over {:?}, {} modes, sampling seed {sampling_seed}",
            names,
            options.modes.len()
        );

        Ok(Self {
            resolver: DomainResolver::new(templates.into_specs(), options.equals),
            limits: LimitEngine::new(
                arity,
                options.limit_arg_on_error,
                options.include_error_variant,
            ),
            scheduler: Scheduler::new(
                options.modes,
                Navigator::new(names),
                stream_rng(sampling_seed, SAMPLING_STREAM),
            ),
            clock: options.clock,
            seeds: options.seed.map(VariantSeeds::new),
            current: None,
            index: None,
            cycle_yields: 0,
            tests: 0,
            cycles_finished: 0,
            cycle_open: false,
            started: false,
        })
    }

    /// Build from a parsed configuration with static domains only.
    pub fn from_config(config: &VariantsConfig) -> Result<Self, ConfigError> {
        Self::new(
            ArgTemplates::from_config(&config.args),
            VariantsOptions::from_config(config),
        )
    }

    /// Begin a new external cycle. Per-cycle counters reset; interrupted
    /// sequential modes pick up where they stopped.
    pub fn start(&mut self) {
        if self.cycle_open {
            self.close_cycle();
        }
        self.started = true;
        self.cycle_open = true;
        self.cycle_yields = 0;
        self.index = None;
        self.scheduler.begin_cycle();
        log::debug!("cycle {} started after {} tests", self.cycles_finished, self.tests);
    }

    /// Report a failure or cap the per-cycle count. See [`LimitRequest`].
    pub fn add_limit(&mut self, request: LimitRequest<E>) -> LimitOutcome {
        let tests = request.tests.unwrap_or(self.tests);
        match (request.combination, request.index) {
            (Some(candidate), index) => {
                let outcome = match map_candidate(&mut self.resolver, &candidate.args) {
                    Ok((args, indexes)) => {
                        let combination = Combination {
                            args,
                            seed: candidate.seed,
                        };
                        self.limits.offer(combination, indexes, request.error, tests)
                    }
                    Err(reason) => {
                        log::debug!("discarding limit candidate {candidate}: {reason:?}");
                        LimitOutcome::Rejected(reason)
                    }
                };
                let capped = index.is_some_and(|i| self.limits.cap(i));
                match outcome {
                    LimitOutcome::Rejected(_) if capped => LimitOutcome::Capped,
                    other => other,
                }
            }
            (None, Some(index)) => {
                if self.limits.cap(index) {
                    LimitOutcome::Capped
                } else {
                    LimitOutcome::Rejected(RejectReason::NotLower)
                }
            }
            (None, None) => {
                let (Some(current), Some(index)) = (&self.current, self.index) else {
                    log::debug!("limit requested for the current combination before any yield");
                    return LimitOutcome::Rejected(RejectReason::NoCurrent);
                };
                let combination = current.combination.clone();
                let indexes = current.indexes.clone();
                // Everything yielded after this point in the cycle lies past
                // the failure only when the cycle index is the ascending rank.
                if current.kind == ModeKind::Forward && current.rank == Some(index) {
                    self.limits.cap(index);
                }
                self.limits.offer(combination, indexes, request.error, tests)
            }
        }
    }

    /// Position of the last yield within the current cycle.
    pub fn index(&self) -> Option<u64> {
        self.index
    }

    /// External cycles finished so far.
    pub fn cycle_index(&self) -> u64 {
        self.cycles_finished
    }

    /// Per-cycle cap on yields, once one has been set.
    pub fn count(&self) -> Option<u64> {
        self.limits.count()
    }

    pub fn limit(&self) -> Option<&Limit<E>> {
        self.limits.best()
    }

    pub fn mode_index(&self) -> Option<usize> {
        self.scheduler.mode_index()
    }

    pub fn min_completed_count(&self) -> u64 {
        self.scheduler.min_completed_count(self.cycles_finished)
    }

    /// Total combinations yielded, repeats included.
    pub fn tests(&self) -> u64 {
        self.tests
    }

    pub fn mode_stats(&self) -> Vec<ModeStats> {
        self.scheduler.stats()
    }

    /// The combination last yielded.
    pub fn current(&self) -> Option<&Combination> {
        self.current.as_ref().map(|c| &c.combination)
    }

    /// Repeat index of the combination last yielded.
    pub fn repeat(&self) -> Option<u32> {
        self.current.as_ref().map(|c| c.repeat)
    }

    /// Nothing can ever be yielded again.
    pub fn is_exhausted(&self) -> bool {
        self.scheduler.is_exhausted() || self.limits.count() == Some(0)
    }

    fn apply_pending(&mut self) {
        if !self.limits.has_pending() {
            return;
        }
        for pending in self.limits.take_pending() {
            log::debug!(
                "applying limit {:?} found after {} tests",
                pending.indexes,
                pending.tests
            );
        }
        self.scheduler
            .apply_limit(&self.resolver, self.limits.bounds());
    }

    fn close_cycle(&mut self) {
        self.cycle_open = false;
        self.cycles_finished += 1;
        log::debug!(
            "cycle {} finished with {} yields",
            self.cycles_finished - 1,
            self.cycle_yields
        );
    }
}

impl<E> Iterator for VariantsIterator<E> {
    type Item = Combination;

    fn next(&mut self) -> Option<Combination> {
        if !self.started {
            self.start();
        }
        if !self.cycle_open {
            return None;
        }
        self.apply_pending();

        if self.limits.count().is_some_and(|count| self.cycle_yields >= count) {
            self.close_cycle();
            return None;
        }

        let Some(repeat) =
            self.scheduler
                .next(&self.resolver, self.limits.bounds(), self.clock.as_ref())
        else {
            self.close_cycle();
            return None;
        };
        let navigator = self.scheduler.navigator();
        let (Some(args), Some(indexes), Some(kind)) = (
            navigator.args(),
            navigator.indexes(),
            self.scheduler.current_kind(),
        ) else {
            self.close_cycle();
            return None;
        };

        let combination = Combination {
            args: args.clone(),
            seed: self.seeds.as_mut().map(VariantSeeds::next_seed),
        };
        self.current = Some(Yielded {
            combination: combination.clone(),
            indexes: indexes.to_vec(),
            repeat,
            kind,
            rank: self.scheduler.pass_rank(),
        });
        self.index = Some(self.cycle_yields);
        self.cycle_yields += 1;
        self.tests += 1;
        Some(combination)
    }
}

impl<E: std::fmt::Debug> std::fmt::Debug for VariantsIterator<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantsIterator")
            .field("resolver", &self.resolver)
            .field("limits", &self.limits)
            .field("scheduler", &self.scheduler)
            .field("tests", &self.tests)
            .field("cycles_finished", &self.cycles_finished)
            .finish()
    }
}
