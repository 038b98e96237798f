//! Mode scheduling.
//!
//! Walks the configured mode list once per external cycle. Each mode drives
//! the shared navigator with its own step function, repeat count, pass count
//! and test/time budget. A sequential mode cut short by its budget keeps its
//! position and resumes there on its next activation.

use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tessera_ir::types::{ModeConfig, ModeKind};

use super::navigator::Navigator;
use crate::clock::Clock;
use crate::domain::resolver::DomainResolver;
use crate::limit::Bounds;

/// Passes in a row that yield nothing before a mode is retired.
const EMPTY_PASSES_TO_EXHAUST: u32 = 2;

/// Where an interrupted sequential mode left off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPosition {
    pub indexes: Vec<usize>,
    /// Repeat index last yielded for `indexes`; `None` if its repeats were
    /// abandoned.
    pub repeat: Option<u32>,
    pub cycle: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ModeState {
    /// Pass number within the current activation.
    cycle: u32,
    completed: u64,
    tests: u64,
    progressed_in_cycle: bool,
    progressed_last_cycle: bool,
    empty_passes: u32,
    exhausted: bool,
    saved: Option<SavedPosition>,
}

impl ModeState {
    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn saved(&self) -> Option<&SavedPosition> {
        self.saved.as_ref()
    }

    fn note_pass(&mut self, progress: bool, position: usize) {
        if progress {
            self.empty_passes = 0;
            return;
        }
        self.empty_passes += 1;
        if self.empty_passes >= EMPTY_PASSES_TO_EXHAUST && !self.exhausted {
            log::warn!(
                "mode {position} produced nothing for {} passes, retiring it",
                self.empty_passes
            );
            self.exhausted = true;
            self.saved = None;
        }
    }
}

/// Per-mode counters exposed to callers and run reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeStats {
    pub index: usize,
    pub kind: ModeKind,
    pub completed: u64,
    pub tests: u64,
    pub exhausted: bool,
}

pub struct Scheduler {
    modes: Vec<ModeConfig>,
    states: Vec<ModeState>,
    navigator: Navigator,
    rng: ChaCha8Rng,
    /// Mode position in the list; `modes.len()` once the cycle is over.
    current: usize,
    /// The current mode has been entered.
    active: bool,
    activation_tests: u64,
    activation_started_ms: u64,
    /// Something was yielded since the pass (or activation) began.
    progress: bool,
    /// The navigator holds the combination last yielded, eligible for repeats.
    has_current: bool,
    repeat: u32,
    /// The navigator sits on a restored position nothing has been yielded
    /// from yet.
    resumed: bool,
    /// Rank of the live combination within a pass that began fresh in this
    /// activation; `None` for resumed or clamped passes.
    pass_rank: Option<u64>,
}

impl Scheduler {
    pub fn new(modes: Vec<ModeConfig>, navigator: Navigator, rng: ChaCha8Rng) -> Self {
        let states = vec![ModeState::default(); modes.len()];
        let current = modes.len();
        Self {
            modes,
            states,
            navigator,
            rng,
            current,
            active: false,
            activation_tests: 0,
            activation_started_ms: 0,
            progress: false,
            has_current: false,
            repeat: 0,
            resumed: false,
            pass_rank: None,
        }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn state(&self, index: usize) -> &ModeState {
        &self.states[index]
    }

    /// Position of the mode currently producing, if the cycle is still open.
    pub fn mode_index(&self) -> Option<usize> {
        (self.current < self.modes.len()).then_some(self.current)
    }

    pub fn current_kind(&self) -> Option<ModeKind> {
        self.modes.get(self.current).map(ModeConfig::kind)
    }

    /// How many distinct combinations precede the live one in its pass,
    /// when the pass started from scratch.
    pub fn pass_rank(&self) -> Option<u64> {
        self.pass_rank
    }

    /// Every mode has been retired.
    pub fn is_exhausted(&self) -> bool {
        self.states.iter().all(|s| s.exhausted)
    }

    /// Start a new external cycle at the first mode. A mode still active
    /// from the previous cycle is interrupted (and its position saved).
    pub fn begin_cycle(&mut self) {
        if self.active {
            self.interrupt();
        }
        for state in &mut self.states {
            state.progressed_last_cycle = state.progressed_in_cycle;
            state.progressed_in_cycle = false;
        }
        self.current = 0;
    }

    /// Smallest pass count among live modes that produced something in the
    /// last or the current external cycle. Modes without recent progress
    /// are left out so they cannot stall termination.
    pub fn min_completed_count(&self, cycles_finished: u64) -> u64 {
        self.states
            .iter()
            .filter(|s| !s.exhausted && (s.progressed_last_cycle || s.progressed_in_cycle))
            .map(|s| s.completed)
            .min()
            .unwrap_or(cycles_finished)
    }

    pub fn stats(&self) -> Vec<ModeStats> {
        self.modes
            .iter()
            .zip(&self.states)
            .enumerate()
            .map(|(index, (mode, state))| ModeStats {
                index,
                kind: mode.kind(),
                completed: state.completed,
                tests: state.tests,
                exhausted: state.exhausted,
            })
            .collect()
    }

    /// Re-check the live position after the bounds tightened. A position
    /// that is now out of bounds drops its remaining repeats.
    pub fn apply_limit(&mut self, resolver: &DomainResolver, bounds: &Bounds) -> bool {
        if !self.active || !self.navigator.clamp(resolver, bounds) {
            return false;
        }
        self.has_current = false;
        self.resumed = false;
        self.pass_rank = None;
        true
    }

    /// Produce the next combination into the navigator. Returns its repeat
    /// index, or `None` when the external cycle is over.
    pub fn next(
        &mut self,
        resolver: &DomainResolver,
        bounds: &Bounds,
        clock: &dyn Clock,
    ) -> Option<u32> {
        loop {
            let pos = self.current;
            if pos >= self.modes.len() {
                return None;
            }
            if self.states[pos].exhausted {
                self.current += 1;
                continue;
            }
            if !self.active && !self.enter(resolver, bounds, clock) {
                continue;
            }

            let mode = &self.modes[pos];
            let budget = mode.budget();
            let repeats = mode.repeats_per_variant();
            let kind = mode.kind();

            let elapsed = clock.now_ms().saturating_sub(self.activation_started_ms);
            if budget.exhausted(self.activation_tests, elapsed) {
                log::debug!(
                    "{kind} mode {pos} out of budget after {} tests, {elapsed}ms",
                    self.activation_tests
                );
                self.interrupt();
                continue;
            }

            if self.has_current && self.repeat + 1 < repeats {
                self.repeat += 1;
                return Some(self.record_yield());
            }

            let fresh = !self.navigator.is_started();
            let stepped = match kind {
                ModeKind::Forward => self.navigator.advance(resolver, bounds),
                ModeKind::Backward => self.navigator.retreat(resolver, bounds),
                ModeKind::Random => self.navigator.random_pick(resolver, bounds, &mut self.rng),
            };
            if stepped {
                self.has_current = true;
                self.repeat = 0;
                self.pass_rank = if fresh {
                    Some(0)
                } else {
                    self.pass_rank.map(|rank| rank + 1)
                };
                return Some(self.record_yield());
            }
            self.has_current = false;
            if self.resumed {
                self.roll_over();
                continue;
            }
            self.finish_pass();
        }
    }

    fn record_yield(&mut self) -> u32 {
        self.activation_tests += 1;
        self.progress = true;
        self.resumed = false;
        let state = &mut self.states[self.current];
        state.tests += 1;
        state.progressed_in_cycle = true;
        self.repeat
    }

    /// Activate the current mode. Returns false if the mode was skipped.
    fn enter(&mut self, resolver: &DomainResolver, bounds: &Bounds, clock: &dyn Clock) -> bool {
        let pos = self.current;
        let mode = &self.modes[pos];
        let kind = mode.kind();
        if mode.cycles() == 0 {
            log::debug!("{kind} mode {pos} has no passes configured, skipping");
            self.current += 1;
            return false;
        }

        self.navigator.reset();
        self.active = true;
        self.activation_tests = 0;
        self.activation_started_ms = clock.now_ms();
        self.progress = false;
        self.has_current = false;
        self.repeat = 0;
        self.resumed = false;
        self.pass_rank = None;

        let state = &mut self.states[pos];
        state.cycle = 0;
        if let Some(saved) = state.saved.take() {
            if self.navigator.restore(&saved.indexes, resolver, bounds) {
                log::debug!("resuming {kind} mode {pos} at {:?}", saved.indexes);
                state.cycle = saved.cycle;
                self.resumed = true;
                self.has_current = saved.repeat.is_some();
                self.repeat = saved.repeat.unwrap_or(0);
            } else {
                log::debug!(
                    "saved position {:?} of {kind} mode {pos} is stale, starting over",
                    saved.indexes
                );
            }
        } else {
            log::debug!("entering {kind} mode {pos}");
        }
        true
    }

    /// The navigator ran out: one full pass done.
    fn finish_pass(&mut self) {
        let pos = self.current;
        let cycles = self.modes[pos].cycles();
        let progress = self.progress;
        let state = &mut self.states[pos];
        state.completed += 1;
        state.cycle += 1;
        state.saved = None;
        state.note_pass(progress, pos);
        self.progress = false;
        self.navigator.reset();
        if state.exhausted || state.cycle >= cycles {
            self.leave();
        }
    }

    /// The restored position was the last of its pass: the interrupted
    /// activation finished it. Count that pass and start a fresh one.
    fn roll_over(&mut self) {
        let pos = self.current;
        let cycles = self.modes[pos].cycles();
        let state = &mut self.states[pos];
        state.completed += 1;
        state.cycle = if state.cycle + 1 < cycles { state.cycle + 1 } else { 0 };
        log::debug!("resumed position of mode {pos} ended its pass, starting a new one");
        self.resumed = false;
        self.navigator.reset();
    }

    /// The budget ran out mid-pass.
    fn interrupt(&mut self) {
        let pos = self.current;
        let progress = self.progress;
        let state = &mut self.states[pos];
        match self.modes[pos].kind() {
            // A budgeted random pass is complete once it produced anything.
            ModeKind::Random => {
                if progress {
                    state.completed += 1;
                }
                state.note_pass(progress, pos);
            }
            ModeKind::Forward | ModeKind::Backward => {
                if let Some(indexes) = self.navigator.indexes() {
                    state.saved = Some(SavedPosition {
                        indexes: indexes.to_vec(),
                        repeat: self.has_current.then_some(self.repeat),
                        cycle: state.cycle,
                    });
                }
                state.note_pass(progress, pos);
            }
        }
        self.leave();
    }

    fn leave(&mut self) {
        self.active = false;
        self.has_current = false;
        self.resumed = false;
        self.pass_rank = None;
        self.navigator.reset();
        self.current += 1;
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("modes", &self.modes)
            .field("states", &self.states)
            .field("current", &self.current)
            .field("active", &self.active)
            .field("navigator", &self.navigator)
            .finish()
    }
}
