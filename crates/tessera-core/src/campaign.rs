//! The run driver: cycles a variants iterator through a test until a limit
//! trips, feeding failures back so later cycles narrow toward the smallest.

use tessera_explore::clock::{Clock, SystemClock};
use tessera_explore::limit::LimitOutcome;
use tessera_explore::traversal::{LimitRequest, VariantsIterator};
use tessera_ir::parse::{parse_config, ConfigError, ParseError};
use tessera_ir::value::Combination;

use crate::limits::{LimitChecker, RunLimits, StopReason};
use crate::report::{BestError, RunReport};
use crate::store::{persist_best, replay_into, FailureStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("config parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failure store error: {0}")]
    Store(#[from] StoreError),
}

/// Run `test` against every combination the iterator yields, cycle after
/// cycle, until the limits say stop.
pub fn run_variants<E, F>(
    iterator: &mut VariantsIterator<E>,
    limits: &RunLimits,
    clock: &dyn Clock,
    mut test: F,
) -> RunReport<E>
where
    E: Clone,
    F: FnMut(&Combination) -> Result<(), E>,
{
    let checker = LimitChecker::new(limits.clone(), clock);
    let mut failures = 0u64;

    let stop_reason = 'run: loop {
        if iterator.min_completed_count() >= limits.max_cycles {
            break StopReason::Complete;
        }
        if iterator.is_exhausted() {
            break StopReason::Exhausted;
        }
        if let Some(reason) = checker.check(iterator.tests(), iterator.cycle_index()) {
            break reason;
        }

        iterator.start();
        while let Some(combination) = iterator.next() {
            if let Err(error) = test(&combination) {
                failures += 1;
                let outcome = iterator.add_limit(LimitRequest::current().with_error(error));
                if outcome == LimitOutcome::Accepted {
                    log::debug!("new smallest failure {combination} at test {}", iterator.tests());
                }
                if !limits.find_best_error {
                    break 'run StopReason::FirstError;
                }
            }
            if let Some(reason) = checker.check(iterator.tests(), iterator.cycle_index()) {
                break 'run reason;
            }
        }
    };

    let best = iterator.limit().map(|limit| BestError {
        combination: limit.combination.clone(),
        error: limit.error.clone(),
        tests: limit.tests,
    });
    let report = RunReport {
        tests: iterator.tests(),
        cycles: iterator.cycle_index(),
        failures,
        elapsed_ms: checker.elapsed_ms(),
        stop_reason,
        best,
        modes: iterator.mode_stats(),
    };
    log::info!("run finished: {}", report.summary());
    report
}

/// Parse a JSON variants config, re-test stored failures, run, and store
/// the smallest failure found (or nothing, if the run found none).
pub fn run_config<E, F>(
    config_json: &str,
    limits: &RunLimits,
    store: &mut dyn FailureStore,
    mut test: F,
) -> Result<RunReport<E>, RunError>
where
    E: Clone,
    F: FnMut(&Combination) -> Result<(), E>,
{
    let config = parse_config(config_json)?;
    let mut iterator = VariantsIterator::from_config(&config)?;
    let replayed = replay_into(store, &mut iterator, &mut test)?;

    let clock = SystemClock::new();
    let mut report = run_variants(&mut iterator, limits, &clock, test);
    report.failures += replayed.still_failing() as u64;
    persist_best(store, report.best.as_ref().map(|b| &b.combination))?;
    Ok(report)
}
