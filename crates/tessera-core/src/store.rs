//! Failing-combination storage and replay.
//!
//! Stored combinations are plain JSON. Replaying them before a run re-tests
//! each one; those that still fail become limits of the fresh iterator,
//! extending domains for values the current configuration no longer lists.

use tessera_explore::limit::LimitOutcome;
use tessera_explore::traversal::{LimitRequest, VariantsIterator};
use tessera_ir::value::Combination;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to encode combination: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode stored combination: {0}")]
    Decode(#[source] serde_json::Error),
}

pub trait FailureStore {
    fn save(&mut self, combination: &Combination) -> Result<(), StoreError>;
    fn load_all(&self) -> Result<Vec<Combination>, StoreError>;
    fn clear(&mut self) -> Result<(), StoreError>;
}

pub fn encode_combination(combination: &Combination) -> Result<String, StoreError> {
    serde_json::to_string(combination).map_err(StoreError::Encode)
}

pub fn decode_combination(json: &str) -> Result<Combination, StoreError> {
    serde_json::from_str(json).map_err(StoreError::Decode)
}

/// In-process store keeping encoded entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw JSON entries, oldest first.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Add an already-encoded entry.
    pub fn push_raw(&mut self, json: impl Into<String>) {
        self.entries.push(json.into());
    }
}

impl FailureStore for MemoryStore {
    fn save(&mut self, combination: &Combination) -> Result<(), StoreError> {
        self.entries.push(encode_combination(combination)?);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Combination>, StoreError> {
        self.entries.iter().map(|e| decode_combination(e)).collect()
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }
}

/// Outcome counts of a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub loaded: usize,
    /// Stored failures that pass now.
    pub passing: usize,
    pub accepted: usize,
    /// Still failing, but not smaller than an earlier one.
    pub rejected: usize,
}

impl ReplaySummary {
    pub fn still_failing(&self) -> usize {
        self.accepted + self.rejected
    }
}

/// Re-run every stored combination and feed the ones that still fail to
/// the iterator as candidate limits, with their errors.
pub fn replay_into<E, F>(
    store: &dyn FailureStore,
    iterator: &mut VariantsIterator<E>,
    test: &mut F,
) -> Result<ReplaySummary, StoreError>
where
    F: FnMut(&Combination) -> Result<(), E>,
{
    let saved = store.load_all()?;
    let mut summary = ReplaySummary {
        loaded: saved.len(),
        ..ReplaySummary::default()
    };
    for combination in saved {
        let error = match test(&combination) {
            Ok(()) => {
                log::debug!("stored failure {combination} passes now");
                summary.passing += 1;
                continue;
            }
            Err(error) => error,
        };
        match iterator.add_limit(LimitRequest::combination(combination).with_error(error)) {
            LimitOutcome::Accepted => summary.accepted += 1,
            _ => summary.rejected += 1,
        }
    }
    if summary.loaded > 0 {
        log::info!(
            "replayed {} stored failures ({} still failing, {} accepted)",
            summary.loaded,
            summary.still_failing(),
            summary.accepted
        );
    }
    Ok(summary)
}

/// Replace the store's contents with the given best failure. A run without
/// failures leaves the store empty.
pub fn persist_best(
    store: &mut dyn FailureStore,
    best: Option<&Combination>,
) -> Result<(), StoreError> {
    store.clear()?;
    match best {
        Some(best) => {
            store.save(best)?;
            log::debug!("stored best failure {best}");
        }
        None => log::debug!("no failure to store, store cleared"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_explore::clock::ManualClock;
    use tessera_explore::domain::ArgTemplates;
    use tessera_explore::traversal::VariantsOptions;
    use tessera_ir::value::{Args, Value};

    fn iterator() -> VariantsIterator<&'static str> {
        VariantsIterator::new(
            ArgTemplates::new().fixed("a", 0..5),
            VariantsOptions::default().with_clock(ManualClock::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_encode_keeps_argument_order() {
        let c = Combination::new(Args::new().with("z", 1).with("a", "x"));
        assert_eq!(encode_combination(&c).unwrap(), r#"{"args":{"z":1,"a":"x"}}"#);
    }

    #[test]
    fn test_decode_with_seed() {
        let c = decode_combination(r#"{"args":{"a":[1,2]},"seed":9}"#).unwrap();
        assert_eq!(c.seed, Some(9));
        assert_eq!(
            c.get("a"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn test_corrupt_entry_fails_load() {
        let mut store = MemoryStore::new();
        store.push_raw("{not json");
        assert!(matches!(store.load_all(), Err(StoreError::Decode(_))));
    }

    #[test]
    fn test_replay_keeps_smallest() {
        let mut store = MemoryStore::new();
        store
            .save(&Combination::new(Args::new().with("a", 3)))
            .unwrap();
        store
            .save(&Combination::new(Args::new().with("a", 1)))
            .unwrap();
        store
            .save(&Combination::new(Args::new().with("a", 2)))
            .unwrap();

        let mut it = iterator();
        let summary = replay_into(&store, &mut it, &mut |_: &Combination| Err("still")).unwrap();
        assert_eq!(
            summary,
            ReplaySummary {
                loaded: 3,
                passing: 0,
                accepted: 2,
                rejected: 1
            }
        );
        let best = it.limit().unwrap();
        assert_eq!(best.indexes, vec![1]);
        assert_eq!(best.error, Some("still"));
    }

    #[test]
    fn test_replay_skips_combinations_that_pass_now() {
        let mut store = MemoryStore::new();
        store
            .save(&Combination::new(Args::new().with("a", 1)))
            .unwrap();
        store
            .save(&Combination::new(Args::new().with("a", 3)))
            .unwrap();

        let mut it = iterator();
        let mut tested = Vec::new();
        let summary = replay_into(&store, &mut it, &mut |c: &Combination| {
            tested.push(c.to_string());
            match c.get("a") {
                Some(Value::Int(3)) => Err("fails"),
                _ => Ok(()),
            }
        })
        .unwrap();
        assert_eq!(tested, vec!["{a: 1}", "{a: 3}"]);
        assert_eq!(summary.passing, 1);
        assert_eq!(summary.still_failing(), 1);
        assert_eq!(it.limit().unwrap().indexes, vec![3]);
    }

    #[test]
    fn test_persist_best_replaces_contents() {
        let mut store = MemoryStore::new();
        store.push_raw(r#"{"args":{"a":4}}"#);
        let best = Combination::new(Args::new().with("a", 0));
        persist_best(&mut store, Some(&best)).unwrap();
        assert_eq!(store.entries(), [r#"{"args":{"a":0}}"#.to_string()]);
        assert_eq!(store.load_all().unwrap(), vec![best]);
    }

    #[test]
    fn test_persist_without_best_clears_store() {
        let mut store = MemoryStore::new();
        store.push_raw(r#"{"args":{"a":4}}"#);
        persist_best(&mut store, None).unwrap();
        assert!(store.is_empty());
    }
}
