/// An accepted limit not yet applied to the live traversal position.
///
/// Accepting a limit tightens the bounds immediately, but the navigator may
/// already sit past it (failures are often reported for combinations yielded
/// earlier). The iterator drains these before its next navigation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLimit {
    pub indexes: Vec<usize>,
    pub tests: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PendingLimits {
    queue: Vec<PendingLimit>,
}

impl PendingLimits {
    pub fn new() -> Self {
        Self { queue: Vec::new() }
    }

    pub fn push(&mut self, limit: PendingLimit) {
        self.queue.push(limit);
    }

    pub fn drain(&mut self) -> Vec<PendingLimit> {
        std::mem::take(&mut self.queue)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
