//! Value-domain resolution.
//!
//! Resolves the ordered value list of one argument position given the values
//! chosen for the positions before it. Extension values (previously unseen
//! literals, usually from replayed failures) are appended after the base
//! domain so indexes already handed out stay stable.

use tessera_ir::value::{Args, Value};

use super::{ArgSpec, Domain, EqualsFn};

pub struct DomainResolver {
    specs: Vec<ArgSpec>,
    /// Per-position values appended after the base domain.
    extensions: Vec<Vec<Value>>,
    equals: Option<EqualsFn>,
    /// Bumped on every extension so cached static buffers can be refreshed.
    generation: u64,
}

impl DomainResolver {
    pub fn new(specs: Vec<ArgSpec>, equals: Option<EqualsFn>) -> Self {
        let extensions = specs.iter().map(|_| Vec::new()).collect();
        Self {
            specs,
            extensions,
            equals,
            generation: 0,
        }
    }

    /// Number of argument positions.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn name(&self, pos: usize) -> &str {
        &self.specs[pos].name
    }

    pub fn is_static(&self, pos: usize) -> bool {
        matches!(self.specs[pos].domain, Domain::Static(_))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match &self.equals {
            Some(eq) => eq(a, b),
            None => a == b,
        }
    }

    pub fn position_of(&self, values: &[Value], value: &Value) -> Option<usize> {
        values.iter().position(|v| self.values_equal(v, value))
    }

    /// Resolve the domain at `pos` into `buf`, replacing its contents.
    ///
    /// `prefix` must hold exactly the values chosen for positions `0..pos`.
    pub fn resolve_into(&self, pos: usize, prefix: &Args, buf: &mut Vec<Value>) {
        buf.clear();
        match &self.specs[pos].domain {
            Domain::Static(values) => buf.extend_from_slice(values),
            Domain::Dynamic(f) => buf.extend(f(prefix)),
        }
        for ext in &self.extensions[pos] {
            if self.position_of(buf, ext).is_none() {
                buf.push(ext.clone());
            }
        }
    }

    pub fn resolve(&self, pos: usize, prefix: &Args) -> Vec<Value> {
        let mut buf = Vec::new();
        self.resolve_into(pos, prefix, &mut buf);
        buf
    }

    /// Record `value` as an extension of the domain at `pos`.
    /// Returns false if it was already recorded.
    pub fn extend(&mut self, pos: usize, value: Value) -> bool {
        if self.position_of(&self.extensions[pos], &value).is_some() {
            return false;
        }
        log::debug!(
            "extending domain of '{}' with {}",
            self.specs[pos].name,
            value
        );
        self.extensions[pos].push(value);
        self.generation += 1;
        true
    }

    /// Index of `value` in the domain at `pos` for the given prefix,
    /// extending the domain first if the value has never been seen.
    pub fn index_of(&mut self, pos: usize, prefix: &Args, value: &Value) -> Option<usize> {
        let values = self.resolve(pos, prefix);
        if let Some(i) = self.position_of(&values, value) {
            return Some(i);
        }
        self.extend(pos, value.clone());
        let values = self.resolve(pos, prefix);
        self.position_of(&values, value)
    }
}

impl std::fmt::Debug for DomainResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainResolver")
            .field("specs", &self.specs)
            .field("extensions", &self.extensions)
            .field("generation", &self.generation)
            .finish()
    }
}
