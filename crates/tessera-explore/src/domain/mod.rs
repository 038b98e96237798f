pub mod resolver;

use std::fmt;

use tessera_ir::types::ArgConfig;
use tessera_ir::value::{Args, Value};

/// Computes a domain from the values chosen for all earlier arguments.
/// Must return the same list for the same prefix.
pub type DomainFn = Box<dyn Fn(&Args) -> Vec<Value>>;

/// Caller-supplied value equality, replacing structural `PartialEq`.
pub type EqualsFn = Box<dyn Fn(&Value, &Value) -> bool>;

/// The ordered set of admissible values for one argument.
pub enum Domain {
    Static(Vec<Value>),
    Dynamic(DomainFn),
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Static(values) => f.debug_tuple("Static").field(values).finish(),
            Domain::Dynamic(_) => f.write_str("Dynamic(<fn>)"),
        }
    }
}

/// A named argument and its domain.
#[derive(Debug)]
pub struct ArgSpec {
    pub name: String,
    pub domain: Domain,
}

/// Ordered argument templates, built up front and handed to the iterator.
#[derive(Debug, Default)]
pub struct ArgTemplates {
    specs: Vec<ArgSpec>,
}

impl ArgTemplates {
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    /// Append an argument with a fixed list of values.
    pub fn fixed<V: Into<Value>>(mut self, name: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.specs.push(ArgSpec {
            name: name.to_string(),
            domain: Domain::Static(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    /// Append an argument whose values depend on earlier arguments.
    pub fn dynamic(mut self, name: &str, f: impl Fn(&Args) -> Vec<Value> + 'static) -> Self {
        self.specs.push(ArgSpec {
            name: name.to_string(),
            domain: Domain::Dynamic(Box::new(f)),
        });
        self
    }

    pub fn from_config(args: &[ArgConfig]) -> Self {
        Self {
            specs: args
                .iter()
                .map(|a| ArgSpec {
                    name: a.name.clone(),
                    domain: Domain::Static(a.values.clone()),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.name.as_str())
    }

    pub fn into_specs(self) -> Vec<ArgSpec> {
        self.specs
    }
}
