use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Top-level variants configuration: static argument domains, the mode list,
/// and the limit policy knobs.
///
/// Dynamic (computed) domains cannot be expressed in JSON; they are added
/// programmatically on top of a parsed config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantsConfig {
    /// Arguments in enumeration order (first = most significant).
    #[serde(default)]
    pub args: Vec<ArgConfig>,
    /// Traversal modes, visited in order once per external cycle.
    #[serde(default = "default_modes")]
    pub modes: Vec<ModeConfig>,
    /// Whether the best-known failing combination itself stays admissible.
    #[serde(default)]
    pub include_error_variant: bool,
    /// Whether accepted limits cap every argument's index independently.
    #[serde(default)]
    pub limit_arg_on_error: bool,
    /// Global seed for random mode and per-combination seeds.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for VariantsConfig {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            modes: default_modes(),
            include_error_variant: false,
            limit_arg_on_error: false,
            seed: None,
        }
    }
}

fn default_modes() -> Vec<ModeConfig> {
    vec![ModeConfig::Forward(SequentialMode::default())]
}

// ── Arguments ────────────────────────────────────────────────────────

/// A named argument with a static value domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgConfig {
    pub name: String,
    pub values: Vec<Value>,
}

// ── Modes ────────────────────────────────────────────────────────────

/// A traversal mode. Unknown `mode` tags fail to deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ModeConfig {
    /// Ascending lexicographic order of index vectors.
    Forward(SequentialMode),
    /// Descending order, starting from the largest admissible combination.
    Backward(SequentialMode),
    /// Independent per-argument sampling. Needs a budget to ever end.
    Random(RandomMode),
}

impl ModeConfig {
    pub fn kind(&self) -> ModeKind {
        match self {
            ModeConfig::Forward(_) => ModeKind::Forward,
            ModeConfig::Backward(_) => ModeKind::Backward,
            ModeConfig::Random(_) => ModeKind::Random,
        }
    }

    pub fn budget(&self) -> ModeBudget {
        match self {
            ModeConfig::Forward(m) | ModeConfig::Backward(m) => ModeBudget {
                limit_tests: m.limit_tests,
                limit_time_ms: m.limit_time_ms,
            },
            ModeConfig::Random(m) => ModeBudget {
                limit_tests: m.limit_tests,
                limit_time_ms: m.limit_time_ms,
            },
        }
    }

    /// Full passes per activation. Random mode runs one budgeted pass.
    pub fn cycles(&self) -> u32 {
        match self {
            ModeConfig::Forward(m) | ModeConfig::Backward(m) => m.cycles,
            ModeConfig::Random(_) => 1,
        }
    }

    /// Consecutive yields of each combination. Always 1 for random mode.
    pub fn repeats_per_variant(&self) -> u32 {
        match self {
            ModeConfig::Forward(m) | ModeConfig::Backward(m) => m.repeats_per_variant,
            ModeConfig::Random(_) => 1,
        }
    }
}

/// Mode tag without its payload, for logging and stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    Forward,
    Backward,
    Random,
}

impl std::fmt::Display for ModeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeKind::Forward => write!(f, "forward"),
            ModeKind::Backward => write!(f, "backward"),
            ModeKind::Random => write!(f, "random"),
        }
    }
}

/// Settings for forward and backward traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialMode {
    /// Full passes before switching to the next mode.
    #[serde(default = "one")]
    pub cycles: u32,
    /// Times each combination is yielded back to back.
    #[serde(default = "one")]
    pub repeats_per_variant: u32,
    /// Max yields per activation (repeats included).
    #[serde(default)]
    pub limit_tests: Option<u64>,
    /// Max milliseconds per activation.
    #[serde(default)]
    pub limit_time_ms: Option<u64>,
}

impl Default for SequentialMode {
    fn default() -> Self {
        Self {
            cycles: 1,
            repeats_per_variant: 1,
            limit_tests: None,
            limit_time_ms: None,
        }
    }
}

/// Settings for random traversal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RandomMode {
    #[serde(default)]
    pub limit_tests: Option<u64>,
    #[serde(default)]
    pub limit_time_ms: Option<u64>,
}

/// Test/time budget of one mode activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeBudget {
    pub limit_tests: Option<u64>,
    pub limit_time_ms: Option<u64>,
}

impl ModeBudget {
    pub fn is_unbounded(&self) -> bool {
        self.limit_tests.is_none() && self.limit_time_ms.is_none()
    }

    /// True once either cap is reached.
    pub fn exhausted(&self, tests: u64, elapsed_ms: u64) -> bool {
        self.limit_tests.is_some_and(|max| tests >= max)
            || self.limit_time_ms.is_some_and(|max| elapsed_ms >= max)
    }
}

fn one() -> u32 {
    1
}
