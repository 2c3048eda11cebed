//! Configuration of the equivalence-checking portfolio.
//!
//! Options are split into six groups mirroring the public surface of the
//! checker: execution, optimizations, application schemes, functionality,
//! simulation, and parameterized circuits. The whole record round-trips
//! through JSON.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EngineError;

/// The kind of stimuli the simulation engine draws.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StateType {
    #[default]
    ComputationalBasis,
    Random1QBasis,
    Stabilizer,
}

impl StateType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StateType::ComputationalBasis => "computational_basis",
            StateType::Random1QBasis => "random_1Q_basis",
            StateType::Stabilizer => "stabilizer",
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "computational_basis" | "classical" | "0" => Ok(StateType::ComputationalBasis),
            "random_1Q_basis" | "local_quantum" | "1" => Ok(StateType::Random1QBasis),
            "stabilizer" | "global_quantum" | "2" => Ok(StateType::Stabilizer),
            other => Err(EngineError::InvalidArgument(format!(
                "unknown state type: {other}"
            ))),
        }
    }
}

impl Serialize for StateType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StateType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// How a checker interleaves the application of the two circuits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ApplicationSchemeType {
    Sequential,
    OneToOne,
    Lookahead,
    GateCost,
    #[default]
    Proportional,
}

impl ApplicationSchemeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationSchemeType::Sequential => "sequential",
            ApplicationSchemeType::OneToOne => "one_to_one",
            ApplicationSchemeType::Lookahead => "lookahead",
            ApplicationSchemeType::GateCost => "gate_cost",
            ApplicationSchemeType::Proportional => "proportional",
        }
    }
}

impl fmt::Display for ApplicationSchemeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationSchemeType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" | "reference" => Ok(ApplicationSchemeType::Sequential),
            "one_to_one" | "naive" => Ok(ApplicationSchemeType::OneToOne),
            "lookahead" => Ok(ApplicationSchemeType::Lookahead),
            "gate_cost" | "compilation_flow" => Ok(ApplicationSchemeType::GateCost),
            "proportional" => Ok(ApplicationSchemeType::Proportional),
            other => Err(EngineError::InvalidArgument(format!(
                "unknown application scheme: {other}"
            ))),
        }
    }
}

impl Serialize for ApplicationSchemeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ApplicationSchemeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One gate-cost rule: gate id, number of controls, cost.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRule(pub String, pub u32, pub u64);

/// A gate-cost profile, either loaded from a file or given inline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CostProfile {
    Path(PathBuf),
    Inline(Vec<CostRule>),
}

/// Resolved gate costs with a default of 1 for unknown combinations.
#[derive(Clone, Debug, Default)]
pub struct GateCosts {
    costs: HashMap<(String, u32), u64>,
}

impl GateCosts {
    /// Parse the textual profile format: one `<GATE_ID> <N_CONTROLS> <COST>`
    /// rule per line; blank lines and lines starting with `#` are skipped.
    pub fn parse(text: &str) -> Result<GateCosts, EngineError> {
        let mut costs = HashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((gate, controls, cost)) = line.split_whitespace().collect_tuple() else {
                return Err(EngineError::InvalidArgument(format!(
                    "malformed cost profile rule on line {}: {line}",
                    lineno + 1
                )));
            };
            let controls: u32 = controls.parse().map_err(|_| {
                EngineError::InvalidArgument(format!(
                    "invalid control count on line {}: {controls}",
                    lineno + 1
                ))
            })?;
            let cost: u64 = cost.parse().map_err(|_| {
                EngineError::InvalidArgument(format!(
                    "invalid cost on line {}: {cost}",
                    lineno + 1
                ))
            })?;
            costs.insert((gate.to_lowercase(), controls), cost);
        }
        Ok(GateCosts { costs })
    }

    pub fn from_profile(profile: &CostProfile) -> Result<GateCosts, EngineError> {
        match profile {
            CostProfile::Path(path) => {
                let text = std::fs::read_to_string(path).map_err(|err| {
                    EngineError::RuntimeError(format!(
                        "cannot read cost profile {}: {err}",
                        path.display()
                    ))
                })?;
                GateCosts::parse(&text)
            }
            CostProfile::Inline(rules) => Ok(GateCosts {
                costs: rules
                    .iter()
                    .map(|CostRule(gate, controls, cost)| {
                        ((gate.to_lowercase(), *controls), *cost)
                    })
                    .collect(),
            }),
        }
    }

    /// Cost of applying `gate` with `controls` controls. Unknown gates cost 1.
    #[must_use]
    pub fn cost(&self, gate: &str, controls: u32) -> u64 {
        self.costs
            .get(&(gate.to_lowercase(), controls))
            .copied()
            .unwrap_or(1)
    }
}

fn default_nthreads() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(2)
}

/// Options that orchestrate `run()`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Execution {
    pub parallel: bool,
    pub nthreads: u32,
    /// Wall-clock limit in seconds; zero or negative means none.
    pub timeout_seconds: f64,
    pub run_construction_checker: bool,
    pub run_simulation_checker: bool,
    pub run_alternating_checker: bool,
    pub run_zx_checker: bool,
    pub numerical_tolerance: f64,
    pub set_all_ancillae_garbage: bool,
}

impl Default for Execution {
    fn default() -> Self {
        Execution {
            parallel: true,
            nthreads: default_nthreads(),
            timeout_seconds: 0.0,
            run_construction_checker: false,
            run_simulation_checker: true,
            run_alternating_checker: true,
            run_zx_checker: true,
            numerical_tolerance: 1e-13,
            set_all_ancillae_garbage: false,
        }
    }
}

/// Options selecting which preprocessing passes run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Optimizations {
    pub fuse_single_qubit_gates: bool,
    pub reconstruct_swaps: bool,
    pub remove_diagonal_gates_before_measure: bool,
    pub transform_dynamic_circuit: bool,
    pub reorder_operations: bool,
    pub backpropagate_output_permutation: bool,
    pub elide_permutations: bool,
}

impl Default for Optimizations {
    fn default() -> Self {
        Optimizations {
            fuse_single_qubit_gates: true,
            reconstruct_swaps: true,
            remove_diagonal_gates_before_measure: true,
            transform_dynamic_circuit: false,
            reorder_operations: true,
            backpropagate_output_permutation: false,
            elide_permutations: true,
        }
    }
}

/// Per-checker application schemes plus the optional gate-cost profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Application {
    pub construction_scheme: ApplicationSchemeType,
    pub simulation_scheme: ApplicationSchemeType,
    pub alternating_scheme: ApplicationSchemeType,
    pub profile: Option<CostProfile>,
}

/// Options for checkers that consider the full functionality.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Functionality {
    pub trace_threshold: f64,
    pub check_partial_equivalence: bool,
}

impl Default for Functionality {
    fn default() -> Self {
        Functionality {
            trace_threshold: 1e-8,
            check_partial_equivalence: false,
        }
    }
}

/// Options for the simulation engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Simulation {
    pub fidelity_threshold: f64,
    pub max_sims: u64,
    pub state_type: StateType,
    /// RNG seed; zero draws from OS entropy.
    pub seed: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Simulation {
            fidelity_threshold: 1e-8,
            max_sims: (default_nthreads() as u64 / 2).max(16),
            state_type: StateType::default(),
            seed: 0,
        }
    }
}

/// Options for the parameterized (symbolic) flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameterized {
    /// Angles below this magnitude count as zero after instantiation.
    pub parameterized_tolerance: f64,
    pub additional_instantiations: u64,
}

impl Default for Parameterized {
    fn default() -> Self {
        Parameterized {
            parameterized_tolerance: 1e-12,
            additional_instantiations: 0,
        }
    }
}

/// The complete portfolio configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub execution: Execution,
    pub optimizations: Optimizations,
    pub application: Application,
    pub functionality: Functionality,
    pub simulation: Simulation,
    pub parameterized: Parameterized,
}

impl Configuration {
    /// Whether any engine would run under this configuration.
    #[must_use]
    pub fn anything_to_execute(&self) -> bool {
        self.task_count() > 0
    }

    /// Total number of worker tasks this configuration can produce.
    #[must_use]
    pub fn task_count(&self) -> u64 {
        let mut count = 0u64;
        if self.execution.run_alternating_checker {
            count += 1;
        }
        if self.execution.run_construction_checker {
            count += 1;
        }
        if self.execution.run_zx_checker {
            count += 1;
        }
        if self.execution.run_simulation_checker {
            count += self.simulation.max_sims;
        }
        count
    }

    /// At most one task would run, so parallelism buys nothing.
    #[must_use]
    pub fn only_single_task(&self) -> bool {
        self.task_count() <= 1
    }

    #[must_use]
    pub fn only_zx_checker_configured(&self) -> bool {
        self.execution.run_zx_checker
            && !self.execution.run_alternating_checker
            && !self.execution.run_construction_checker
            && !self.execution.run_simulation_checker
    }

    #[must_use]
    pub fn only_simulation_checker_configured(&self) -> bool {
        self.execution.run_simulation_checker
            && !self.execution.run_alternating_checker
            && !self.execution.run_construction_checker
            && !self.execution.run_zx_checker
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
