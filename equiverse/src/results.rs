use serde_json::json;

use crate::engines::simulation::CounterExample;
use crate::verdict::Verdict;

/// Everything a run produces besides its side effects: timings, the final
/// verdict, simulation bookkeeping, and the per-engine reports of the
/// checkers that ran in-process.
#[derive(Clone, Debug, Default)]
pub struct Results {
    pub preprocessing_time: f64,
    pub check_time: f64,
    pub equivalence: Verdict,
    pub started_simulations: u64,
    pub performed_simulations: u64,
    /// Witness of non-equivalence from a failing in-process simulation
    /// trial. Trials that ran in isolated workers cannot deliver one.
    pub counter_example: Option<CounterExample>,
    pub performed_instantiations: u64,
    pub checker_results: Vec<serde_json::Value>,
}

impl Results {
    #[must_use]
    pub fn considered_equivalent(&self) -> bool {
        self.equivalence.considered_equivalent()
    }

    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        let mut value = json!({
            "preprocessing_time": self.preprocessing_time,
            "check_time": self.check_time,
            "equivalence": self.equivalence.as_str(),
            "parameterized": {
                "performed_instantiations": self.performed_instantiations,
            },
            "checkers": self.checker_results,
        });
        if self.started_simulations > 0 {
            value["simulations"] = json!({
                "started": self.started_simulations,
                "performed": self.performed_simulations,
            });
        }
        value
    }
}

impl std::fmt::Display for Results {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = serde_json::to_string_pretty(&self.json())
            .unwrap_or_else(|_| self.equivalence.as_str().to_string());
        f.write_str(&rendered)
    }
}
