use std::fmt;
use std::str::FromStr;

use derive_more::TryFrom;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// The outcome of an equivalence check.
///
/// The discriminants are the stable codes used on the worker wire protocol;
/// the serde representation uses the stable strings of the results format.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TryFrom,
)]
#[serde(rename_all = "snake_case")]
#[try_from(repr)]
#[repr(i32)]
pub enum Verdict {
    #[default]
    NoInformation = 0,
    NotEquivalent = 1,
    Equivalent = 2,
    EquivalentUpToPhase = 3,
    EquivalentUpToGlobalPhase = 4,
    ProbablyEquivalent = 5,
    ProbablyNotEquivalent = 6,
}

impl Verdict {
    pub const ALL: [Verdict; 7] = [
        Verdict::NoInformation,
        Verdict::NotEquivalent,
        Verdict::Equivalent,
        Verdict::EquivalentUpToPhase,
        Verdict::EquivalentUpToGlobalPhase,
        Verdict::ProbablyEquivalent,
        Verdict::ProbablyNotEquivalent,
    ];

    /// Whether this verdict counts as "the circuits are equivalent".
    #[must_use]
    pub fn considered_equivalent(self) -> bool {
        matches!(
            self,
            Verdict::Equivalent
                | Verdict::ProbablyEquivalent
                | Verdict::EquivalentUpToGlobalPhase
                | Verdict::EquivalentUpToPhase
        )
    }

    /// The stable string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::NoInformation => "no_information",
            Verdict::NotEquivalent => "not_equivalent",
            Verdict::Equivalent => "equivalent",
            Verdict::EquivalentUpToPhase => "equivalent_up_to_phase",
            Verdict::EquivalentUpToGlobalPhase => "equivalent_up_to_global_phase",
            Verdict::ProbablyEquivalent => "probably_equivalent",
            Verdict::ProbablyNotEquivalent => "probably_not_equivalent",
        }
    }

    /// The wire code used across the isolation boundary.
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verdict::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| EngineError::InvalidArgument(format!("unknown verdict: {s}")))
    }
}

/// The proof strategy an engine implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Construction,
    Simulation,
    Alternating,
    Zx,
}

impl EngineKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Construction => "construction",
            EngineKind::Simulation => "simulation",
            EngineKind::Alternating => "alternating",
            EngineKind::Zx => "zx",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn considered_equivalent_matches_the_documented_set() {
        for verdict in Verdict::ALL {
            let expected = matches!(
                verdict,
                Verdict::Equivalent
                    | Verdict::ProbablyEquivalent
                    | Verdict::EquivalentUpToGlobalPhase
                    | Verdict::EquivalentUpToPhase
            );
            assert_eq!(verdict.considered_equivalent(), expected);
        }
    }

    #[test]
    fn string_round_trip_is_a_bijection() {
        for verdict in Verdict::ALL {
            assert_eq!(verdict.as_str().parse::<Verdict>().unwrap(), verdict);
        }
        assert!("nearly_equivalent".parse::<Verdict>().is_err());
    }

    #[test]
    fn wire_codes_round_trip() {
        for verdict in Verdict::ALL {
            assert_eq!(Verdict::try_from(verdict.code()).unwrap(), verdict);
        }
        assert!(Verdict::try_from(42).is_err());
    }

    #[test]
    fn serde_uses_stable_strings() {
        let json = serde_json::to_string(&Verdict::EquivalentUpToGlobalPhase).unwrap();
        assert_eq!(json, "\"equivalent_up_to_global_phase\"");
        let parsed: Verdict = serde_json::from_str("\"probably_not_equivalent\"").unwrap();
        assert_eq!(parsed, Verdict::ProbablyNotEquivalent);

        assert_eq!(
            serde_json::to_string(&EngineKind::Zx).unwrap(),
            "\"zx\""
        );
    }

    proptest! {
        #[test]
        fn arbitrary_codes_never_panic(code in any::<i32>()) {
            let _ = Verdict::try_from(code);
        }
    }
}
