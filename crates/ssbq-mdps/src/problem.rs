//! Registry of the shipped benchmark problems

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use ssbq_core::SsbqError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Problem {
    Gardner,
    SequentialGardner,
    Grid,
    Garnets,
    #[serde(rename = "datacenter")]
    DataCenter,
    Million,
}

impl Problem {
    pub const ALL: [Problem; 6] = [
        Problem::Gardner,
        Problem::SequentialGardner,
        Problem::Grid,
        Problem::Garnets,
        Problem::DataCenter,
        Problem::Million,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Problem::Gardner => "gardner",
            Problem::SequentialGardner => "sequential-gardner",
            Problem::Grid => "grid",
            Problem::Garnets => "garnets",
            Problem::DataCenter => "datacenter",
            Problem::Million => "million",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Problem::Gardner => "Gardner's non-transitive dice, one throw",
            Problem::SequentialGardner => "Gardner's dice, decide on A before choosing B or C",
            Problem::Grid => "3x3 grid with cyclic preferences over three corners",
            Problem::Garnets => "random garnet MDP, 100 states, 5 actions, horizon 50",
            Problem::DataCenter => "server provisioning under Poisson load, cost budget 2000",
            Problem::Million => "who wants to be a millionaire, 15 questions, 3 lifelines",
        }
    }

    /// Whether the problem comes with a known SSB equilibrium
    pub fn has_equilibrium(&self) -> bool {
        matches!(
            self,
            Problem::Gardner | Problem::SequentialGardner | Problem::Grid | Problem::Million
        )
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Problem {
    type Err = SsbqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gardner" => Ok(Problem::Gardner),
            "sequential-gardner" | "sequential" => Ok(Problem::SequentialGardner),
            "grid" => Ok(Problem::Grid),
            "garnets" => Ok(Problem::Garnets),
            "datacenter" | "data-center" => Ok(Problem::DataCenter),
            "million" | "millionaire" => Ok(Problem::Million),
            _ => Err(SsbqError::Config(format!(
                "unknown problem '{s}', expected one of: {}",
                Problem::ALL.map(|p| p.name()).join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for problem in Problem::ALL {
            assert_eq!(problem.name().parse::<Problem>().unwrap(), problem);
            assert_eq!(problem.to_string(), problem.name());
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("Sequential".parse::<Problem>().unwrap(), Problem::SequentialGardner);
        assert_eq!("millionaire".parse::<Problem>().unwrap(), Problem::Million);
        assert!(matches!("chess".parse::<Problem>(), Err(SsbqError::Config(_))));
    }

    #[test]
    fn test_serde_matches_display() {
        for problem in Problem::ALL {
            let json = serde_json::to_string(&problem).unwrap();
            assert_eq!(json, format!("\"{problem}\""));
        }
    }
}
