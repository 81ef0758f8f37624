//! Head-motion scenarios for the simulation harness.

use crate::pose::MotionProfile;

/// Minimum length of the marathon run, in ticks.
pub const MARATHON_TICKS: u64 = 10_000;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: translation only, straight-ish walking
    Walk,

    /// SIM-002: rotation only, looking around in place
    Turn,

    /// SIM-003: simultaneous translation and rotation every tick
    Wander,

    /// SIM-004: a still head with tracker noise
    Jitter,

    /// SIM-005: long combined run for drift accumulation
    Marathon,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Walk,
            ScenarioId::Turn,
            ScenarioId::Wander,
            ScenarioId::Jitter,
            ScenarioId::Marathon,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Walk => "walk",
            ScenarioId::Turn => "turn",
            ScenarioId::Wander => "wander",
            ScenarioId::Jitter => "jitter",
            ScenarioId::Marathon => "marathon",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Walk => "Translation-only head motion, frames walk great circles",
            ScenarioId::Turn => "Rotation-only head motion, position must stay fixed",
            ScenarioId::Wander => "Translation and rotation combined on every tick",
            ScenarioId::Jitter => "Still head with 0.1mm tracker noise around the no-op threshold",
            ScenarioId::Marathon => "10,000+ combined ticks, orthonormality drift check",
        }
    }

    /// Motion generated for this scenario.
    pub fn motion_profile(&self) -> MotionProfile {
        match self {
            ScenarioId::Walk => MotionProfile::walk(),
            ScenarioId::Turn => MotionProfile::turn(),
            ScenarioId::Wander | ScenarioId::Marathon => MotionProfile::wander(),
            ScenarioId::Jitter => MotionProfile::jitter(),
        }
    }

    /// Number of ticks to run, given the requested count.
    pub fn ticks(&self, requested: u64) -> u64 {
        match self {
            ScenarioId::Marathon => requested.max(MARATHON_TICKS),
            _ => requested,
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "walk" | "sim-001" => Ok(ScenarioId::Walk),
            "turn" | "sim-002" => Ok(ScenarioId::Turn),
            "wander" | "sim-003" => Ok(ScenarioId::Wander),
            "jitter" | "sim-004" => Ok(ScenarioId::Jitter),
            "marathon" | "sim-005" => Ok(ScenarioId::Marathon),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("SIM-003".parse::<ScenarioId>(), Ok(ScenarioId::Wander));
        assert!("sprint".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_marathon_has_minimum_length() {
        assert_eq!(ScenarioId::Marathon.ticks(100), MARATHON_TICKS);
        assert_eq!(ScenarioId::Marathon.ticks(20_000), 20_000);
        assert_eq!(ScenarioId::Walk.ticks(100), 100);
    }
}
