//! Rule sets: komi, ko policy and scoring convention.
//!
//! A [`Rules`] identifier (as typed on the command line or stored by a
//! collaborator) resolves to a [`RuleSet`], which is the configuration the
//! move validator and scorer actually read.

use std::fmt;
use std::str::FromStr;

use crate::constants::{AREA_KOMI, TERRITORY_KOMI};
use crate::error::Error;

/// Named rule sets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Rules {
    Chinese,
    Japanese,
    Korean,
    Aga,
    NewZealand,
}

/// How repeated positions are handled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KoRule {
    /// Only the immediate recapture of a single stone is forbidden.
    Simple,
    /// No move may recreate a board occupancy seen earlier on the same line of play.
    PositionalSuperko,
}

/// How the final score is counted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scoring {
    /// Stones on the board plus surrounded empty points.
    Area,
    /// Surrounded empty points plus prisoners.
    Territory,
}

/// The validator/scorer configuration a [`Rules`] identifier resolves to.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RuleSet {
    pub rules: Rules,
    pub komi: f32,
    pub ko: KoRule,
    pub scoring: Scoring,
}

impl Rules {
    pub const ALL: [Rules; 5] = [
        Rules::Chinese,
        Rules::Japanese,
        Rules::Korean,
        Rules::Aga,
        Rules::NewZealand,
    ];

    pub fn rule_set(self) -> RuleSet {
        let (komi, ko, scoring) = match self {
            Rules::Chinese | Rules::Aga | Rules::NewZealand => {
                (AREA_KOMI, KoRule::PositionalSuperko, Scoring::Area)
            }
            Rules::Japanese | Rules::Korean => (TERRITORY_KOMI, KoRule::Simple, Scoring::Territory),
        };
        RuleSet {
            rules: self,
            komi,
            ko,
            scoring,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Rules::Chinese => "chinese",
            Rules::Japanese => "japanese",
            Rules::Korean => "korean",
            Rules::Aga => "aga",
            Rules::NewZealand => "new-zealand",
        }
    }
}

impl fmt::Display for Rules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Rules {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Rules::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownRules {
                name: wanted.to_string(),
            })
    }
}

impl RuleSet {
    /// Override the rule set's default komi.
    pub fn with_komi(mut self, komi: f32) -> Self {
        self.komi = komi;
        self
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Rules::Chinese.rule_set()
    }
}

impl From<Rules> for RuleSet {
    fn from(rules: Rules) -> Self {
        rules.rule_set()
    }
}

impl FromStr for RuleSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Rules>().map(Rules::rule_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rules_case_insensitive() {
        assert_eq!("Japanese".parse::<Rules>().unwrap(), Rules::Japanese);
        assert_eq!(" AGA ".parse::<Rules>().unwrap(), Rules::Aga);
        assert_eq!("New-Zealand".parse::<Rules>().unwrap(), Rules::NewZealand);
        for rules in Rules::ALL {
            assert_eq!(rules.to_string().parse::<Rules>().unwrap(), rules);
        }
    }

    #[test]
    fn test_unknown_rules() {
        let err = "ing".parse::<Rules>().unwrap_err();
        assert_eq!(
            err,
            Error::UnknownRules {
                name: "ing".to_string()
            }
        );
    }

    #[test]
    fn test_rule_set_defaults() {
        let chinese = RuleSet::default();
        assert_eq!(chinese.rules, Rules::Chinese);
        assert_eq!(chinese.komi, 7.5);
        assert_eq!(chinese.ko, KoRule::PositionalSuperko);
        assert_eq!(chinese.scoring, Scoring::Area);

        let japanese: RuleSet = Rules::Japanese.into();
        assert_eq!(japanese.komi, 6.5);
        assert_eq!(japanese.ko, KoRule::Simple);
        assert_eq!(japanese.scoring, Scoring::Territory);
    }

    #[test]
    fn test_new_zealand_uses_area_scoring() {
        let nz = Rules::NewZealand.rule_set();
        assert_eq!(nz.komi, AREA_KOMI);
        assert_eq!(nz.ko, KoRule::PositionalSuperko);
        assert_eq!(nz.scoring, Scoring::Area);
    }

    #[test]
    fn test_with_komi() {
        let rs = Rules::Japanese.rule_set().with_komi(0.5);
        assert_eq!(rs.komi, 0.5);
        assert_eq!(rs.ko, KoRule::Simple);
    }
}
