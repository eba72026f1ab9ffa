use serde::{Deserialize, Serialize};
use std::fmt;

/// Fuzzy rule: AND-combined (variable, label) antecedent literals, a single
/// (output variable, label) consequent, a non-negative weight, and an
/// active flag. Rules are referenced by their stable position in the
/// knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub antecedent: Vec<(String, String)>,
    pub consequent: (String, String),
    pub weight: f64,
    pub active: bool,
}

impl Rule {
    pub fn new(antecedent: Vec<(String, String)>, consequent: (String, String)) -> Self {
        Self { antecedent, consequent, weight: 1.0, active: true }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IF ")?;
        for (i, (var, label)) in self.antecedent.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{} is {}", var, label)?;
        }
        write!(f, " THEN {} is {}", self.consequent.0, self.consequent.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_grammar_shape() {
        let rule = Rule::new(
            vec![("service".into(), "good".into()), ("food".into(), "tasty".into())],
            ("tip".into(), "high".into()),
        );
        assert_eq!(
            rule.to_string(),
            "IF service is good AND food is tasty THEN tip is high"
        );
    }

    #[test]
    fn defaults() {
        let rule = Rule::new(vec![("a".into(), "x".into())], ("o".into(), "y".into()));
        assert_eq!(rule.weight, 1.0);
        assert!(rule.active);
        assert!(!rule.clone().inactive().active);
        assert_eq!(rule.with_weight(0.5).weight, 0.5);
    }
}
