use crate::defuzz::DefuzzMethod;
use crate::error::Result;
use crate::norms::{SNorm, TNorm};
use crate::rule::Rule;
use crate::schema_error;
use crate::variable::{InputVariable, OutputVariable};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule aggregation order.
///
/// FIT implicates every rule separately and aggregates the clipped results;
/// FATI first folds the activations of rules sharing a consequent label with
/// the S-norm, then implicates once per label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferenceMode {
    #[serde(rename = "FIT")]
    Fit,
    #[serde(rename = "FATI")]
    Fati,
}

impl InferenceMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "FIT" => Some(Self::Fit),
            "FATI" => Some(Self::Fati),
            _ => None,
        }
    }
}

impl fmt::Display for InferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fit => "FIT",
            Self::Fati => "FATI",
        })
    }
}

/// Container aggregating variables, rules, and engine settings.
///
/// Built by the parser or the learner and never mutated afterwards; the
/// engine and classifier borrow it read-only, so one knowledge base can be
/// shared across threads freely. Rule order is load order and defines the
/// stable `rule_index` surfaced by explanations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub inputs: IndexMap<String, InputVariable>,
    pub outputs: IndexMap<String, OutputVariable>,
    pub rules: Vec<Rule>,
    pub tnorm: TNorm,
    pub snorm: SNorm,
    pub mode: InferenceMode,
    pub defuzz: DefuzzMethod,
    pub schema_version: u32,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self {
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            rules: Vec::new(),
            tnorm: TNorm::Min,
            snorm: SNorm::Max,
            mode: InferenceMode::Fit,
            defuzz: DefuzzMethod::Centroid,
            schema_version: 1,
        }
    }
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(&mut self, var: InputVariable) -> Result<()> {
        if self.inputs.contains_key(&var.name) || self.outputs.contains_key(&var.name) {
            return Err(schema_error!("duplicate variable name '{}'", var.name));
        }
        self.inputs.insert(var.name.clone(), var);
        Ok(())
    }

    pub fn add_output(&mut self, var: OutputVariable) -> Result<()> {
        if self.inputs.contains_key(&var.name) || self.outputs.contains_key(&var.name) {
            return Err(schema_error!("duplicate variable name '{}'", var.name));
        }
        self.outputs.insert(var.name.clone(), var);
        Ok(())
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_names_unique_across_kinds() {
        let mut kb = KnowledgeBase::new();
        kb.add_input(InputVariable::new("x", 0.0, 1.0).unwrap()).unwrap();
        assert!(kb.add_output(OutputVariable::new("x", 0.0, 1.0).unwrap()).is_err());
        assert!(kb.add_input(InputVariable::new("x", 0.0, 2.0).unwrap()).is_err());
    }

    #[test]
    fn defaults_match_engine_directives() {
        let kb = KnowledgeBase::new();
        assert_eq!(kb.tnorm, TNorm::Min);
        assert_eq!(kb.snorm, SNorm::Max);
        assert_eq!(kb.mode, InferenceMode::Fit);
        assert_eq!(kb.defuzz, DefuzzMethod::Centroid);
        assert_eq!(kb.schema_version, 1);
    }

    #[test]
    fn mode_names() {
        assert_eq!(InferenceMode::from_name("fati"), Some(InferenceMode::Fati));
        assert_eq!(InferenceMode::from_name("FIT"), Some(InferenceMode::Fit));
        assert_eq!(InferenceMode::from_name("other"), None);
        assert_eq!(InferenceMode::Fati.to_string(), "FATI");
    }
}
