use crate::knowledge::{InferenceMode, KnowledgeBase};
use crate::utils::clamp01;
use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::HashMap;

/// One evaluated antecedent literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AntecedentTerm {
    pub var: String,
    pub label: String,
    pub value: f64,
    pub mu: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consequent {
    pub var: String,
    pub label: String,
}

/// Activation record for a single fired rule. `rule_index` is the stable
/// 0-based position of the rule in the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleActivation {
    pub rule_index: usize,
    pub antecedent: Vec<AntecedentTerm>,
    pub alpha: f64,
    pub weight: f64,
    pub consequent: Consequent,
}

/// Explanation of the rules fired for one output variable. In FATI mode
/// `label_strengths` carries the S-norm-folded activation per consequent
/// label; in FIT mode it is absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_strengths: Option<IndexMap<String, f64>>,
    pub activations: Vec<RuleActivation>,
}

/// Classification result for one output variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub chosen: Option<String>,
    pub strengths: IndexMap<String, f64>,
}

/// Rule-activation explainer and label classifier.
///
/// Runs the same activation pipeline as the engine (active rules, soft skip
/// on missing inputs, alpha = clip01(T(mu...) * weight)) but stops before
/// implication: no defuzzification is involved.
pub struct Classifier<'a> {
    kb: &'a KnowledgeBase,
}

impl<'a> Classifier<'a> {
    pub fn new(kb: &'a KnowledgeBase) -> Self {
        Self { kb }
    }

    /// Membership cache over the inputs actually supplied: (var, label) -> mu.
    /// Variables absent from `inputs` contribute no entries, which is what
    /// makes rules referencing them skip.
    fn membership_cache(&self, inputs: &HashMap<String, f64>) -> HashMap<(&'a str, &'a str), f64> {
        let mut cache = HashMap::new();
        for (vname, var) in &self.kb.inputs {
            let Some(&x) = inputs.get(vname) else { continue };
            for (label, mf) in &var.terms {
                cache.insert((vname.as_str(), label.as_str()), mf.mu(x));
            }
        }
        cache
    }

    /// Per-output activation records for every fired rule with
    /// alpha >= threshold, in stable rule order.
    pub fn explain(
        &self,
        inputs: &HashMap<String, f64>,
        mode: Option<InferenceMode>,
        threshold: f64,
    ) -> IndexMap<String, Explanation> {
        let mode = mode.unwrap_or(self.kb.mode);
        let cache = self.membership_cache(inputs);

        let mut results = IndexMap::new();
        for oname in self.kb.outputs.keys() {
            let mut activations = Vec::new();

            'rules: for (index, rule) in self.kb.rules.iter().enumerate() {
                if !rule.active || rule.consequent.0 != *oname {
                    continue;
                }
                let mut mus: SmallVec<[f64; 8]> = SmallVec::new();
                let mut antecedent = Vec::with_capacity(rule.antecedent.len());
                for (var, label) in &rule.antecedent {
                    let Some(&mu) = cache.get(&(var.as_str(), label.as_str())) else {
                        continue 'rules;
                    };
                    mus.push(mu);
                    antecedent.push(AntecedentTerm {
                        var: var.clone(),
                        label: label.clone(),
                        value: inputs.get(var).copied().unwrap_or(0.0),
                        mu,
                    });
                }
                let alpha = clamp01(self.kb.tnorm.apply(&mus) * rule.weight);
                // alpha = 0 means the rule did not fire
                if alpha <= 0.0 || alpha < threshold {
                    continue;
                }
                activations.push(RuleActivation {
                    rule_index: index,
                    antecedent,
                    alpha,
                    weight: rule.weight,
                    consequent: Consequent {
                        var: rule.consequent.0.clone(),
                        label: rule.consequent.1.clone(),
                    },
                });
            }

            let label_strengths = match mode {
                InferenceMode::Fati => Some(fold_label_strengths(self.kb, &activations)),
                InferenceMode::Fit => None,
            };
            results.insert(oname.clone(), Explanation { label_strengths, activations });
        }
        results
    }

    /// Chosen label and per-label strengths for every output.
    ///
    /// FIT takes the maximum alpha per label; FATI folds alphas per label
    /// with the S-norm. Ties go to the first-encountered label, and with no
    /// fired rule `chosen` is `None` over empty strengths.
    pub fn classify(
        &self,
        inputs: &HashMap<String, f64>,
        mode: Option<InferenceMode>,
    ) -> IndexMap<String, Classification> {
        let mode = mode.unwrap_or(self.kb.mode);
        let explained = self.explain(inputs, Some(mode), 0.0);

        let mut out = IndexMap::new();
        for (oname, explanation) in explained {
            let strengths = match explanation.label_strengths {
                Some(strengths) => strengths,
                None => {
                    let mut per: IndexMap<String, f64> = IndexMap::new();
                    for activation in &explanation.activations {
                        let entry = per.entry(activation.consequent.label.clone()).or_insert(0.0);
                        if activation.alpha > *entry {
                            *entry = activation.alpha;
                        }
                    }
                    per
                }
            };
            let chosen = argmax_label(&strengths);
            out.insert(oname, Classification { chosen, strengths });
        }
        out
    }
}

fn fold_label_strengths(
    kb: &KnowledgeBase,
    activations: &[RuleActivation],
) -> IndexMap<String, f64> {
    let mut strengths: IndexMap<String, f64> = IndexMap::new();
    for activation in activations {
        let entry = strengths.entry(activation.consequent.label.clone()).or_insert(0.0);
        *entry = kb.snorm.pair(*entry, activation.alpha);
    }
    strengths
}

/// First-encountered label with the strictly greatest strength.
fn argmax_label(strengths: &IndexMap<String, f64>) -> Option<String> {
    let mut best: Option<(&String, f64)> = None;
    for (label, &strength) in strengths {
        match best {
            Some((_, current)) if strength <= current => {}
            _ => best = Some((label, strength)),
        }
    }
    best.map(|(label, _)| label.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::MembershipFunction;
    use crate::norms::SNorm;
    use crate::rule::Rule;
    use crate::variable::{InputVariable, OutputVariable};

    /// One input whose single term is fully on over the whole domain, so
    /// rule weights become the activations directly.
    fn weighted_kb(weights: &[(f64, &str)]) -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        let mut x = InputVariable::new("x", 0.0, 1.0).unwrap();
        x.add_term("on", MembershipFunction::trapezoidal(0.0, 0.0, 1.0, 1.0).unwrap())
            .unwrap();
        kb.add_input(x).unwrap();

        let mut class = OutputVariable::new("class", 0.0, 1.0).unwrap();
        class
            .add_term("a", MembershipFunction::triangular(0.0, 0.0, 1.0).unwrap())
            .unwrap();
        class
            .add_term("b", MembershipFunction::triangular(0.0, 1.0, 1.0).unwrap())
            .unwrap();
        kb.add_output(class).unwrap();

        for (weight, label) in weights {
            kb.add_rule(
                Rule::new(vec![("x".into(), "on".into())], ("class".into(), (*label).into()))
                    .with_weight(*weight),
            );
        }
        kb
    }

    fn at(x: f64) -> HashMap<String, f64> {
        HashMap::from([("x".to_string(), x)])
    }

    #[test]
    fn fati_prob_folds_same_label_strengths() {
        let mut kb = weighted_kb(&[(0.3, "a"), (0.4, "a")]);
        kb.snorm = SNorm::Prob;
        let clf = Classifier::new(&kb);
        let result = clf.classify(&at(0.5), Some(InferenceMode::Fati));
        let strengths = &result["class"].strengths;
        assert!((strengths["a"] - 0.58).abs() < 1e-12);
        assert_eq!(result["class"].chosen.as_deref(), Some("a"));
    }

    #[test]
    fn fit_takes_max_alpha_per_label() {
        let kb = weighted_kb(&[(0.3, "a"), (0.4, "a"), (0.2, "b")]);
        let clf = Classifier::new(&kb);
        let result = clf.classify(&at(0.5), None);
        assert_eq!(result["class"].strengths["a"], 0.4);
        assert_eq!(result["class"].strengths["b"], 0.2);
        assert_eq!(result["class"].chosen.as_deref(), Some("a"));
    }

    #[test]
    fn ties_break_to_first_encountered_label() {
        let kb = weighted_kb(&[(0.4, "b"), (0.4, "a")]);
        let clf = Classifier::new(&kb);
        let result = clf.classify(&at(0.5), None);
        assert_eq!(result["class"].chosen.as_deref(), Some("b"));
    }

    #[test]
    fn no_fired_rule_yields_none() {
        let kb = weighted_kb(&[(0.5, "a")]);
        let clf = Classifier::new(&kb);
        // the antecedent variable is missing entirely
        let result = clf.classify(&HashMap::new(), None);
        assert_eq!(result["class"].chosen, None);
        assert!(result["class"].strengths.is_empty());
    }

    #[test]
    fn zero_activation_counts_as_not_fired() {
        let kb = weighted_kb(&[(0.5, "a")]);
        let clf = Classifier::new(&kb);
        // x = 2 is outside the support of every term, so alpha is 0
        for mode in [InferenceMode::Fit, InferenceMode::Fati] {
            let result = clf.classify(&at(2.0), Some(mode));
            assert_eq!(result["class"].chosen, None);
            assert!(result["class"].strengths.is_empty());
        }
        assert!(clf.explain(&at(2.0), None, 0.0)["class"].activations.is_empty());
    }

    #[test]
    fn explain_reports_stable_rule_indices_and_mus() {
        let kb = weighted_kb(&[(0.3, "a"), (0.4, "b")]);
        let clf = Classifier::new(&kb);
        let explained = clf.explain(&at(0.5), None, 0.0);
        let activations = &explained["class"].activations;
        assert_eq!(activations.len(), 2);
        assert_eq!(activations[0].rule_index, 0);
        assert_eq!(activations[1].rule_index, 1);
        assert_eq!(activations[0].antecedent[0].var, "x");
        assert_eq!(activations[0].antecedent[0].mu, 1.0);
        assert_eq!(activations[0].antecedent[0].value, 0.5);
        assert!((activations[1].alpha - 0.4).abs() < 1e-12);
        assert!(explained["class"].label_strengths.is_none());
    }

    #[test]
    fn explain_threshold_filters_weak_rules() {
        let kb = weighted_kb(&[(0.1, "a"), (0.9, "b")]);
        let clf = Classifier::new(&kb);
        let explained = clf.explain(&at(0.5), None, 0.5);
        let activations = &explained["class"].activations;
        assert_eq!(activations.len(), 1);
        assert_eq!(activations[0].consequent.label, "b");
    }

    #[test]
    fn fati_explain_carries_sibling_strength_map() {
        let mut kb = weighted_kb(&[(0.3, "a"), (0.4, "a"), (0.2, "b")]);
        kb.snorm = SNorm::Max;
        let clf = Classifier::new(&kb);
        let explained = clf.explain(&at(0.5), Some(InferenceMode::Fati), 0.0);
        let strengths = explained["class"].label_strengths.as_ref().unwrap();
        assert_eq!(strengths["a"], 0.4);
        assert_eq!(strengths["b"], 0.2);
        // first-appearance order is preserved
        assert_eq!(strengths.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn inactive_rules_are_invisible() {
        let mut kb = weighted_kb(&[(0.3, "a")]);
        kb.add_rule(
            Rule::new(vec![("x".into(), "on".into())], ("class".into(), "b".into()))
                .with_weight(0.9)
                .inactive(),
        );
        let clf = Classifier::new(&kb);
        let result = clf.classify(&at(0.5), None);
        assert_eq!(result["class"].chosen.as_deref(), Some("a"));
        assert!(!result["class"].strengths.contains_key("b"));
    }
}
