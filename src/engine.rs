use crate::knowledge::{InferenceMode, KnowledgeBase};
use crate::membership::MembershipFunction;
use crate::utils::clamp01;
use crate::variable::OutputVariable;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Antecedent literal compiled to indices: the input's position in the
/// knowledge base and a direct reference to its membership function.
struct CompiledLiteral<'a> {
    input: usize,
    mf: &'a MembershipFunction,
}

/// Rule compiled against one output variable. `label` is the consequent
/// term's position on that output, which doubles as the FATI bucket key.
struct CompiledRule<'a> {
    literals: SmallVec<[CompiledLiteral<'a>; 4]>,
    label: usize,
    mf: &'a MembershipFunction,
    weight: f64,
}

/// Mamdani inference engine.
///
/// Construction resolves every name in the rule base to indices once, so the
/// prediction loop runs on integer lookups only. Rules referencing unknown
/// variables or labels are dropped here with a warning; they are soft skips,
/// not errors (parser-built knowledge bases never contain them).
pub struct MamdaniEngine<'a> {
    kb: &'a KnowledgeBase,
    rules_by_output: Vec<Vec<CompiledRule<'a>>>,
}

impl<'a> MamdaniEngine<'a> {
    pub fn new(kb: &'a KnowledgeBase) -> Self {
        let mut rules_by_output: Vec<Vec<CompiledRule<'a>>> =
            kb.outputs.iter().map(|_| Vec::new()).collect();

        'rules: for (index, rule) in kb.rules.iter().enumerate() {
            if !rule.active {
                continue;
            }
            let Some(output) = kb.outputs.get_index_of(&rule.consequent.0) else {
                log::warn!(
                    "rule {}: consequent variable '{}' unknown, skipping",
                    index,
                    rule.consequent.0
                );
                continue;
            };
            let ovar = &kb.outputs[output];
            let Some((label, _, mf)) = ovar.terms.get_full(&rule.consequent.1) else {
                log::warn!(
                    "rule {}: label '{}' undefined on '{}', skipping",
                    index,
                    rule.consequent.1,
                    rule.consequent.0
                );
                continue;
            };

            let mut literals = SmallVec::new();
            for (var, term) in &rule.antecedent {
                let Some((input, _, ivar)) = kb.inputs.get_full(var) else {
                    log::warn!("rule {}: antecedent variable '{}' unknown, skipping", index, var);
                    continue 'rules;
                };
                let Some(imf) = ivar.terms.get(term) else {
                    log::warn!(
                        "rule {}: label '{}' undefined on '{}', skipping",
                        index,
                        term,
                        var
                    );
                    continue 'rules;
                };
                literals.push(CompiledLiteral { input, mf: imf });
            }

            rules_by_output[output].push(CompiledRule { literals, label, mf, weight: rule.weight });
        }

        Self { kb, rules_by_output }
    }

    /// Crisp output per output variable, in knowledge-base order.
    ///
    /// A rule whose antecedent references an input missing from `inputs` is
    /// skipped for this call only.
    pub fn predict(&self, inputs: &HashMap<String, f64>) -> IndexMap<String, f64> {
        let values: Vec<Option<f64>> =
            self.kb.inputs.keys().map(|name| inputs.get(name).copied()).collect();

        let mut out = IndexMap::new();
        for (oi, (oname, ovar)) in self.kb.outputs.iter().enumerate() {
            let implicants = self.implicants(oi, &values);

            let snorm = self.kb.snorm;
            let agg = |y: f64| {
                implicants
                    .iter()
                    .fold(0.0, |acc, (alpha, mf)| snorm.pair(acc, alpha.min(mf.mu(y))))
            };

            let (ymin, ymax, n) = resolve_grid(ovar);
            let ystar = self.kb.defuzz.apply(ymin, ymax, n, agg);
            out.insert(oname.clone(), ystar.clamp(ovar.vmin, ovar.vmax));
        }
        out
    }

    /// Implication inputs for one output: (alpha, consequent MF) pairs.
    /// FIT yields one pair per fired rule; FATI folds the alphas per
    /// consequent label first, in order of first appearance.
    fn implicants(
        &self,
        output: usize,
        values: &[Option<f64>],
    ) -> Vec<(f64, &'a MembershipFunction)> {
        let mut fired: Vec<(usize, f64, &'a MembershipFunction)> = Vec::new();
        'rules: for rule in &self.rules_by_output[output] {
            let mut mus: SmallVec<[f64; 8]> = SmallVec::new();
            for literal in &rule.literals {
                match values[literal.input] {
                    Some(x) => mus.push(literal.mf.mu(x)),
                    None => continue 'rules,
                }
            }
            let alpha = clamp01(self.kb.tnorm.apply(&mus) * rule.weight);
            if alpha > 0.0 {
                fired.push((rule.label, alpha, rule.mf));
            }
        }

        match self.kb.mode {
            InferenceMode::Fit => fired.into_iter().map(|(_, alpha, mf)| (alpha, mf)).collect(),
            InferenceMode::Fati => {
                let mut per_label: IndexMap<usize, (f64, &'a MembershipFunction)> = IndexMap::new();
                for (label, alpha, mf) in fired {
                    per_label
                        .entry(label)
                        .and_modify(|slot| slot.0 = self.kb.snorm.pair(slot.0, alpha))
                        .or_insert((alpha, mf));
                }
                per_label.into_values().collect()
            }
        }
    }
}

/// Resolve the defuzzification grid for an output variable.
///
/// A sentinel (0, 1) range or a degenerate one derives the range from the
/// union of term supports (variable domain if there are no terms); fewer
/// than 3 points becomes 201.
pub fn resolve_grid(ovar: &OutputVariable) -> (f64, f64, usize) {
    let (mut ymin, mut ymax, mut n) = ovar.grid;
    if ymin >= ymax || (ymin == 0.0 && ymax == 1.0) {
        if ovar.terms.is_empty() {
            ymin = ovar.vmin;
            ymax = ovar.vmax;
        } else {
            ymin = f64::INFINITY;
            ymax = f64::NEG_INFINITY;
            for mf in ovar.terms.values() {
                let (lo, hi) = mf.support();
                ymin = ymin.min(lo);
                ymax = ymax.max(hi);
            }
        }
    }
    if n < 3 {
        n = 201;
    }
    (ymin, ymax, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defuzz::DefuzzMethod;
    use crate::rule::Rule;
    use crate::variable::{InputVariable, OutputVariable};
    use proptest::prelude::*;

    fn tipping_kb() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();

        let mut service = InputVariable::new("service", 0.0, 10.0).unwrap();
        service
            .add_term("poor", MembershipFunction::triangular(0.0, 0.0, 5.0).unwrap())
            .unwrap();
        service
            .add_term("good", MembershipFunction::triangular(0.0, 5.0, 10.0).unwrap())
            .unwrap();
        service
            .add_term("excellent", MembershipFunction::triangular(5.0, 10.0, 10.0).unwrap())
            .unwrap();
        kb.add_input(service).unwrap();

        let mut tip = OutputVariable::new("tip", 0.0, 30.0).unwrap();
        tip.add_term("low", MembershipFunction::triangular(0.0, 0.0, 13.0).unwrap())
            .unwrap();
        tip.add_term("medium", MembershipFunction::triangular(0.0, 13.0, 26.0).unwrap())
            .unwrap();
        tip.add_term("high", MembershipFunction::triangular(13.0, 26.0, 30.0).unwrap())
            .unwrap();
        tip.grid = (0.0, 30.0, 201);
        kb.add_output(tip).unwrap();

        kb.add_rule(Rule::new(
            vec![("service".into(), "poor".into())],
            ("tip".into(), "low".into()),
        ));
        kb.add_rule(Rule::new(
            vec![("service".into(), "good".into())],
            ("tip".into(), "medium".into()),
        ));
        kb.add_rule(Rule::new(
            vec![("service".into(), "excellent".into())],
            ("tip".into(), "high".into()),
        ));
        kb
    }

    fn inputs(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn tipping_midrange_service() {
        let kb = tipping_kb();
        let engine = MamdaniEngine::new(&kb);
        let out = engine.predict(&inputs(&[("service", 5.0)]));
        assert!((out["tip"] - 13.0).abs() < 0.5, "got {}", out["tip"]);
    }

    #[test]
    fn tipping_worst_service() {
        let kb = tipping_kb();
        let engine = MamdaniEngine::new(&kb);
        let out = engine.predict(&inputs(&[("service", 0.0)]));
        assert!((out["tip"] - 4.33).abs() < 0.5, "got {}", out["tip"]);
    }

    #[test]
    fn missing_input_skips_rules_and_yields_grid_midpoint() {
        let kb = tipping_kb();
        let engine = MamdaniEngine::new(&kb);
        let out = engine.predict(&HashMap::new());
        assert_eq!(out["tip"], 15.0);
    }

    #[test]
    fn sentinel_grid_derives_range_from_supports() {
        let mut kb = KnowledgeBase::new();
        let mut x = InputVariable::new("x", 0.0, 1.0).unwrap();
        x.add_term("on", MembershipFunction::triangular(0.0, 0.5, 1.0).unwrap())
            .unwrap();
        kb.add_input(x).unwrap();

        let mut y = OutputVariable::new("y", 0.0, 50.0).unwrap();
        y.add_term("wide", MembershipFunction::triangular(0.0, 25.0, 50.0).unwrap())
            .unwrap();
        kb.add_output(y).unwrap();

        kb.add_rule(Rule::new(vec![("x".into(), "on".into())], ("y".into(), "wide".into())));

        let engine = MamdaniEngine::new(&kb);
        let out = engine.predict(&inputs(&[("x", 0.5)]));
        assert!(out["y"] > 1.0 && out["y"] <= 50.0, "got {}", out["y"]);
        assert!((out["y"] - 25.0).abs() < 0.5);
    }

    #[test]
    fn zero_weight_rules_never_fire() {
        let mut kb = tipping_kb();
        kb.add_rule(
            Rule::new(vec![("service".into(), "good".into())], ("tip".into(), "high".into()))
                .with_weight(0.0),
        );
        let baseline = MamdaniEngine::new(&tipping_kb()).predict(&inputs(&[("service", 5.0)]));
        let with_zero = MamdaniEngine::new(&kb).predict(&inputs(&[("service", 5.0)]));
        assert_eq!(baseline["tip"], with_zero["tip"]);
    }

    #[test]
    fn inactive_rules_never_fire() {
        let mut kb = tipping_kb();
        kb.add_rule(
            Rule::new(vec![("service".into(), "good".into())], ("tip".into(), "high".into()))
                .inactive(),
        );
        let baseline = MamdaniEngine::new(&tipping_kb()).predict(&inputs(&[("service", 5.0)]));
        let with_inactive = MamdaniEngine::new(&kb).predict(&inputs(&[("service", 5.0)]));
        assert_eq!(baseline["tip"], with_inactive["tip"]);
    }

    #[test]
    fn fit_and_fati_agree_on_distinct_consequents() {
        // every rule targets its own label, so label folding is a no-op
        let mut fit = tipping_kb();
        fit.mode = InferenceMode::Fit;
        let mut fati = tipping_kb();
        fati.mode = InferenceMode::Fati;
        for x in [0.0, 2.5, 5.0, 7.0, 10.0] {
            let a = MamdaniEngine::new(&fit).predict(&inputs(&[("service", x)]));
            let b = MamdaniEngine::new(&fati).predict(&inputs(&[("service", x)]));
            assert_eq!(a["tip"], b["tip"], "diverged at service={}", x);
        }
    }

    #[test]
    fn alternative_defuzz_methods_stay_in_range() {
        for method in [DefuzzMethod::Mom, DefuzzMethod::Bisector, DefuzzMethod::CentroidAdaptive] {
            let mut kb = tipping_kb();
            kb.defuzz = method;
            let engine = MamdaniEngine::new(&kb);
            let out = engine.predict(&inputs(&[("service", 3.0)]));
            assert!(
                (0.0..=30.0).contains(&out["tip"]),
                "{:?} escaped the domain: {}",
                method,
                out["tip"]
            );
        }
    }

    proptest! {
        #[test]
        fn prediction_stays_within_output_domain(service in -5.0f64..15.0) {
            let kb = tipping_kb();
            let engine = MamdaniEngine::new(&kb);
            let out = engine.predict(&inputs(&[("service", service)]));
            prop_assert!((0.0..=30.0).contains(&out["tip"]));
        }
    }
}
