//! Validating parser for the `.fz` knowledge-base grammar.
//!
//! Directives are processed top to bottom, one per line. Rule validation is
//! deferred to end of input so rules may forward-reference variables and
//! terms defined later; the defuzzification grid directive is likewise
//! applied to the output variables only after all of them exist. Every
//! error points at the offending line.

use crate::defuzz::DefuzzMethod;
use crate::error::{FuzzyError, Result};
use crate::knowledge::{InferenceMode, KnowledgeBase};
use crate::membership::MembershipFunction;
use crate::norms::{SNorm, TNorm};
use crate::parse_error;
use crate::rule::Rule;
use crate::variable::{InputVariable, OutputVariable};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]*)"|'([^']*)'|(\S+)"#).unwrap());

/// Whitespace-split with double- and single-quote grouping; an unquoted
/// token starting with `#` comments out the rest of the line.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for caps in TOKEN_RE.captures_iter(line) {
        if let Some(quoted) = caps.get(1).or_else(|| caps.get(2)) {
            tokens.push(quoted.as_str().to_string());
        } else if let Some(bare) = caps.get(3) {
            if bare.as_str().starts_with('#') {
                break;
            }
            tokens.push(bare.as_str().to_string());
        }
    }
    tokens
}

pub fn parse_fz(path: &Path) -> Result<KnowledgeBase> {
    let text = fs::read_to_string(path)?;
    parse_str(&text)
}

pub fn parse_str(text: &str) -> Result<KnowledgeBase> {
    let mut parser = Parser::default();
    for (i, raw) in text.lines().enumerate() {
        parser.parse_line(i + 1, raw)?;
    }
    parser.finish()
}

struct PendingRule {
    line: usize,
    content: String,
    rule: Rule,
}

enum GridDirective {
    /// `defuzz <method> grid ymin ymax n`
    Full(f64, f64, usize),
    /// `defuzz <method> n N`: keep each variable's range, replace n
    Points(usize),
}

#[derive(Default)]
struct Parser {
    kb: KnowledgeBase,
    pending_rules: Vec<PendingRule>,
    grid: Option<GridDirective>,
}

impl Parser {
    fn parse_line(&mut self, line: usize, raw: &str) -> Result<()> {
        let tokens = tokenize(raw);
        if tokens.is_empty() {
            return Ok(());
        }
        let head = tokens[0].to_lowercase();
        match head.as_str() {
            "schema" => {
                expect_len(&tokens, 2, line, raw)?;
                self.kb.schema_version = parse_count(&tokens[1], line, raw, "schema version")?;
            }
            "var" => self.parse_var(&tokens, line, raw)?,
            "mf" => self.parse_mf(&tokens, line, raw)?,
            "rule" => {
                let rule = parse_rule(&tokens[1..], line, raw)?;
                self.pending_rules.push(PendingRule { line, content: raw.to_string(), rule });
            }
            "tnorm" => {
                expect_len(&tokens, 2, line, raw)?;
                self.kb.tnorm = TNorm::from_name(&tokens[1]).ok_or_else(|| {
                    FuzzyError::Lookup {
                        message: format!("line {}: unknown tnorm '{}'", line, tokens[1]),
                    }
                })?;
            }
            "snorm" => {
                expect_len(&tokens, 2, line, raw)?;
                self.kb.snorm = SNorm::from_name(&tokens[1]).ok_or_else(|| {
                    FuzzyError::Lookup {
                        message: format!("line {}: unknown snorm '{}'", line, tokens[1]),
                    }
                })?;
            }
            "mode" => {
                expect_len(&tokens, 2, line, raw)?;
                self.kb.mode = InferenceMode::from_name(&tokens[1])
                    .ok_or_else(|| parse_error!(line, raw, "unknown mode '{}'", tokens[1]))?;
            }
            "defuzz" => self.parse_defuzz(&tokens, line, raw)?,
            // reserved directives: accepted, not stored
            "dtype" | "aggregation" | "implication" => {}
            _ => return Err(parse_error!(line, raw, "unknown directive '{}'", tokens[0])),
        }
        Ok(())
    }

    fn parse_var(&mut self, tokens: &[String], line: usize, raw: &str) -> Result<()> {
        expect_len(tokens, 5, line, raw)?;
        let kind = tokens[1].to_lowercase();
        let name = &tokens[2];
        let vmin = parse_number(&tokens[3], line, raw, "vmin")?;
        let vmax = parse_number(&tokens[4], line, raw, "vmax")?;
        match kind.as_str() {
            "input" => {
                let var = InputVariable::new(name.clone(), vmin, vmax)
                    .map_err(|e| reword(e, line, raw))?;
                self.kb.add_input(var).map_err(|e| reword(e, line, raw))?;
            }
            "output" => {
                let var = OutputVariable::new(name.clone(), vmin, vmax)
                    .map_err(|e| reword(e, line, raw))?;
                self.kb.add_output(var).map_err(|e| reword(e, line, raw))?;
            }
            _ => return Err(parse_error!(line, raw, "unknown var kind '{}'", tokens[1])),
        }
        Ok(())
    }

    fn parse_mf(&mut self, tokens: &[String], line: usize, raw: &str) -> Result<()> {
        if tokens.len() < 4 {
            return Err(parse_error!(line, raw, "mf requires: mf <var> <label> <shape> <params>"));
        }
        let shape = tokens[3].to_lowercase();
        // shape parameters are validated before the variable is resolved
        let mf = match shape.as_str() {
            "tri" => {
                expect_len(tokens, 7, line, raw)?;
                let a = parse_number(&tokens[4], line, raw, "a")?;
                let b = parse_number(&tokens[5], line, raw, "b")?;
                let c = parse_number(&tokens[6], line, raw, "c")?;
                MembershipFunction::triangular(a, b, c).map_err(|e| reword(e, line, raw))?
            }
            "trap" => {
                expect_len(tokens, 8, line, raw)?;
                let a = parse_number(&tokens[4], line, raw, "a")?;
                let b = parse_number(&tokens[5], line, raw, "b")?;
                let c = parse_number(&tokens[6], line, raw, "c")?;
                let d = parse_number(&tokens[7], line, raw, "d")?;
                MembershipFunction::trapezoidal(a, b, c, d).map_err(|e| reword(e, line, raw))?
            }
            "gauss" => {
                expect_len(tokens, 6, line, raw)?;
                let center = parse_number(&tokens[4], line, raw, "mu")?;
                let sigma = parse_number(&tokens[5], line, raw, "sigma")?;
                MembershipFunction::gaussian(center, sigma).map_err(|e| reword(e, line, raw))?
            }
            _ => return Err(parse_error!(line, raw, "unknown mf shape '{}'", tokens[3])),
        };

        let name = &tokens[1];
        let label = tokens[2].clone();
        if let Some(var) = self.kb.inputs.get_mut(name) {
            var.add_term(label, mf).map_err(|e| reword(e, line, raw))?;
        } else if let Some(var) = self.kb.outputs.get_mut(name) {
            var.add_term(label, mf).map_err(|e| reword(e, line, raw))?;
        } else {
            return Err(parse_error!(line, raw, "mf refers to unknown variable '{}'", name));
        }
        Ok(())
    }

    fn parse_defuzz(&mut self, tokens: &[String], line: usize, raw: &str) -> Result<()> {
        if tokens.len() < 2 {
            return Err(parse_error!(line, raw, "defuzz requires a method"));
        }
        self.kb.defuzz = DefuzzMethod::from_name(&tokens[1])
            .ok_or_else(|| parse_error!(line, raw, "unknown defuzz method '{}'", tokens[1]))?;
        if tokens.len() == 2 {
            return Ok(());
        }
        match tokens[2].to_lowercase().as_str() {
            "grid" => {
                expect_len(tokens, 6, line, raw)?;
                let ymin = parse_number(&tokens[3], line, raw, "ymin")?;
                let ymax = parse_number(&tokens[4], line, raw, "ymax")?;
                let n = parse_count(&tokens[5], line, raw, "grid points")? as usize;
                if ymin >= ymax {
                    return Err(parse_error!(line, raw, "grid: ymin < ymax required"));
                }
                if n < 3 {
                    return Err(parse_error!(line, raw, "grid: n >= 3 required"));
                }
                self.grid = Some(GridDirective::Full(ymin, ymax, n));
            }
            "n" => {
                expect_len(tokens, 4, line, raw)?;
                let n = parse_count(&tokens[3], line, raw, "grid points")? as usize;
                if n < 3 {
                    return Err(parse_error!(line, raw, "grid: n >= 3 required"));
                }
                self.grid = Some(GridDirective::Points(n));
            }
            _ => {
                return Err(parse_error!(
                    line,
                    raw,
                    "expected 'grid' or 'n' after defuzz method, got '{}'",
                    tokens[2]
                ))
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<KnowledgeBase> {
        match self.grid {
            Some(GridDirective::Full(ymin, ymax, n)) => {
                for var in self.kb.outputs.values_mut() {
                    var.grid = (ymin, ymax, n);
                }
            }
            Some(GridDirective::Points(n)) => {
                for var in self.kb.outputs.values_mut() {
                    var.grid = (var.grid.0, var.grid.1, n);
                }
            }
            None => {}
        }

        if self.kb.outputs.is_empty() {
            return Err(FuzzyError::Schema {
                message: "knowledge base defines no output variable".to_string(),
            });
        }

        for pending in self.pending_rules {
            let PendingRule { line, content, rule } = pending;
            let (oname, olabel) = &rule.consequent;
            if self.kb.inputs.contains_key(oname) {
                return Err(parse_error!(
                    line,
                    content,
                    "consequent must reference an output variable, '{}' is an input",
                    oname
                ));
            }
            let Some(ovar) = self.kb.outputs.get(oname) else {
                return Err(parse_error!(
                    line,
                    content,
                    "consequent references unknown variable '{}'",
                    oname
                ));
            };
            if !ovar.terms.contains_key(olabel) {
                return Err(parse_error!(
                    line,
                    content,
                    "label '{}' undefined on output '{}'",
                    olabel,
                    oname
                ));
            }
            for (var, label) in &rule.antecedent {
                if self.kb.outputs.contains_key(var) {
                    return Err(parse_error!(
                        line,
                        content,
                        "antecedent may not reference output variable '{}'",
                        var
                    ));
                }
                let Some(ivar) = self.kb.inputs.get(var) else {
                    return Err(parse_error!(
                        line,
                        content,
                        "antecedent references unknown variable '{}'",
                        var
                    ));
                };
                if !ivar.terms.contains_key(label) {
                    return Err(parse_error!(
                        line,
                        content,
                        "label '{}' undefined on variable '{}'",
                        label,
                        var
                    ));
                }
            }
            self.kb.add_rule(rule);
        }

        Ok(self.kb)
    }
}

/// `IF <v> is <L> (AND <v> is <L>)* THEN <ov> is <OL> [weight <w>] [inactive]`
fn parse_rule(words: &[String], line: usize, raw: &str) -> Result<Rule> {
    if words.is_empty() || !words[0].eq_ignore_ascii_case("if") {
        return Err(parse_error!(line, raw, "rule must start with IF"));
    }
    let then_idx = words
        .iter()
        .position(|w| w.eq_ignore_ascii_case("then"))
        .ok_or_else(|| parse_error!(line, raw, "rule missing THEN"))?;

    let cond = &words[1..then_idx];
    let cons = &words[then_idx + 1..];

    let mut antecedent = Vec::new();
    let mut i = 0;
    loop {
        if cond.len() < i + 3 {
            return Err(parse_error!(line, raw, "incomplete antecedent, expected '<var> is <label>'"));
        }
        if !cond[i + 1].eq_ignore_ascii_case("is") {
            return Err(parse_error!(line, raw, "expected 'is' in antecedent, got '{}'", cond[i + 1]));
        }
        antecedent.push((cond[i].clone(), cond[i + 2].clone()));
        i += 3;
        if i == cond.len() {
            break;
        }
        if !cond[i].eq_ignore_ascii_case("and") {
            return Err(parse_error!(line, raw, "expected AND between antecedents, got '{}'", cond[i]));
        }
        i += 1;
    }

    if cons.len() < 3 {
        return Err(parse_error!(line, raw, "incomplete consequent, expected '<var> is <label>'"));
    }
    if !cons[1].eq_ignore_ascii_case("is") {
        return Err(parse_error!(line, raw, "expected 'is' in consequent, got '{}'", cons[1]));
    }

    let mut rule = Rule::new(antecedent, (cons[0].clone(), cons[2].clone()));
    let mut i = 3;
    while i < cons.len() {
        match cons[i].to_lowercase().as_str() {
            "weight" => {
                if i + 1 >= cons.len() {
                    return Err(parse_error!(line, raw, "weight requires a value"));
                }
                let weight = parse_number(&cons[i + 1], line, raw, "weight")?;
                if weight < 0.0 {
                    return Err(parse_error!(line, raw, "weight must be >= 0"));
                }
                rule.weight = weight;
                i += 2;
            }
            "inactive" => {
                rule.active = false;
                i += 1;
            }
            other => {
                return Err(parse_error!(line, raw, "unexpected token '{}' after consequent", other))
            }
        }
    }
    Ok(rule)
}

fn expect_len(tokens: &[String], expected: usize, line: usize, raw: &str) -> Result<()> {
    if tokens.len() != expected {
        return Err(parse_error!(
            line,
            raw,
            "'{}' expects {} tokens, got {}",
            tokens[0].to_lowercase(),
            expected,
            tokens.len()
        ));
    }
    Ok(())
}

fn parse_number(token: &str, line: usize, raw: &str, what: &str) -> Result<f64> {
    token
        .parse()
        .map_err(|_| parse_error!(line, raw, "invalid number for {}: '{}'", what, token))
}

fn parse_count(token: &str, line: usize, raw: &str, what: &str) -> Result<u32> {
    token
        .parse()
        .map_err(|_| parse_error!(line, raw, "invalid integer for {}: '{}'", what, token))
}

/// Attach line context to a schema error raised while applying a directive.
fn reword(err: FuzzyError, line: usize, raw: &str) -> FuzzyError {
    match err {
        FuzzyError::Schema { message } => parse_error!(line, raw, "{}", message),
        other => other,
    }
}
