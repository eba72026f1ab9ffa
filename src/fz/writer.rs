//! Serializer for the `.fz` grammar: the inverse of the parser on every
//! knowledge base the learner can produce.

use crate::error::Result;
use crate::knowledge::KnowledgeBase;
use crate::membership::MembershipFunction;
use crate::variable::GRID_SENTINEL;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub fn save_fz(kb: &KnowledgeBase, path: &Path) -> Result<()> {
    fs::write(path, serialize_kb(kb))?;
    Ok(())
}

pub fn serialize_kb(kb: &KnowledgeBase) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "schema {}", kb.schema_version);

    for var in kb.inputs.values() {
        let _ = writeln!(out, "var input {} {} {}", quote(&var.name), var.vmin, var.vmax);
        for (label, mf) in &var.terms {
            write_mf(&mut out, &var.name, label, mf);
        }
    }
    for var in kb.outputs.values() {
        let _ = writeln!(out, "var output {} {} {}", quote(&var.name), var.vmin, var.vmax);
        for (label, mf) in &var.terms {
            write_mf(&mut out, &var.name, label, mf);
        }
    }

    for rule in &kb.rules {
        let _ = write!(out, "rule IF ");
        for (i, (var, label)) in rule.antecedent.iter().enumerate() {
            if i > 0 {
                let _ = write!(out, " AND ");
            }
            let _ = write!(out, "{} is {}", quote(var), quote(label));
        }
        let _ = write!(
            out,
            " THEN {} is {} weight {}",
            quote(&rule.consequent.0),
            quote(&rule.consequent.1),
            rule.weight
        );
        if !rule.active {
            let _ = write!(out, " inactive");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "tnorm {}", kb.tnorm.name());
    let _ = writeln!(out, "snorm {}", kb.snorm.name());
    let _ = writeln!(out, "mode {}", kb.mode);
    match kb.outputs.values().next().map(|v| v.grid) {
        Some(grid) if grid != GRID_SENTINEL => {
            let _ = writeln!(out, "defuzz {} grid {} {} {}", kb.defuzz.name(), grid.0, grid.1, grid.2);
        }
        _ => {
            let _ = writeln!(out, "defuzz {}", kb.defuzz.name());
        }
    }
    out
}

fn write_mf(out: &mut String, var: &str, label: &str, mf: &MembershipFunction) {
    let _ = write!(out, "mf {} {} {}", quote(var), quote(label), mf.shape_name());
    for p in mf.params() {
        let _ = write!(out, " {}", p);
    }
    let _ = writeln!(out);
}

/// Tokens containing whitespace, quotes, or `#` must be quoted to survive
/// the tokenizer.
fn quote(token: &str) -> String {
    if token.is_empty() || token.chars().any(|c| c.is_whitespace() || c == '#' || c == '"' || c == '\'')
    {
        format!("\"{}\"", token)
    } else {
        token.to_string()
    }
}
