//! Wang-Mendel rule induction from a numeric table.
//!
//! Every column gets a grid partition of membership functions (or
//! user-supplied ones); each row votes for the max-membership label per
//! column, the vote strength is the T-norm of the input memberships times
//! the output membership, and duplicate rules keep the strongest vote.

use crate::data_error;
use crate::defuzz::DefuzzMethod;
use crate::error::Result;
use crate::knowledge::{InferenceMode, KnowledgeBase};
use crate::membership::MembershipFunction;
use crate::norms::{SNorm, TNorm};
use crate::rule::Rule;
use crate::schema_error;
use crate::table::read_table;
use crate::variable::{InputVariable, OutputVariable};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const FWHM_TO_SIGMA: f64 = 2.354820045030949; // 2 * sqrt(2 ln 2)

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LearnOptions {
    pub terms: usize,
    pub partition: String,
    pub tnorm: String,
    pub snorm: String,
    pub mode: String,
    pub min_weight: f64,
    pub range_margin: f64,
    pub mf: Option<MfConfig>,
}

impl Default for LearnOptions {
    fn default() -> Self {
        Self {
            terms: 3,
            partition: "grid".to_string(),
            tnorm: "min".to_string(),
            snorm: "max".to_string(),
            mode: "FIT".to_string(),
            min_weight: 0.0,
            range_margin: 0.0,
            mf: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MfMode {
    #[default]
    AutoFromData,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MfShape {
    #[default]
    Tri,
    Trap,
    Gauss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SigmaMode {
    #[default]
    Factor,
    Fwhm,
    Fixed,
}

/// Per-variable partition parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MfBlock {
    pub shape: MfShape,
    pub terms: Option<usize>,
    pub labels: Option<Vec<String>>,
    pub plateau_ratio: f64,
    pub sigma_mode: SigmaMode,
    pub sigma_value: f64,
}

impl Default for MfBlock {
    fn default() -> Self {
        Self {
            shape: MfShape::Tri,
            terms: None,
            labels: None,
            plateau_ratio: 0.5,
            sigma_mode: SigmaMode::Factor,
            sigma_value: 0.5,
        }
    }
}

/// User-supplied membership function for the `explicit` map.
#[derive(Debug, Clone, Deserialize)]
pub struct MfSpec {
    pub label: String,
    pub shape: String,
    pub params: Vec<f64>,
}

impl MfSpec {
    fn build(&self) -> Result<MembershipFunction> {
        match (self.shape.to_lowercase().as_str(), self.params.as_slice()) {
            ("tri", &[a, b, c]) => MembershipFunction::triangular(a, b, c),
            ("trap", &[a, b, c, d]) => MembershipFunction::trapezoidal(a, b, c, d),
            ("gauss", &[center, sigma]) => MembershipFunction::gaussian(center, sigma),
            _ => Err(schema_error!(
                "explicit mf '{}': unknown shape '{}' or wrong parameter count",
                self.label,
                self.shape
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MfConfig {
    pub mode: MfMode,
    pub default: MfBlock,
    pub per_variable: IndexMap<String, MfBlock>,
    pub explicit: IndexMap<String, Vec<MfSpec>>,
}

pub fn learn_from_csv(path: &Path, opts: &LearnOptions) -> Result<KnowledgeBase> {
    let table = read_table(path)?;

    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(table.rows.len());
    let mut skipped = 0usize;
    for (r, row) in table.rows.iter().enumerate() {
        if row.len() != table.columns.len() {
            return Err(data_error!(
                "row {}: expected {} cells, found {}",
                r + 1,
                table.columns.len(),
                row.len()
            ));
        }
        let mut parsed = Vec::with_capacity(row.len());
        for (c, cell) in row.iter().enumerate() {
            let value: f64 = cell.trim().parse().map_err(|_| {
                data_error!("row {}: non-numeric cell '{}' in column '{}'", r + 1, cell, table.columns[c])
            })?;
            parsed.push(value);
        }
        if parsed.iter().any(|v| !v.is_finite()) {
            skipped += 1;
            continue;
        }
        rows.push(parsed);
    }
    if skipped > 0 {
        log::warn!("skipped {} rows containing non-finite values", skipped);
    }

    learn_from_table(&table.columns, &rows, opts)
}

pub fn learn_from_table(
    columns: &[String],
    rows: &[Vec<f64>],
    opts: &LearnOptions,
) -> Result<KnowledgeBase> {
    if columns.len() < 2 {
        return Err(data_error!("need at least one input column and one output column"));
    }
    if rows.is_empty() {
        return Err(data_error!("no data rows to learn from"));
    }
    if opts.partition != "grid" {
        return Err(data_error!("unsupported partition '{}'", opts.partition));
    }

    let ncols = columns.len();
    let out_col = ncols - 1;

    // column ranges, optionally inflated by the symmetric margin
    let mut ranges = Vec::with_capacity(ncols);
    for c in 0..ncols {
        let mut vmin = f64::INFINITY;
        let mut vmax = f64::NEG_INFINITY;
        for row in rows {
            vmin = vmin.min(row[c]);
            vmax = vmax.max(row[c]);
        }
        if vmin == vmax {
            vmin -= 0.5;
            vmax += 0.5;
        }
        let margin = opts.range_margin * (vmax - vmin);
        ranges.push((vmin - margin, vmax + margin));
    }

    // partitions: explicit user MFs win, otherwise a grid partition from the
    // default block with optional per-variable overrides
    let mf_cfg = opts.mf.clone().unwrap_or_default();
    let mut partitions: Vec<Vec<(String, MembershipFunction)>> = Vec::with_capacity(ncols);
    for c in 0..ncols {
        let name = &columns[c];
        if let Some(specs) = mf_cfg.explicit.get(name) {
            if specs.is_empty() {
                return Err(schema_error!("variable '{}': explicit mf list is empty", name));
            }
            let mut terms = Vec::with_capacity(specs.len());
            for spec in specs {
                terms.push((spec.label.clone(), spec.build()?));
            }
            partitions.push(terms);
        } else if mf_cfg.mode == MfMode::Manual {
            return Err(schema_error!("mf mode is 'manual' but variable '{}' has no explicit mfs", name));
        } else {
            let block = mf_cfg.per_variable.get(name).unwrap_or(&mf_cfg.default);
            let n = block.terms.unwrap_or(opts.terms);
            let (vmin, vmax) = ranges[c];
            partitions.push(grid_partition(name, block, n, vmin, vmax)?);
        }
    }

    // one vote per row, strongest duplicate wins; keys keep first-occurrence order
    let tnorm = TNorm::resolve(&opts.tnorm);
    let mut votes: IndexMap<(Vec<usize>, usize), f64> = IndexMap::new();
    for row in rows {
        let mut key = Vec::with_capacity(ncols - 1);
        let mut mus = Vec::with_capacity(ncols - 1);
        for c in 0..out_col {
            let (index, mu) = argmax_term(&partitions[c], row[c]);
            key.push(index);
            mus.push(mu);
        }
        let (out_index, out_mu) = argmax_term(&partitions[out_col], row[out_col]);
        let strength = tnorm.apply(&mus) * out_mu;

        let entry = votes.entry((key, out_index)).or_insert(strength);
        if strength > *entry {
            *entry = strength;
        }
    }

    // assemble the knowledge base
    let mut kb = KnowledgeBase::new();
    kb.tnorm = tnorm;
    kb.snorm = SNorm::resolve(&opts.snorm);
    kb.mode = InferenceMode::from_name(&opts.mode).unwrap_or(InferenceMode::Fit);
    kb.defuzz = DefuzzMethod::Centroid;

    for c in 0..out_col {
        let (vmin, vmax) = ranges[c];
        let mut var = InputVariable::new(columns[c].clone(), vmin, vmax)?;
        for (label, mf) in &partitions[c] {
            var.add_term(label.clone(), mf.clone())?;
        }
        kb.add_input(var)?;
    }
    let (vmin, vmax) = ranges[out_col];
    let mut output = OutputVariable::new(columns[out_col].clone(), vmin, vmax)?;
    for (label, mf) in &partitions[out_col] {
        output.add_term(label.clone(), mf.clone())?;
    }
    output.grid = (vmin, vmax, 201);
    kb.add_output(output)?;

    for ((key, out_index), strength) in votes {
        if strength < opts.min_weight {
            continue;
        }
        let antecedent = key
            .iter()
            .enumerate()
            .map(|(c, &index)| (columns[c].clone(), partitions[c][index].0.clone()))
            .collect();
        let consequent = (columns[out_col].clone(), partitions[out_col][out_index].0.clone());
        kb.add_rule(Rule::new(antecedent, consequent).with_weight(strength));
    }

    Ok(kb)
}

/// Max-membership term index for a crisp value; ties go to the first term.
fn argmax_term(terms: &[(String, MembershipFunction)], x: f64) -> (usize, f64) {
    let mut best = (0usize, f64::NEG_INFINITY);
    for (i, (_, mf)) in terms.iter().enumerate() {
        let mu = mf.mu(x);
        if mu > best.1 {
            best = (i, mu);
        }
    }
    (best.0, best.1.max(0.0))
}

/// Evenly spaced grid partition of [vmin, vmax] into n labeled terms.
fn grid_partition(
    name: &str,
    block: &MfBlock,
    n: usize,
    vmin: f64,
    vmax: f64,
) -> Result<Vec<(String, MembershipFunction)>> {
    if n == 0 {
        return Err(schema_error!("variable '{}': at least one term required", name));
    }
    let labels = partition_labels(name, block, n)?;

    if n == 1 {
        let mid = (vmin + vmax) / 2.0;
        let mf = match block.shape {
            MfShape::Tri => MembershipFunction::triangular(vmin, mid, vmax)?,
            MfShape::Trap => {
                let hw = block.plateau_ratio * (vmax - vmin) / 2.0;
                MembershipFunction::trapezoidal(vmin, (mid - hw).max(vmin), (mid + hw).min(vmax), vmax)?
            }
            MfShape::Gauss => MembershipFunction::gaussian(mid, sigma_for(block, vmax - vmin)?)?,
        };
        return Ok(vec![(labels[0].clone(), mf)]);
    }

    let step = (vmax - vmin) / (n - 1) as f64;
    let centers: Vec<f64> = (0..n).map(|i| vmin + i as f64 * step).collect();
    let mut terms = Vec::with_capacity(n);
    for (i, &center) in centers.iter().enumerate() {
        let left = if i == 0 { vmin } else { centers[i - 1] };
        let right = if i == n - 1 { vmax } else { centers[i + 1] };
        let mf = match block.shape {
            MfShape::Tri => MembershipFunction::triangular(left, center, right)?,
            MfShape::Trap => {
                let hw = block.plateau_ratio * step / 2.0;
                let b = (center - hw).max(left);
                let c = (center + hw).min(right);
                MembershipFunction::trapezoidal(left, b, c, right)?
            }
            MfShape::Gauss => MembershipFunction::gaussian(center, sigma_for(block, step)?)?,
        };
        terms.push((labels[i].clone(), mf));
    }
    Ok(terms)
}

fn partition_labels(name: &str, block: &MfBlock, n: usize) -> Result<Vec<String>> {
    if let Some(labels) = &block.labels {
        if labels.len() != n {
            return Err(schema_error!(
                "variable '{}': {} labels configured for {} terms",
                name,
                labels.len(),
                n
            ));
        }
        return Ok(labels.clone());
    }
    Ok(if n == 3 {
        vec!["small".to_string(), "medium".to_string(), "large".to_string()]
    } else {
        (1..=n).map(|i| format!("t{}", i)).collect()
    })
}

fn sigma_for(block: &MfBlock, step: f64) -> Result<f64> {
    let sigma = match block.sigma_mode {
        SigmaMode::Factor => block.sigma_value * step,
        SigmaMode::Fwhm => block.sigma_value * step / FWHM_TO_SIGMA,
        SigmaMode::Fixed => block.sigma_value,
    };
    if sigma <= 0.0 {
        return Err(schema_error!("gauss partition: sigma > 0 required (got {})", sigma));
    }
    Ok(sigma)
}
