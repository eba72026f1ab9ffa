//! Command line surface: one binary with subcommands covering the whole
//! pipeline (prepare -> learn -> validate/show -> predict/explain -> apply),
//! plus a config-driven `run` orchestrator.

mod apply;
mod prepare;
mod run;

pub use apply::cmd_apply;
pub use prepare::cmd_prepare;
pub use run::cmd_run;

use crate::classifier::Classifier;
use crate::data_error;
use crate::engine::MamdaniEngine;
use crate::error::Result;
use crate::fz::{parse_fz, save_fz};
use crate::knowledge::{InferenceMode, KnowledgeBase};
use crate::learner::{learn_from_csv, LearnOptions, MfConfig};
use crate::utils::format_sig;
use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "mamdani",
    version,
    about = "Mamdani fuzzy rule system: prepare -> learn -> validate/show -> predict/explain -> apply"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a model and summarize counts and engine settings
    Validate(ValidateArgs),
    /// Print variables, terms and rules, optionally annotated at a point
    Show(ShowArgs),
    /// Crisp prediction for a single sample
    Predict(PredictArgs),
    /// Classification explanation for a single sample
    Explain(ExplainArgs),
    /// Induce a model from a (prepared) CSV
    Learn(LearnArgs),
    /// Apply a model to a CSV (batch classify)
    Apply(ApplyArgs),
    /// Produce a numeric CSV and a JSON column mapping
    Prepare(PrepareArgs),
    /// Execute a pipeline from a JSON or YAML config document
    Run(RunArgs),
}

#[derive(Args, Clone, Debug, Deserialize)]
pub struct ValidateArgs {
    #[arg(long)]
    pub model: PathBuf,
}

#[derive(Args, Clone, Debug, Deserialize)]
pub struct ShowArgs {
    #[arg(long)]
    pub model: PathBuf,

    /// Annotate terms and rules at this sample point
    #[arg(long, value_name = "VAR=VALUE", num_args = 1..)]
    #[serde(default)]
    pub at: Vec<String>,

    /// Also list inactive rules
    #[arg(long)]
    #[serde(default)]
    pub include_inactive: bool,

    /// Only list rules that fired for --at
    #[arg(long, requires = "at")]
    #[serde(default)]
    pub fired_only: bool,

    /// Activation threshold for --fired-only
    #[arg(long, default_value_t = 0.0)]
    #[serde(default)]
    pub min_alpha: f64,
}

#[derive(Args, Clone, Debug, Deserialize)]
pub struct PredictArgs {
    #[arg(long)]
    pub model: PathBuf,

    #[arg(value_name = "VAR=VALUE", required = true, num_args = 1..)]
    pub kv: Vec<String>,
}

#[derive(Args, Clone, Debug, Deserialize)]
pub struct ExplainArgs {
    #[arg(long)]
    pub model: PathBuf,

    #[arg(value_name = "VAR=VALUE", required = true, num_args = 1..)]
    pub kv: Vec<String>,

    /// Emit the explanation structure as JSON
    #[arg(long)]
    #[serde(default)]
    pub json: bool,

    /// Drop rules with activation below this value
    #[arg(long, default_value_t = 0.0)]
    #[serde(default)]
    pub threshold: f64,

    /// Override the model's inference mode
    #[arg(long, value_parser = ["FIT", "FATI"])]
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Args, Clone, Debug, Deserialize)]
pub struct LearnArgs {
    #[arg(long)]
    pub csv: PathBuf,

    #[arg(long)]
    pub out: PathBuf,

    /// Number of terms per variable
    #[arg(long, default_value_t = 3)]
    #[serde(default = "default_terms")]
    pub terms: usize,

    #[arg(long, default_value = "grid", value_parser = ["grid"])]
    #[serde(default = "default_partition")]
    pub partition: String,

    #[arg(long, default_value = "wm", value_parser = ["wm"])]
    #[serde(default = "default_induction")]
    pub induction: String,

    #[arg(long, value_parser = ["FIT", "FATI"])]
    #[serde(default)]
    pub mode: Option<String>,

    #[arg(long)]
    #[serde(default)]
    pub tnorm: Option<String>,

    #[arg(long)]
    #[serde(default)]
    pub snorm: Option<String>,

    /// Discard induced rules weaker than this
    #[arg(long, default_value_t = 0.0)]
    #[serde(default)]
    pub min_weight: f64,

    /// JSON or YAML membership-function configuration
    #[arg(long)]
    #[serde(default)]
    pub mf_config: Option<PathBuf>,
}

fn default_terms() -> usize {
    3
}

fn default_partition() -> String {
    "grid".to_string()
}

fn default_induction() -> String {
    "wm".to_string()
}

#[derive(Args, Clone, Debug, Deserialize)]
pub struct ApplyArgs {
    #[arg(long)]
    pub model: PathBuf,

    #[arg(long)]
    pub csv: PathBuf,

    /// Output CSV (stdout when absent)
    #[arg(long)]
    #[serde(default)]
    pub out: Option<PathBuf>,

    /// Explicit var=column mapping, e.g. sepal_length=SepalLengthCm
    #[arg(long, value_name = "VAR=COL,...")]
    #[serde(default)]
    pub col_map: Option<String>,

    /// Input columns by index or name
    #[arg(long, value_name = "COLS")]
    #[serde(default)]
    pub in_cols: Option<String>,

    /// Columns to skip
    #[arg(long, value_name = "COLS")]
    #[serde(default)]
    pub ignore_cols: Option<String>,

    /// Truncate the model inputs to N when using --in-cols
    #[arg(long)]
    #[serde(default)]
    pub inputs: Option<usize>,

    /// Predicted-class encoding
    #[arg(long, default_value = "label", value_parser = ["label", "decimal", "binary"])]
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Override the model's inference mode
    #[arg(long, value_parser = ["FIT", "FATI"])]
    #[serde(default)]
    pub mode: Option<String>,
}

fn default_encoding() -> String {
    "label".to_string()
}

#[derive(Args, Clone, Debug, Deserialize)]
pub struct PrepareArgs {
    #[arg(long)]
    pub csv: PathBuf,

    /// Input columns by index or name
    #[arg(long, value_name = "COLS")]
    pub in_cols: String,

    /// Output column by index or name
    #[arg(long, value_name = "COL")]
    pub out_col: String,

    /// Columns expected to be numeric
    #[arg(long, value_name = "COLS", default_value = "")]
    #[serde(default)]
    pub num_cols: String,

    /// Columns to label-encode
    #[arg(long, value_name = "COLS", default_value = "")]
    #[serde(default)]
    pub str_cols: String,

    #[arg(long, value_name = "COLS", default_value = "")]
    #[serde(default)]
    pub ignore_cols: String,

    /// Numeric CSV to write
    #[arg(long)]
    pub out: PathBuf,

    /// JSON metadata file to write
    #[arg(long)]
    pub mapping: PathBuf,
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    #[arg(long)]
    pub config: PathBuf,
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Validate(args) => cmd_validate(&args),
        Command::Show(args) => cmd_show(&args),
        Command::Predict(args) => cmd_predict(&args),
        Command::Explain(args) => cmd_explain(&args),
        Command::Learn(args) => cmd_learn(&args, None),
        Command::Apply(args) => cmd_apply(&args),
        Command::Prepare(args) => cmd_prepare(&args),
        Command::Run(args) => cmd_run(&args),
    }
}

/// `k=v` pairs into an input vector.
pub fn parse_keyvals(kvs: &[String]) -> Result<HashMap<String, f64>> {
    let mut data = HashMap::new();
    for kv in kvs {
        let Some((key, value)) = kv.split_once('=') else {
            return Err(data_error!("invalid sample value '{}' (expected var=value)", kv));
        };
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| data_error!("non-numeric value for '{}': '{}'", key, value))?;
        data.insert(key.trim().to_string(), value);
    }
    Ok(data)
}

pub fn cmd_validate(args: &ValidateArgs) -> anyhow::Result<()> {
    let kb = parse_fz(&args.model)?;
    println!(
        "OK: inputs={}, outputs={}, rules={}",
        kb.inputs.len(),
        kb.outputs.len(),
        kb.rules.len()
    );
    println!(
        "tnorm={}, snorm={}, mode={}, defuzz={}",
        kb.tnorm.name(),
        kb.snorm.name(),
        kb.mode,
        kb.defuzz.name()
    );
    Ok(())
}

pub fn cmd_predict(args: &PredictArgs) -> anyhow::Result<()> {
    let kb = parse_fz(&args.model)?;
    let engine = MamdaniEngine::new(&kb);
    let data = parse_keyvals(&args.kv)?;
    for (name, value) in engine.predict(&data) {
        println!("{}: {}", name, format_sig(value, 6));
    }
    Ok(())
}

pub fn cmd_explain(args: &ExplainArgs) -> anyhow::Result<()> {
    let kb = parse_fz(&args.model)?;
    let clf = Classifier::new(&kb);
    let data = parse_keyvals(&args.kv)?;
    let mode = parse_mode(args.mode.as_deref())?;
    let explained = clf.explain(&data, mode, args.threshold);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&explained)?);
        return Ok(());
    }

    for (oname, explanation) in &explained {
        println!("Output: {}", oname);
        if let Some(strengths) = &explanation.label_strengths {
            let rendered: Vec<String> =
                strengths.iter().map(|(label, s)| format!("{}={:.4}", label, s)).collect();
            println!("  FATI label strengths: {}", rendered.join(", "));
        }
        for activation in &explanation.activations {
            let ants: Vec<String> = activation
                .antecedent
                .iter()
                .map(|a| format!("{} is {} (mu={:.3})", a.var, a.label, a.mu))
                .collect();
            println!(
                "  R{}: IF {} THEN {} is {}  alpha={:.4} weight={}",
                activation.rule_index,
                ants.join(" AND "),
                activation.consequent.var,
                activation.consequent.label,
                activation.alpha,
                activation.weight
            );
        }
    }
    Ok(())
}

pub fn cmd_learn(args: &LearnArgs, mf_inline: Option<MfConfig>) -> anyhow::Result<()> {
    let mf = match mf_inline {
        Some(cfg) => Some(cfg),
        None => match &args.mf_config {
            Some(path) => Some(load_mf_config(path)?),
            None => None,
        },
    };
    if args.induction != "wm" {
        bail!("unsupported induction method '{}'", args.induction);
    }
    let opts = LearnOptions {
        terms: args.terms,
        partition: args.partition.clone(),
        tnorm: args.tnorm.clone().unwrap_or_else(|| "min".to_string()),
        snorm: args.snorm.clone().unwrap_or_else(|| "max".to_string()),
        mode: args.mode.clone().unwrap_or_else(|| "FIT".to_string()),
        min_weight: args.min_weight,
        mf,
        ..Default::default()
    };
    let kb = learn_from_csv(&args.csv, &opts)?;
    save_fz(&kb, &args.out)?;
    println!("Saved model to {}", args.out.display());
    Ok(())
}

pub fn cmd_show(args: &ShowArgs) -> anyhow::Result<()> {
    let kb = parse_fz(&args.model)?;
    if args.fired_only && args.at.is_empty() {
        bail!("--fired-only requires --at");
    }
    let at = if args.at.is_empty() { None } else { Some(parse_keyvals(&args.at)?) };

    // rule_index -> alpha for the sample point
    let alphas: HashMap<usize, f64> = match &at {
        Some(data) => {
            let clf = Classifier::new(&kb);
            clf.explain(data, None, 0.0)
                .values()
                .flat_map(|e| e.activations.iter().map(|a| (a.rule_index, a.alpha)))
                .collect()
        }
        None => HashMap::new(),
    };

    println!("Inputs:");
    for var in kb.inputs.values() {
        println!("  {} [{}, {}]", var.name, var.vmin, var.vmax);
        for (label, mf) in &var.terms {
            let mut line = format!("    {}: {}({})", label, mf.shape_name(), render_params(mf));
            if let Some(data) = &at {
                if let Some(&x) = data.get(&var.name) {
                    line.push_str(&format!("  mu({})={:.3}", x, mf.mu(x)));
                }
            }
            println!("{}", line);
        }
    }

    println!("Outputs:");
    for var in kb.outputs.values() {
        println!(
            "  {} [{}, {}]  grid=({}, {}, {})",
            var.name, var.vmin, var.vmax, var.grid.0, var.grid.1, var.grid.2
        );
        for (label, mf) in &var.terms {
            println!("    {}: {}({})", label, mf.shape_name(), render_params(mf));
        }
    }

    println!("Rules:");
    for (index, rule) in kb.rules.iter().enumerate() {
        if !rule.active && !args.include_inactive {
            continue;
        }
        let alpha = alphas.get(&index);
        if args.fired_only && alpha.map_or(true, |&a| a < args.min_alpha) {
            continue;
        }
        let mut line = format!("  R{}: {}  weight={}", index, rule, rule.weight);
        if !rule.active {
            line.push_str("  [inactive]");
        }
        if let Some(&a) = alpha {
            line.push_str(&format!("  alpha={:.4}", a));
        }
        println!("{}", line);
    }

    println!(
        "tnorm={}, snorm={}, mode={}, defuzz={}",
        kb.tnorm.name(),
        kb.snorm.name(),
        kb.mode,
        kb.defuzz.name()
    );
    Ok(())
}

fn render_params(mf: &crate::membership::MembershipFunction) -> String {
    mf.params().iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
}

pub(crate) fn parse_mode(name: Option<&str>) -> Result<Option<InferenceMode>> {
    match name {
        None => Ok(None),
        Some(name) => InferenceMode::from_name(name)
            .map(Some)
            .ok_or_else(|| data_error!("unknown mode '{}' (expected FIT or FATI)", name)),
    }
}

pub(crate) fn first_output(kb: &KnowledgeBase) -> Result<&crate::variable::OutputVariable> {
    kb.outputs
        .values()
        .next()
        .ok_or_else(|| data_error!("model has no output variable"))
}

/// MF configuration from a JSON or YAML file; the document may be the
/// config itself or wrap it under an `mf` key.
fn load_mf_config(path: &Path) -> Result<MfConfig> {
    let text = fs::read_to_string(path)?;
    let is_yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yml" | "yaml"));
    if is_yaml {
        let value: serde_yaml::Value = serde_yaml::from_str(&text)?;
        let value = value.get("mf").cloned().unwrap_or(value);
        Ok(serde_yaml::from_value(value)?)
    } else {
        let value: serde_json::Value = serde_json::from_str(&text)?;
        let value = value.get("mf").cloned().unwrap_or(value);
        Ok(serde_json::from_value(value)?)
    }
}
