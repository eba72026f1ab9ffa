//! Config-driven pipeline: a JSON or YAML document whose sections name the
//! subcommands to execute, in the fixed order
//! prepare -> learn -> show -> apply -> validate -> predict -> explain.

use super::{
    cmd_apply, cmd_explain, cmd_learn, cmd_predict, cmd_prepare, cmd_show, cmd_validate,
    ApplyArgs, ExplainArgs, LearnArgs, PredictArgs, PrepareArgs, RunArgs, ShowArgs, ValidateArgs,
};
use crate::learner::MfConfig;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub project: Option<ProjectSection>,
    pub mf: Option<MfConfig>,
    pub prepare: Option<PrepareArgs>,
    pub learn: Option<LearnArgs>,
    pub show: Option<ShowArgs>,
    pub apply: Option<ApplyArgs>,
    pub validate: Option<ValidateArgs>,
    pub predict: Option<PredictArgs>,
    pub explain: Option<ExplainArgs>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    pub engine: Option<EngineSection>,
}

/// Engine defaults injected into `learn` fields left unset there.
/// `defuzz` is accepted for config compatibility; the learner always
/// initializes models to centroid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub tnorm: Option<String>,
    pub snorm: Option<String>,
    pub mode: Option<String>,
    pub defuzz: Option<String>,
}

pub fn cmd_run(args: &RunArgs) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.config)?;
    let is_yaml = matches!(
        args.config.extension().and_then(|e| e.to_str()),
        Some("yml" | "yaml")
    );
    let cfg: RunConfig =
        if is_yaml { serde_yaml::from_str(&text)? } else { serde_json::from_str(&text)? };

    if let Some(prepare) = &cfg.prepare {
        log::info!("run: prepare");
        cmd_prepare(prepare)?;
    }
    if let Some(learn) = &cfg.learn {
        log::info!("run: learn");
        let mut learn = learn.clone();
        if let Some(engine) = cfg.project.as_ref().and_then(|p| p.engine.as_ref()) {
            if learn.tnorm.is_none() {
                learn.tnorm = engine.tnorm.clone();
            }
            if learn.snorm.is_none() {
                learn.snorm = engine.snorm.clone();
            }
            if learn.mode.is_none() {
                learn.mode = engine.mode.clone();
            }
        }
        cmd_learn(&learn, cfg.mf.clone())?;
    }
    if let Some(show) = &cfg.show {
        log::info!("run: show");
        cmd_show(show)?;
    }
    if let Some(apply) = &cfg.apply {
        log::info!("run: apply");
        cmd_apply(apply)?;
    }
    if let Some(validate) = &cfg.validate {
        log::info!("run: validate");
        cmd_validate(validate)?;
    }
    if let Some(predict) = &cfg.predict {
        log::info!("run: predict");
        cmd_predict(predict)?;
    }
    if let Some(explain) = &cfg.explain {
        log::info!("run: explain");
        cmd_explain(explain)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_config_deserializes() {
        let cfg: RunConfig = serde_json::from_str(
            r#"{
                "project": {"engine": {"tnorm": "prod", "snorm": "prob"}},
                "mf": {"default": {"shape": "gauss", "sigma_mode": "fwhm", "sigma_value": 1.0}},
                "learn": {"csv": "iris_num.csv", "out": "iris.fz", "terms": 5},
                "predict": {"model": "iris.fz", "kv": ["sepal_length=5.9"]}
            }"#,
        )
        .unwrap();
        let learn = cfg.learn.unwrap();
        assert_eq!(learn.terms, 5);
        assert_eq!(learn.partition, "grid");
        assert!(learn.tnorm.is_none());
        assert_eq!(cfg.project.unwrap().engine.unwrap().tnorm.as_deref(), Some("prod"));
        assert!(cfg.mf.is_some());
        assert_eq!(cfg.predict.unwrap().kv, vec!["sepal_length=5.9"]);
        assert!(cfg.prepare.is_none());
    }

    #[test]
    fn yaml_config_deserializes() {
        let cfg: RunConfig = serde_yaml::from_str(
            "learn:\n  csv: data.csv\n  out: model.fz\n  min_weight: 0.25\nvalidate:\n  model: model.fz\n",
        )
        .unwrap();
        assert_eq!(cfg.learn.unwrap().min_weight, 0.25);
        assert!(cfg.validate.is_some());
    }
}
