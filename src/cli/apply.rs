//! Batch classification of a CSV with flexible column mapping.

use super::{first_output, parse_mode, ApplyArgs};
use crate::classifier::Classifier;
use crate::data_error;
use crate::error::Result;
use crate::fz::parse_fz;
use crate::knowledge::KnowledgeBase;
use crate::table::{parse_col_map, parse_cols_list, read_table, resolve_cols, Table};
use indexmap::IndexMap;
use std::fs::File;
use std::io::{self, Write};

pub fn cmd_apply(args: &ApplyArgs) -> anyhow::Result<()> {
    let kb = parse_fz(&args.model)?;
    let clf = Classifier::new(&kb);
    let table = read_table(&args.csv)?;

    let mapping = resolve_input_mapping(
        &kb,
        &table,
        args.col_map.as_deref(),
        args.in_cols.as_deref(),
        args.ignore_cols.as_deref(),
        args.inputs,
    )?;
    for (var, &idx) in &mapping {
        log::info!("apply: {} <- [{}] {}", var, idx, table.columns[idx]);
    }

    let output = first_output(&kb)?;
    let class_labels: Vec<String> = output.terms.keys().cloned().collect();
    let oname = output.name.clone();
    let mode = parse_mode(args.mode.as_deref())?;

    let sink: Box<dyn Write> = match &args.out {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };
    let mut writer = csv::Writer::from_writer(sink);

    let mut header: Vec<String> = match args.encoding.as_str() {
        "decimal" => vec!["_pred_decimal".to_string()],
        "binary" => class_labels.iter().map(|l| format!("_pred_{}", l)).collect(),
        _ => vec!["_pred_label".to_string()],
    };
    header.extend(class_labels.iter().map(|l| format!("_score_{}", l)));
    writer.write_record(&header)?;

    for (r, row) in table.rows.iter().enumerate() {
        if row.is_empty() {
            continue;
        }
        let mut data = std::collections::HashMap::new();
        for (var, &idx) in &mapping {
            let cell = row.get(idx).map(String::as_str).unwrap_or("");
            let value = if cell.trim().is_empty() {
                0.0
            } else {
                cell.trim().parse().map_err(|_| {
                    data_error!("row {}: non-numeric cell '{}' for input '{}'", r + 1, cell, var)
                })?
            };
            data.insert(var.clone(), value);
        }

        let classified = clf.classify(&data, mode);
        let result = &classified[&oname];

        let mut record: Vec<String> = match args.encoding.as_str() {
            "decimal" => {
                vec![result
                    .chosen
                    .as_ref()
                    .and_then(|c| class_labels.iter().position(|l| l == c))
                    .map(|i| i.to_string())
                    .unwrap_or_default()]
            }
            "binary" => class_labels
                .iter()
                .map(|l| if result.chosen.as_deref() == Some(l.as_str()) { "1" } else { "0" })
                .map(str::to_string)
                .collect(),
            _ => vec![result.chosen.clone().unwrap_or_default()],
        };
        record.extend(
            class_labels.iter().map(|l| result.strengths.get(l).copied().unwrap_or(0.0).to_string()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;

    if let Some(path) = &args.out {
        log::info!("apply: results saved to {}", path.display());
    }
    Ok(())
}

/// Model input -> column index resolution.
///
/// Precedence: explicit var=column map, then --in-cols (minus ignores,
/// length-checked against the model inputs, optionally truncated to
/// --inputs), then header-name matching, then positional assignment over
/// the non-ignored columns.
fn resolve_input_mapping(
    kb: &KnowledgeBase,
    table: &Table,
    col_map: Option<&str>,
    in_cols: Option<&str>,
    ignore_cols: Option<&str>,
    inputs_limit: Option<usize>,
) -> Result<IndexMap<String, usize>> {
    let columns = &table.columns;
    let ignore_idxs = match ignore_cols {
        Some(spec) => resolve_cols(&parse_cols_list(spec), columns)?,
        None => Vec::new(),
    };

    if let Some(spec) = col_map {
        let mut mapping = IndexMap::new();
        for (var, col) in parse_col_map(spec)? {
            mapping.insert(var, col.resolve(columns)?);
        }
        if !mapping.is_empty() {
            return Ok(mapping);
        }
    }

    let mut model_inputs: Vec<&String> = kb.inputs.keys().collect();
    if let Some(limit) = inputs_limit {
        model_inputs.truncate(limit);
    }

    if let Some(spec) = in_cols {
        let selected: Vec<usize> = resolve_cols(&parse_cols_list(spec), columns)?
            .into_iter()
            .filter(|i| !ignore_idxs.contains(i))
            .collect();
        if selected.len() != model_inputs.len() {
            return Err(data_error!(
                "--in-cols selects {} columns but the model expects {} inputs",
                selected.len(),
                model_inputs.len()
            ));
        }
        return Ok(model_inputs.iter().map(|v| (*v).clone()).zip(selected).collect());
    }

    if table.header_mode {
        let auto: IndexMap<String, usize> = model_inputs
            .iter()
            .filter_map(|v| columns.iter().position(|c| c == *v).map(|i| ((*v).clone(), i)))
            .collect();
        if !auto.is_empty() {
            return Ok(auto);
        }
    }

    let candidates: Vec<usize> =
        (0..columns.len()).filter(|i| !ignore_idxs.contains(i)).collect();
    if candidates.len() < model_inputs.len() {
        return Err(data_error!(
            "not enough columns: {} available, {} needed",
            candidates.len(),
            model_inputs.len()
        ));
    }
    Ok(model_inputs.iter().enumerate().map(|(i, v)| ((*v).clone(), candidates[i])).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::MembershipFunction;
    use crate::variable::{InputVariable, OutputVariable};

    fn model_with_inputs(names: &[&str]) -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        for name in names {
            let mut var = InputVariable::new(*name, 0.0, 1.0).unwrap();
            var.add_term("on", MembershipFunction::triangular(0.0, 0.5, 1.0).unwrap())
                .unwrap();
            kb.add_input(var).unwrap();
        }
        let mut out = OutputVariable::new("class", 0.0, 1.0).unwrap();
        out.add_term("a", MembershipFunction::triangular(0.0, 0.5, 1.0).unwrap())
            .unwrap();
        kb.add_output(out).unwrap();
        kb
    }

    fn table(columns: &[&str], header_mode: bool) -> Table {
        Table {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
            header_mode,
        }
    }

    #[test]
    fn explicit_map_wins() {
        let kb = model_with_inputs(&["x", "y"]);
        let t = table(&["A", "B", "C"], true);
        let mapping =
            resolve_input_mapping(&kb, &t, Some("x=C,y=0"), None, None, None).unwrap();
        assert_eq!(mapping["x"], 2);
        assert_eq!(mapping["y"], 0);
    }

    #[test]
    fn in_cols_length_is_checked() {
        let kb = model_with_inputs(&["x", "y"]);
        let t = table(&["A", "B", "C"], true);
        let mapping =
            resolve_input_mapping(&kb, &t, None, Some("B,C"), None, None).unwrap();
        assert_eq!(mapping["x"], 1);
        assert_eq!(mapping["y"], 2);
        assert!(resolve_input_mapping(&kb, &t, None, Some("B"), None, None).is_err());
    }

    #[test]
    fn in_cols_respects_ignores_and_limit() {
        let kb = model_with_inputs(&["x", "y"]);
        let t = table(&["A", "B", "C"], true);
        // ignoring B leaves one column for a one-input model
        let mapping =
            resolve_input_mapping(&kb, &t, None, Some("B,C"), Some("B"), Some(1)).unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping["x"], 2);
    }

    #[test]
    fn header_names_match_automatically() {
        let kb = model_with_inputs(&["x", "y"]);
        let t = table(&["y", "pad", "x"], true);
        let mapping = resolve_input_mapping(&kb, &t, None, None, None, None).unwrap();
        assert_eq!(mapping["x"], 2);
        assert_eq!(mapping["y"], 0);
    }

    #[test]
    fn positional_fallback_skips_ignored() {
        let kb = model_with_inputs(&["x", "y"]);
        let t = table(&["c0", "c1", "c2"], false);
        let mapping =
            resolve_input_mapping(&kb, &t, None, None, Some("0"), None).unwrap();
        assert_eq!(mapping["x"], 1);
        assert_eq!(mapping["y"], 2);
        let too_few = resolve_input_mapping(&kb, &t, None, None, Some("0,1"), None);
        assert!(too_few.is_err());
    }
}
