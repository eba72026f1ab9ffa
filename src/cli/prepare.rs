//! Data preparation: select columns, label-encode textual cells, and emit a
//! numeric CSV plus a JSON mapping document describing what was done.

use super::PrepareArgs;
use crate::data_error;
use crate::error::Result;
use crate::table::{parse_cols_list, read_table, resolve_cols, Table};
use indexmap::IndexMap;
use serde::Serialize;
use std::fs;

/// Metadata written next to the prepared CSV.
#[derive(Debug, Clone, Serialize)]
pub struct PrepareMapping {
    pub inputs: Vec<String>,
    pub output: String,
    pub ignored: Vec<String>,
    pub label_maps: IndexMap<String, IndexMap<String, i64>>,
    pub source_csv: String,
    pub header_mode: bool,
}

pub fn cmd_prepare(args: &PrepareArgs) -> anyhow::Result<()> {
    let table = read_table(&args.csv)?;
    let (header, rows, mapping) = prepare_table(
        &table,
        &args.in_cols,
        &args.out_col,
        &args.num_cols,
        &args.str_cols,
        &args.ignore_cols,
        &args.csv.display().to_string(),
    )?;

    if let Some(dir) = args.out.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut writer = csv::Writer::from_path(&args.out)?;
    writer.write_record(&header)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    if let Some(dir) = args.mapping.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(&args.mapping, serde_json::to_string_pretty(&mapping)?)?;

    println!("[prepare] wrote {}", args.out.display());
    println!("[prepare] mapping {}", args.mapping.display());
    Ok(())
}

/// Number of leading rows probed for textual-column auto-detection.
const PROBE_ROWS: usize = 50;

#[allow(clippy::type_complexity)]
pub fn prepare_table(
    table: &Table,
    in_cols: &str,
    out_col: &str,
    num_cols: &str,
    str_cols: &str,
    ignore_cols: &str,
    source_csv: &str,
) -> Result<(Vec<String>, Vec<Vec<String>>, PrepareMapping)> {
    let columns = &table.columns;
    let in_idxs = resolve_cols(&parse_cols_list(in_cols), columns)?;
    if in_idxs.is_empty() {
        return Err(data_error!("--in-cols selects no columns"));
    }
    let out_specs = parse_cols_list(out_col);
    if out_specs.len() != 1 {
        return Err(data_error!("--out-col must name exactly one column"));
    }
    let out_idx = out_specs[0].resolve(columns)?;
    // numeric columns are resolved for existence, nothing else to do for them
    let _num_idxs = resolve_cols(&parse_cols_list(num_cols), columns)?;
    let str_idxs = resolve_cols(&parse_cols_list(str_cols), columns)?;
    let ignore_idxs = resolve_cols(&parse_cols_list(ignore_cols), columns)?;

    if ignore_idxs.contains(&out_idx) {
        return Err(data_error!("the output column cannot be ignored"));
    }
    if let Some(i) = in_idxs.iter().find(|i| ignore_idxs.contains(i)) {
        return Err(data_error!("input column [{}] is also ignored", i));
    }
    if in_idxs.contains(&out_idx) {
        return Err(data_error!("the same column cannot be both input and output"));
    }

    // auto-detect textual columns on a leading probe when none were given
    let mut textual: Vec<usize> = str_idxs.clone();
    if str_idxs.is_empty() {
        for j in 0..columns.len() {
            if ignore_idxs.contains(&j) {
                continue;
            }
            let mut total = 0usize;
            let mut non_numeric = 0usize;
            for row in table.rows.iter().take(PROBE_ROWS) {
                let Some(cell) = row.get(j) else { continue };
                total += 1;
                if !crate::table::is_numeric_cell(cell) {
                    non_numeric += 1;
                }
            }
            if total > 0 && non_numeric * 2 > total {
                textual.push(j);
            }
        }
    }

    // label map for a textual output, ids in first-occurrence order
    let mut label_maps: IndexMap<String, IndexMap<String, i64>> = IndexMap::new();
    if textual.contains(&out_idx) {
        let mut label_map: IndexMap<String, i64> = IndexMap::new();
        for row in &table.rows {
            if let Some(value) = row.get(out_idx) {
                let next = label_map.len() as i64;
                label_map.entry(value.clone()).or_insert(next);
            }
        }
        label_maps.insert(columns[out_idx].clone(), label_map);
    }

    let mut header: Vec<String> = in_idxs.iter().map(|&i| columns[i].clone()).collect();
    header.push(columns[out_idx].clone());

    let mut out_rows = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        if row.is_empty() {
            continue;
        }
        let mut record = Vec::with_capacity(header.len());
        for &i in &in_idxs {
            record.push(numeric_cell(row.get(i)));
        }
        if let Some(label_map) = label_maps.get_mut(&columns[out_idx]) {
            // unseen labels are appended on the fly
            let value = row.get(out_idx).cloned().unwrap_or_default();
            let next = label_map.len() as i64;
            let id = *label_map.entry(value).or_insert(next);
            record.push(id.to_string());
        } else {
            record.push(numeric_cell(row.get(out_idx)));
        }
        out_rows.push(record);
    }

    let mapping = PrepareMapping {
        inputs: in_idxs.iter().map(|&i| columns[i].clone()).collect(),
        output: columns[out_idx].clone(),
        ignored: ignore_idxs.iter().map(|&i| columns[i].clone()).collect(),
        label_maps,
        source_csv: source_csv.to_string(),
        header_mode: table.header_mode,
    };
    Ok((header, out_rows, mapping))
}

fn numeric_cell(cell: Option<&String>) -> String {
    match cell.map(|c| c.trim()) {
        Some(c) if !c.is_empty() => match c.parse::<f64>() {
            Ok(v) => v.to_string(),
            Err(_) => "NaN".to_string(),
        },
        _ => "NaN".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iris_like() -> Table {
        Table {
            columns: vec!["Id".into(), "SepalLengthCm".into(), "Species".into()],
            rows: vec![
                vec!["1".into(), "5.1".into(), "setosa".into()],
                vec!["2".into(), "7.0".into(), "versicolor".into()],
                vec!["3".into(), "6.3".into(), "virginica".into()],
                vec!["4".into(), "4.9".into(), "setosa".into()],
            ],
            header_mode: true,
        }
    }

    #[test]
    fn labels_encode_in_first_occurrence_order() {
        let table = iris_like();
        let (header, rows, mapping) =
            prepare_table(&table, "SepalLengthCm", "Species", "", "", "Id", "iris.csv").unwrap();
        assert_eq!(header, vec!["SepalLengthCm", "Species"]);
        assert_eq!(rows[0], vec!["5.1", "0"]);
        assert_eq!(rows[1], vec!["7", "1"]);
        assert_eq!(rows[2], vec!["6.3", "2"]);
        assert_eq!(rows[3], vec!["4.9", "0"]);
        let species = &mapping.label_maps["Species"];
        assert_eq!(species["setosa"], 0);
        assert_eq!(species["versicolor"], 1);
        assert_eq!(species["virginica"], 2);
        assert_eq!(mapping.ignored, vec!["Id"]);
        assert!(mapping.header_mode);
    }

    #[test]
    fn role_conflicts_are_rejected() {
        let table = iris_like();
        assert!(prepare_table(&table, "SepalLengthCm", "Species", "", "", "Species", "x").is_err());
        assert!(prepare_table(&table, "Species", "Species", "", "", "", "x").is_err());
        assert!(prepare_table(&table, "SepalLengthCm", "SepalLengthCm,Species", "", "", "", "x").is_err());
    }

    #[test]
    fn unparseable_numeric_cells_become_nan() {
        let mut table = iris_like();
        table.rows[1][1] = "oops".into();
        let (_, rows, _) =
            prepare_table(&table, "SepalLengthCm", "Species", "", "", "Id", "x").unwrap();
        assert_eq!(rows[1][0], "NaN");
    }

    #[test]
    fn numeric_output_is_passed_through() {
        let table = Table {
            columns: vec!["a".into(), "y".into()],
            rows: vec![
                vec!["1.5".into(), "0".into()],
                vec!["2.5".into(), "1".into()],
            ],
            header_mode: true,
        };
        let (_, rows, mapping) = prepare_table(&table, "a", "y", "", "", "", "x").unwrap();
        assert_eq!(rows[0], vec!["1.5", "0"]);
        assert!(mapping.label_maps.is_empty());
    }
}
