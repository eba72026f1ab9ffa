//! CSV table loading and column addressing shared by the learner and the
//! batch commands.
//!
//! Convention: the first row is a header when any of its cells is
//! non-numeric; otherwise synthetic `c0,c1,...` names are used and the row
//! counts as data.

use crate::data_error;
use crate::error::Result;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub header_mode: bool,
}

pub fn is_numeric_cell(cell: &str) -> bool {
    cell.trim().parse::<f64>().is_ok()
}

pub fn read_table(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_path(path)?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    if rows.is_empty() {
        return Err(data_error!("empty CSV file: {}", path.display()));
    }

    let header_mode = rows[0].iter().any(|c| !is_numeric_cell(c));
    let columns = if header_mode {
        rows.remove(0).iter().map(|c| c.trim().to_string()).collect()
    } else {
        (0..rows[0].len()).map(|i| format!("c{}", i)).collect()
    };

    Ok(Table { columns, rows, header_mode })
}

/// Column address: positional index or header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColSpec {
    Index(usize),
    Name(String),
}

impl FromStr for ColSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let t = s.trim();
        Ok(match t.parse::<usize>() {
            Ok(index) => ColSpec::Index(index),
            Err(_) => ColSpec::Name(t.to_string()),
        })
    }
}

impl ColSpec {
    pub fn resolve(&self, columns: &[String]) -> Result<usize> {
        match self {
            ColSpec::Index(i) => {
                if *i >= columns.len() {
                    return Err(data_error!(
                        "column index {} out of range (CSV has {} columns)",
                        i,
                        columns.len()
                    ));
                }
                Ok(*i)
            }
            ColSpec::Name(name) => columns.iter().position(|c| c == name).ok_or_else(|| {
                data_error!("column '{}' not found (columns: {})", name, columns.join(", "))
            }),
        }
    }
}

/// `"a,b,2"` -> `[Name(a), Name(b), Index(2)]`; empty tokens are dropped.
pub fn parse_cols_list(spec: &str) -> Vec<ColSpec> {
    spec.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse().unwrap())
        .collect()
}

pub fn resolve_cols(specs: &[ColSpec], columns: &[String]) -> Result<Vec<usize>> {
    specs.iter().map(|s| s.resolve(columns)).collect()
}

/// `"var=column,..."` pairs; the column side may be an index or a name.
pub fn parse_col_map(spec: &str) -> Result<Vec<(String, ColSpec)>> {
    let mut out = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let Some((key, value)) = part.split_once('=') else {
            return Err(data_error!("invalid mapping '{}' (expected 'var=column')", part));
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            return Err(data_error!("empty key or value in mapping '{}'", part));
        }
        out.push((key.to_string(), value.parse().unwrap()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn header_detected_from_non_numeric_cells() {
        let file = write_csv("a,b,label\n1,2,x\n3,4,y\n");
        let table = read_table(file.path()).unwrap();
        assert!(table.header_mode);
        assert_eq!(table.columns, vec!["a", "b", "label"]);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn headerless_csv_gets_synthetic_names() {
        let file = write_csv("1,2,3\n4,5,6\n");
        let table = read_table(file.path()).unwrap();
        assert!(!table.header_mode);
        assert_eq!(table.columns, vec!["c0", "c1", "c2"]);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn col_specs_resolve_by_name_or_index() {
        let columns: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let specs = parse_cols_list("b, 2 ,a");
        assert_eq!(resolve_cols(&specs, &columns).unwrap(), vec![1, 2, 0]);
        assert!(ColSpec::Index(5).resolve(&columns).is_err());
        assert!(ColSpec::Name("zz".into()).resolve(&columns).is_err());
    }

    #[test]
    fn col_map_parses_pairs() {
        let map = parse_col_map("sepal_length=1, petal_width=PetalWidthCm").unwrap();
        assert_eq!(map[0], ("sepal_length".to_string(), ColSpec::Index(1)));
        assert_eq!(map[1], ("petal_width".to_string(), ColSpec::Name("PetalWidthCm".into())));
        assert!(parse_col_map("nonsense").is_err());
    }
}
