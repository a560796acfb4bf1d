//! Per-job-type computation over an uploaded CSV.
//!
//! Every job type produces the same base summary: header, row count and
//! simple statistics for numeric columns, tagged with the job type's label.

use analysis_core::job_type::JobType;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::WorkerError;

/// Parsed CSV: header plus data rows (blank lines dropped).
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Summary statistics for a column whose non-empty cells are all numeric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Parse raw CSV bytes. The first non-blank line is the header.
pub fn parse_csv(data: &[u8]) -> Result<CsvTable, WorkerError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| WorkerError::Compute(format!("CSV is not valid UTF-8: {e}")))?;
    let text = text.trim_start_matches('\u{feff}');

    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header_line = lines
        .next()
        .ok_or_else(|| WorkerError::Compute("CSV file is empty".into()))?;

    let columns: Vec<String> = parse_csv_line(header_line)
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();
    if columns.iter().all(String::is_empty) {
        return Err(WorkerError::Compute("CSV header row is empty".into()));
    }

    let rows = lines.map(parse_csv_line).collect();
    Ok(CsvTable { columns, rows })
}

/// Split one CSV line into fields, honouring double-quoted fields.
fn parse_csv_line(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else if ch == '"' {
            in_quotes = true;
        } else if ch == ',' {
            result.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    result.push(current);
    result
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Statistics for every column whose non-empty cells all parse as numbers.
pub fn numeric_summaries(table: &CsvTable) -> Vec<NumericSummary> {
    table
        .columns
        .iter()
        .enumerate()
        .filter_map(|(i, name)| {
            let mut values = Vec::new();
            for row in &table.rows {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                if cell.trim().is_empty() {
                    continue;
                }
                values.push(parse_number(cell)?);
            }
            if values.is_empty() {
                return None;
            }

            let count = values.len();
            let sum: f64 = values.iter().sum();
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            Some(NumericSummary {
                name: name.clone(),
                count,
                mean: sum / count as f64,
                min,
                max,
            })
        })
        .collect()
}

/// Run the computation for `job_type` and return the JSON stored as the job result.
pub fn run_analysis(
    job_type: JobType,
    data: &[u8],
    column_config: Option<&Value>,
) -> Result<Value, WorkerError> {
    let table = parse_csv(data)?;
    let summaries = numeric_summaries(&table);

    let mut result = json!({
        "type": job_type.label(),
        "processedAt": Utc::now().to_rfc3339(),
        "inputRows": table.rows.len(),
        "columns": table.columns,
        "numericColumns": summaries,
    });
    if let (Some(config), Some(obj)) = (column_config, result.as_object_mut()) {
        obj.insert("columnConfig".into(), config.clone());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_header_rows_and_quotes() {
        let table = parse_csv(b"id,name,days\n1,\"Smith, J\",847\n\n2,\"say \"\"hi\"\"\",12\n").unwrap();
        assert_eq!(table.columns, vec!["id", "name", "days"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], "Smith, J");
        assert_eq!(table.rows[1][1], "say \"hi\"");
    }

    #[test]
    fn empty_or_headerless_input_is_a_compute_error() {
        assert_matches!(parse_csv(b""), Err(WorkerError::Compute(msg)) if msg == "CSV file is empty");
        assert_matches!(parse_csv(b"\n  \n"), Err(WorkerError::Compute(_)));
        assert_matches!(parse_csv(b" , ,\n1,2,3\n"), Err(WorkerError::Compute(_)));
        assert_matches!(parse_csv(&[0xff, 0xfe, 0x00]), Err(WorkerError::Compute(_)));
    }

    #[test]
    fn numeric_columns_summarised() {
        let table = parse_csv(b"customer,days,churned\na,10,1\nb,30,0\nc,,1\nd,20,x\n").unwrap();
        let summaries = numeric_summaries(&table);

        assert_eq!(summaries.len(), 1);
        let days = &summaries[0];
        assert_eq!(days.name, "days");
        assert_eq!(days.count, 3);
        assert_eq!(days.mean, 20.0);
        assert_eq!(days.min, 10.0);
        assert_eq!(days.max, 30.0);
    }

    #[test]
    fn result_carries_label_counts_and_config() {
        let config = json!({ "duration": "days" });
        let result = run_analysis(
            JobType::SurvivalAnalysis,
            b"id,days\n1,800\n2,894\n",
            Some(&config),
        )
        .unwrap();

        assert_eq!(result["type"], "Survival Analysis");
        assert_eq!(result["inputRows"], 2);
        assert_eq!(result["columns"], json!(["id", "days"]));
        assert_eq!(result["numericColumns"][1]["mean"], json!(847.0));
        assert_eq!(result["columnConfig"], config);
        assert!(result["processedAt"].is_string());
    }

    #[test]
    fn non_finite_cells_are_not_numeric() {
        let table = parse_csv(b"x\nNaN\n1\n").unwrap();
        assert!(numeric_summaries(&table).is_empty());
    }
}
