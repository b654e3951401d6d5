use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::{FetchOutcome, Fetcher, FetcherChain};
use crate::data::model::{Experiment, Record};
use crate::data::value::Value;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn has_extension(uri: &str, extensions: &[&str]) -> bool {
    Path::new(uri)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| ext.eq_ignore_ascii_case(x)))
}

/// Open `uri`, or `None` when there is no such file.
fn open_existing(uri: &str) -> Result<Option<File>> {
    match File::open(uri) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// `*.csv`: header row plus one datapoint per row.
pub struct CsvFetcher;

impl Fetcher for CsvFetcher {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, uri: &str, _chain: &FetcherChain) -> Result<FetchOutcome> {
        if !has_extension(uri, &["csv"]) {
            return Ok(FetchOutcome::not_applicable(format!("Not a CSV file: {uri}")));
        }
        let Some(file) = open_existing(uri)? else {
            return Ok(FetchOutcome::not_applicable(format!("No such file: {uri}")));
        };
        Ok(FetchOutcome::Applicable(Experiment::from_csv(file)?))
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// `*.json`: either a records array
///
/// ```json
/// [{"uid": "a", "lr": 0.1}, {"uid": "b", "from_uid": "a", "lr": 0.01}]
/// ```
///
/// or a benchmark job list, flattened to one record per job:
///
/// ```json
/// [{"job_id": 3, "kwargs": {"lr": 0.1}, "results": {"scores": {"loss": 1.5}}}]
/// ```
pub struct JsonFetcher;

impl Fetcher for JsonFetcher {
    fn name(&self) -> &str {
        "json"
    }

    fn fetch(&self, uri: &str, _chain: &FetcherChain) -> Result<FetchOutcome> {
        if !has_extension(uri, &["json"]) {
            return Ok(FetchOutcome::not_applicable(format!("Not a JSON file: {uri}")));
        }
        let Some(file) = open_existing(uri)? else {
            return Ok(FetchOutcome::not_applicable(format!("No such file: {uri}")));
        };
        let root: JsonValue = serde_json::from_reader(BufReader::new(file))?;
        let rows = root
            .as_array()
            .ok_or_else(|| Error::format(uri, "Expected top-level JSON array"))?;

        let xp = if rows.first().is_some_and(is_benchmark_job) {
            log::debug!("{uri}: benchmark job list");
            let records = rows
                .iter()
                .enumerate()
                .map(|(i, job)| flatten_job(job).ok_or_else(|| {
                    Error::format(uri, format!("Job {i} lacks job_id, kwargs or results"))
                }))
                .collect::<Result<Vec<_>>>()?;
            Experiment::from_records(records)
        } else {
            Experiment::from_json_records(rows).map_err(|e| match e {
                Error::Format { message, .. } => Error::format(uri, message),
                other => other,
            })?
        };
        Ok(FetchOutcome::Applicable(xp))
    }
}

fn is_benchmark_job(row: &JsonValue) -> bool {
    ["job_id", "kwargs", "results"]
        .iter()
        .all(|key| row.get(key).is_some())
}

/// `{id: job_id, <kwargs as text>, <scores>}`.
fn flatten_job(job: &JsonValue) -> Option<Record> {
    let mut record = Record::new();
    record.insert("id".into(), Value::from(job.get("job_id")?));
    for (name, arg) in job.get("kwargs")?.as_object()? {
        record.insert(name.clone(), Value::String(python_str(arg)));
    }
    if let Some(scores) = job.pointer("/results/scores").and_then(JsonValue::as_object) {
        for (name, score) in scores {
            record.insert(name.clone(), Value::from(score));
        }
    }
    Some(record)
}

/// Text of a keyword argument as the benchmark tool printed it: strings
/// bare, everything else in Python literal notation.
fn python_str(arg: &JsonValue) -> String {
    match arg {
        JsonValue::String(s) => s.clone(),
        other => python_repr(other),
    }
}

fn python_repr(arg: &JsonValue) -> String {
    match arg {
        JsonValue::Null => "None".into(),
        JsonValue::Bool(true) => "True".into(),
        JsonValue::Bool(false) => "False".into(),
        JsonValue::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => python_float(f),
            _ => n.to_string(),
        },
        JsonValue::String(s) => {
            let escaped = s.replace('\\', "\\\\");
            if s.contains('\'') && !s.contains('"') {
                format!("\"{escaped}\"")
            } else {
                format!("'{}'", escaped.replace('\'', "\\'"))
            }
        }
        JsonValue::Array(items) => {
            let items: Vec<String> = items.iter().map(python_repr).collect();
            format!("[{}]", items.join(", "))
        }
        JsonValue::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| {
                    let key = python_repr(&JsonValue::from(k.as_str()));
                    format!("{key}: {}", python_repr(v))
                })
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

/// Shortest digits, scientific below 1e-4 and from 1e16 on (`1e-05`, `1e+16`).
fn python_float(f: f64) -> String {
    let scientific = format!("{f:e}");
    let Some((mantissa, exp)) = scientific
        .split_once('e')
        .and_then(|(m, e)| Some((m, e.parse::<i32>().ok()?)))
    else {
        return f.to_string();
    };
    if (-4..16).contains(&exp) {
        if f.fract() == 0.0 {
            format!("{f:.1}")
        } else {
            f.to_string()
        }
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    }
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// `*.parquet` / `*.pq`: one datapoint per row of flat scalar columns.
/// Written by Pandas (`df.to_parquet()`) or Polars (`df.write_parquet()`).
pub struct ParquetFetcher;

impl Fetcher for ParquetFetcher {
    fn name(&self) -> &str {
        "parquet"
    }

    fn fetch(&self, uri: &str, _chain: &FetcherChain) -> Result<FetchOutcome> {
        if !has_extension(uri, &["parquet", "pq"]) {
            return Ok(FetchOutcome::not_applicable(format!("Not a Parquet file: {uri}")));
        }
        let Some(file) = open_existing(uri)? else {
            return Ok(FetchOutcome::not_applicable(format!("No such file: {uri}")));
        };
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut records = Vec::new();
        for batch in reader {
            let batch = batch?;
            let schema = batch.schema();
            for row in 0..batch.num_rows() {
                let record: Record = schema
                    .fields()
                    .iter()
                    .zip(batch.columns())
                    .filter_map(|(field, col)| {
                        cell_value(col, row).map(|v| (field.name().clone(), v))
                    })
                    .collect();
                records.push(record);
            }
        }
        Ok(FetchOutcome::Applicable(Experiment::from_records(records)))
    }
}

/// Value of `col` at `row`; `None` for nulls.
fn cell_value(col: &ArrayRef, row: usize) -> Option<Value> {
    if col.is_null(row) {
        return None;
    }
    let value = match col.data_type() {
        DataType::Utf8 => Value::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Boolean => Value::Bool(col.as_boolean().value(row)),
        DataType::Int8 => Value::Int(col.as_primitive::<Int8Type>().value(row).into()),
        DataType::Int16 => Value::Int(col.as_primitive::<Int16Type>().value(row).into()),
        DataType::Int32 => Value::Int(col.as_primitive::<Int32Type>().value(row).into()),
        DataType::Int64 => Value::Int(col.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Value::Int(col.as_primitive::<UInt8Type>().value(row).into()),
        DataType::UInt16 => Value::Int(col.as_primitive::<UInt16Type>().value(row).into()),
        DataType::UInt32 => Value::Int(col.as_primitive::<UInt32Type>().value(row).into()),
        DataType::UInt64 => {
            let v = col.as_primitive::<UInt64Type>().value(row);
            i64::try_from(v).map_or(Value::Float(v as f64), Value::Int)
        }
        DataType::Float32 => Value::Float(col.as_primitive::<Float32Type>().value(row).into()),
        DataType::Float64 => Value::Float(col.as_primitive::<Float64Type>().value(row)),
        other => Value::String(format!("{other:?}")),
    };
    Some(value)
}
