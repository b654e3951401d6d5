use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use super::value::Value;
use crate::color::{self, DEFAULT_COLORMAP};
use crate::error::{Error, Result};

/// Keys a datapoint uses for identity and lineage; never allowed in `values`.
pub const RESERVED_KEYS: [&str; 2] = ["uid", "from_uid"];

/// One input row before it becomes a [`Datapoint`].
pub type Record = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Datapoint – one measurement / checkpoint
// ---------------------------------------------------------------------------

/// A single measurement of metrics, for instance an evaluated checkpoint.
/// `from_uid` points at the datapoint this one originates from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub uid: String,
    pub from_uid: Option<String>,
    pub values: BTreeMap<String, Value>,
}

impl Datapoint {
    /// Create a datapoint with a random uid.
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self::with_uid(Uuid::new_v4().simple().to_string(), values)
    }

    pub fn with_uid(uid: impl Into<String>, values: BTreeMap<String, Value>) -> Self {
        Datapoint {
            uid: uid.into(),
            from_uid: None,
            values,
        }
    }

    /// Set the parent datapoint.
    pub fn from_parent(mut self, from_uid: impl Into<String>) -> Self {
        self.from_uid = Some(from_uid.into());
        self
    }
}

/// Union of the value columns of `datapoints`, sorted, reserved keys excluded.
pub(crate) fn columns_of(datapoints: &[Datapoint]) -> Vec<String> {
    let mut columns: BTreeSet<&str> = BTreeSet::new();
    for dp in datapoints {
        columns.extend(dp.values.keys().map(String::as_str));
    }
    for reserved in RESERVED_KEYS {
        columns.remove(reserved);
    }
    columns.into_iter().map(str::to_string).collect()
}

// ---------------------------------------------------------------------------
// ValueDef – per-column rendering hints
// ---------------------------------------------------------------------------

/// How the renderer should scale a column. Unset means "infer from data".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Categorical,
    Numeric,
    #[serde(rename = "numericlog")]
    NumericLog,
    #[serde(rename = "numericpercentile")]
    NumericPercentile,
    Timestamp,
}

/// Overrides for the generated definition of a column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueDef {
    #[serde(rename = "type")]
    pub value_type: Option<ValueType>,
    /// Categorical value → color (`rgb(...)`, `hsl(...)` or `#rrggbb`).
    pub colors: Option<BTreeMap<String, String>>,
    /// Continuous D3 scale, e.g. `interpolateViridis` or `schemeAccent#inverse`.
    pub colormap: Option<String>,
    pub force_value_min: Option<f64>,
    pub force_value_max: Option<f64>,
    pub label_css: Option<String>,
    pub label_html: Option<String>,
}

impl ValueDef {
    /// Force the axis range of a numeric column.
    pub fn force_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.force_value_min = Some(min);
        self.force_value_max = Some(max);
        self
    }
}

// ---------------------------------------------------------------------------
// Displays – named rendering surfaces
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Displays {
    ParallelPlot,
    Table,
    Xy,
    Distribution,
}

impl Displays {
    pub const ALL: [Displays; 4] = [
        Displays::ParallelPlot,
        Displays::Table,
        Displays::Xy,
        Displays::Distribution,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Displays::ParallelPlot => "PARALLEL_PLOT",
            Displays::Table => "TABLE",
            Displays::Xy => "XY",
            Displays::Distribution => "DISTRIBUTION",
        }
    }
}

impl fmt::Display for Displays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Experiment – everything shown in one visualization
// ---------------------------------------------------------------------------

/// Datapoints plus column and display metadata.
///
/// Build one with [`Experiment::from_records`] or by pushing datapoints, then
/// call [`Experiment::validate`] before handing it to a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    pub datapoints: Vec<Datapoint>,
    pub parameters_definition: BTreeMap<String, ValueDef>,
    pub colormap: String,
    pub colorby: Option<String>,
    pub weightcolumn: Option<String>,
    /// Display name (see [`Displays`]) → opaque settings object.
    pub display_data: BTreeMap<String, Map<String, JsonValue>>,
}

impl Default for Experiment {
    fn default() -> Self {
        Self {
            datapoints: Vec::new(),
            parameters_definition: BTreeMap::new(),
            colormap: DEFAULT_COLORMAP.to_string(),
            colorby: None,
            weightcolumn: None,
            display_data: BTreeMap::new(),
        }
    }
}

impl Experiment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_datapoints(datapoints: Vec<Datapoint>) -> Self {
        Experiment {
            datapoints,
            ..Self::default()
        }
    }

    /// One datapoint per record. A `uid` entry becomes the uid (the row index
    /// is used otherwise) and a non-empty `from_uid` entry the parent.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let datapoints = records
            .into_iter()
            .enumerate()
            .map(|(row, mut values)| {
                let uid = match values.remove("uid") {
                    Some(v) if !v.is_null() => v.to_string(),
                    _ => row.to_string(),
                };
                let from_uid = values
                    .remove("from_uid")
                    .map(|v| v.to_string())
                    .filter(|s| !s.is_empty());
                Datapoint {
                    uid,
                    from_uid,
                    values,
                }
            })
            .collect();
        Self::from_datapoints(datapoints)
    }

    /// Same as [`Experiment::from_records`] for rows of JSON objects.
    pub fn from_json_records(rows: &[JsonValue]) -> Result<Self> {
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let obj = row.as_object().ok_or_else(|| {
                    Error::format("records", format!("Row {i} is not a JSON object"))
                })?;
                Ok(obj
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect::<Record>())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_records(records))
    }

    /// Number of datapoints.
    pub fn len(&self) -> usize {
        self.datapoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datapoints.is_empty()
    }

    /// Definition of `column`, created with defaults on first access.
    pub fn parameter(&mut self, column: &str) -> &mut ValueDef {
        self.parameters_definition
            .entry(column.to_string())
            .or_default()
    }

    /// Settings of a display surface, created empty on first access.
    pub fn display_data(&mut self, display: Displays) -> &mut Map<String, JsonValue> {
        self.display_data
            .entry(display.as_str().to_string())
            .or_default()
    }

    /// Union of the value columns of every datapoint, sorted.
    pub fn columns(&self) -> Vec<String> {
        columns_of(&self.datapoints)
    }

    /// Distinct values of `column` across all datapoints.
    pub fn unique_values(&self, column: &str) -> BTreeSet<Value> {
        self.datapoints
            .iter()
            .filter_map(|dp| dp.values.get(column))
            .cloned()
            .collect()
    }

    /// Give every distinct value of `column` its own color.
    pub fn color_categories(&mut self, column: &str) -> &mut Self {
        let values = self.unique_values(column);
        let colors = values
            .iter()
            .map(Value::to_string)
            .zip(color::generate_palette(values.len()))
            .collect();
        self.parameter(column).colors = Some(colors);
        self
    }

    /// Drop every `from_uid` pointing at a datapoint that does not exist.
    pub fn remove_missing_parents(&mut self) -> &mut Self {
        let uids: HashSet<String> = self.datapoints.iter().map(|dp| dp.uid.clone()).collect();
        for dp in &mut self.datapoints {
            if dp.from_uid.as_ref().is_some_and(|p| !uids.contains(p)) {
                log::debug!("Removing missing parent {:?} of {}", dp.from_uid, dp.uid);
                dp.from_uid = None;
            }
        }
        self
    }

    /// Merge several experiments into one.
    ///
    /// Uids and parents are prefixed with `<key>_` and each datapoint gets an
    /// `exp` value holding its key. Column definitions and display settings
    /// of later experiments override earlier ones.
    pub fn merge<I, K>(experiments: I) -> Experiment
    where
        I: IntoIterator<Item = (K, Experiment)>,
        K: Into<String>,
    {
        let mut merged = Experiment::new();
        for (key, sub) in experiments {
            let key: String = key.into();
            merged
                .datapoints
                .extend(sub.datapoints.into_iter().map(|dp| {
                    let mut values = dp.values;
                    values.insert("exp".to_string(), Value::String(key.clone()));
                    Datapoint {
                        uid: format!("{key}_{}", dp.uid),
                        from_uid: dp.from_uid.map(|p| format!("{key}_{p}")),
                        values,
                    }
                }));
            merged
                .parameters_definition
                .extend(sub.parameters_definition);
            for (display, settings) in sub.display_data {
                merged
                    .display_data
                    .entry(display)
                    .or_default()
                    .extend(settings);
            }
        }
        merged
    }
}
