//! Wire form consumed by the rendering front-end.
//!
//! ```json
//! {
//!   "datapoints": [{"uid": "0", "from_uid": null, "values": {"lr": 0.1}}],
//!   "parameters_definition": {"lr": {"type": "numericlog", ...}},
//!   "colormap": "interpolateTurbo",
//!   "colorby": null,
//!   "weightcolumn": null,
//!   "display_data": {"XY": {"axis_x": "lr"}}
//! }
//! ```
//!
//! With compression `datapoints` is replaced by
//! `"datapoints_compressed": {"columns": [...], "rows": [[uid, from_uid, v0, v1, ...]]}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use super::model::{columns_of, Datapoint, Experiment, ValueDef};
use super::value::Value;
use crate::color::DEFAULT_COLORMAP;
use crate::error::{Error, Result};

/// Datapoints re-encoded as positional rows sharing one column header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedDatapoints {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
}

/// Encode datapoints as `[uid, from_uid, col0, col1, ...]` rows.
/// Absent values become `null`.
pub fn compress(datapoints: &[Datapoint]) -> CompressedDatapoints {
    let columns = columns_of(datapoints);
    let rows = datapoints
        .iter()
        .map(|dp| {
            let mut row = Vec::with_capacity(columns.len() + 2);
            row.push(JsonValue::String(dp.uid.clone()));
            row.push(dp.from_uid.clone().map_or(JsonValue::Null, JsonValue::String));
            row.extend(
                columns
                    .iter()
                    .map(|c| dp.values.get(c).map_or(JsonValue::Null, Value::to_json)),
            );
            row
        })
        .collect();
    CompressedDatapoints { columns, rows }
}

/// Inverse of [`compress`], producing wire datapoint objects.
pub fn uncompress(compressed: &CompressedDatapoints) -> Vec<JsonValue> {
    compressed
        .rows
        .iter()
        .map(|row| {
            let mut values = Map::new();
            for (i, column) in compressed.columns.iter().enumerate() {
                let v = row.get(i + 2).cloned().unwrap_or(JsonValue::Null);
                values.insert(column.clone(), v);
            }
            json!({
                "uid": row.first().cloned().unwrap_or(JsonValue::Null),
                "from_uid": row.get(1).cloned().unwrap_or(JsonValue::Null),
                "values": values,
            })
        })
        .collect()
}

fn datapoint_to_json(dp: &Datapoint) -> JsonValue {
    let values: Map<String, JsonValue> = dp
        .values
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    json!({
        "uid": dp.uid,
        "from_uid": dp.from_uid,
        "values": values,
    })
}

fn datapoint_from_json(row: &JsonValue) -> Result<Datapoint> {
    let obj = row
        .as_object()
        .ok_or_else(|| Error::format("wire", "datapoint is not a JSON object"))?;
    let uid = match obj.get("uid") {
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) if !other.is_null() => Value::from(other).to_string(),
        _ => return Err(Error::format("wire", "datapoint without uid")),
    };
    let from_uid = match obj.get("from_uid") {
        None | Some(JsonValue::Null) => None,
        Some(other) => Some(Value::from(other).to_string()),
    };
    let values = match obj.get("values") {
        Some(JsonValue::Object(values)) => values
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v)))
            .collect(),
        None | Some(JsonValue::Null) => BTreeMap::new(),
        Some(_) => return Err(Error::format("wire", format!("values of {uid} is not an object"))),
    };
    Ok(Datapoint {
        uid,
        from_uid,
        values,
    })
}

impl Experiment {
    /// Deterministic projection handed to the renderer. Column definitions
    /// and display settings are always present, even when empty.
    pub fn to_wire(&self, compress_datapoints: bool) -> JsonValue {
        let mut out = Map::new();
        if compress_datapoints {
            out.insert(
                "datapoints_compressed".to_string(),
                json!(compress(&self.datapoints)),
            );
        } else {
            out.insert(
                "datapoints".to_string(),
                JsonValue::Array(self.datapoints.iter().map(datapoint_to_json).collect()),
            );
        }
        out.insert(
            "parameters_definition".to_string(),
            json!(self.parameters_definition),
        );
        out.insert("colormap".to_string(), json!(self.colormap));
        out.insert("colorby".to_string(), json!(self.colorby));
        out.insert("weightcolumn".to_string(), json!(self.weightcolumn));
        out.insert("display_data".to_string(), json!(self.display_data));
        JsonValue::Object(out)
    }

    /// Read back either wire shape.
    pub fn from_wire(wire: &JsonValue) -> Result<Experiment> {
        let obj = wire
            .as_object()
            .ok_or_else(|| Error::format("wire", "experiment is not a JSON object"))?;

        let rows = match (obj.get("datapoints"), obj.get("datapoints_compressed")) {
            (_, Some(compressed)) if !compressed.is_null() => {
                let compressed: CompressedDatapoints = serde_json::from_value(compressed.clone())?;
                uncompress(&compressed)
            }
            (Some(JsonValue::Array(rows)), _) => rows.clone(),
            _ => return Err(Error::format("wire", "no datapoints")),
        };
        let datapoints = rows
            .iter()
            .map(datapoint_from_json)
            .collect::<Result<Vec<_>>>()?;
        let mut xp = Experiment::from_datapoints(datapoints);
        // Compressed rows carry `null` for absent cells.
        if obj.contains_key("datapoints_compressed") {
            for dp in &mut xp.datapoints {
                dp.values.retain(|_, v| !v.is_null());
            }
        }

        if let Some(defs) = obj.get("parameters_definition").filter(|v| !v.is_null()) {
            xp.parameters_definition =
                serde_json::from_value::<BTreeMap<String, ValueDef>>(defs.clone())?;
        }
        xp.colormap = obj
            .get("colormap")
            .and_then(JsonValue::as_str)
            .unwrap_or(DEFAULT_COLORMAP)
            .to_string();
        xp.colorby = obj.get("colorby").and_then(JsonValue::as_str).map(str::to_string);
        xp.weightcolumn = obj
            .get("weightcolumn")
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        if let Some(JsonValue::Object(displays)) = obj.get("display_data") {
            for (name, settings) in displays {
                if let JsonValue::Object(settings) = settings {
                    xp.display_data.insert(name.clone(), settings.clone());
                }
            }
        }
        Ok(xp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Displays, Record, ValueType};

    fn sample() -> Experiment {
        let mut a = Record::new();
        a.insert("lr".into(), Value::Float(0.1));
        a.insert("opt".into(), Value::from("sgd"));
        let mut b = Record::new();
        b.insert("lr".into(), Value::Float(0.01));
        let mut xp = Experiment::from_datapoints(vec![
            Datapoint::with_uid("a", a),
            Datapoint::with_uid("b", b).from_parent("a"),
        ]);
        xp.parameter("lr").value_type = Some(ValueType::NumericLog);
        xp
    }

    #[test]
    fn test_empty_metadata_is_emitted() {
        let wire = Experiment::from_datapoints(vec![Datapoint::with_uid("x", Record::new())])
            .to_wire(false);
        assert_eq!(wire["parameters_definition"], json!({}));
        assert_eq!(wire["display_data"], json!({}));
        assert_eq!(wire["colormap"], "interpolateTurbo");
        assert!(wire["colorby"].is_null());
    }

    #[test]
    fn test_wire_datapoints() {
        let wire = sample().to_wire(false);
        assert_eq!(
            wire["datapoints"][1],
            json!({"uid": "b", "from_uid": "a", "values": {"lr": 0.01}})
        );
        assert_eq!(wire["parameters_definition"]["lr"]["type"], "numericlog");
    }

    #[test]
    fn test_special_floats_on_the_wire() {
        let mut values = Record::new();
        values.insert("x".into(), Value::Float(f64::NEG_INFINITY));
        values.insert("y".into(), Value::Float(f64::NAN));
        let wire = Experiment::from_datapoints(vec![Datapoint::with_uid("0", values)]).to_wire(false);
        assert_eq!(wire["datapoints"][0]["values"], json!({"x": "-inf", "y": null}));
    }

    #[test]
    fn test_compress_rows() {
        let compressed = compress(&sample().datapoints);
        assert_eq!(compressed.columns, ["lr", "opt"]);
        assert_eq!(compressed.rows[0], vec![json!("a"), json!(null), json!(0.1), json!("sgd")]);
        assert_eq!(compressed.rows[1], vec![json!("b"), json!("a"), json!(0.01), json!(null)]);
    }

    #[test]
    fn test_uncompress_restores_datapoints() {
        let xp = sample();
        let restored = uncompress(&compress(&xp.datapoints));
        assert_eq!(restored[0]["values"]["opt"], "sgd");
        assert_eq!(restored[1]["from_uid"], "a");
        assert!(restored[1]["values"]["opt"].is_null());
    }

    #[test]
    fn test_from_wire_both_shapes() {
        let mut xp = sample();
        xp.display_data(Displays::Table)
            .insert("hide".into(), json!(["uid"]));
        xp.colorby = Some("opt".into());
        for compressed in [false, true] {
            let back = Experiment::from_wire(&xp.to_wire(compressed)).unwrap();
            assert_eq!(back, xp);
        }
    }
}
