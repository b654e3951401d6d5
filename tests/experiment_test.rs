//! Experiment model: construction, validation, merge and export.

use rusty_hiplot::data::wire::{compress, uncompress};
use rusty_hiplot::{
    Datapoint, Displays, Experiment, Record, ValidationError, Value, ValueType,
};
use serde_json::json;

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn chain(links: &[(&str, Option<&str>)]) -> Experiment {
    Experiment::from_datapoints(
        links
            .iter()
            .map(|(uid, parent)| {
                let dp = Datapoint::with_uid(*uid, record(&[("x", Value::Int(1))]));
                match parent {
                    Some(p) => dp.from_parent(*p),
                    None => dp,
                }
            })
            .collect(),
    )
}

#[test]
fn test_validate_simple_experiment() {
    let xp = Experiment::from_records(vec![
        record(&[("id", 1.into()), ("k", "v1".into())]),
        record(&[("id", 2.into()), ("k", "v2".into())]),
    ]);
    assert!(xp.validate().is_ok());
    // Idempotent and side-effect free
    let before = xp.clone();
    assert!(xp.validate().is_ok());
    assert_eq!(xp, before);
}

#[test]
fn test_validate_returns_self_for_chaining() {
    let xp = chain(&[("1", None)]);
    let wire = xp.validate().map(|xp| xp.to_wire(false)).unwrap();
    assert_eq!(wire["datapoints"][0]["uid"], "1");
}

#[test]
fn test_circular_reference() {
    let xp = chain(&[
        ("1", None),
        ("2", Some("1")),
        ("3", Some("2")),
        ("4", Some("3")),
    ]);
    assert!(xp.validate().is_ok());

    let mut cyclic = xp.clone();
    cyclic.datapoints[1].from_uid = Some("4".into());
    let err = cyclic.validate().unwrap_err();
    assert!(matches!(err, ValidationError::CircularReference { .. }));
    assert!(!err.is_schema_violation());
}

#[test]
fn test_missing_parent_then_repair() {
    let mut xp = chain(&[("1", Some("0")), ("2", Some("1"))]);
    match xp.validate() {
        Err(ValidationError::MissingParent { uid, parent }) => {
            assert_eq!(uid, "1");
            assert_eq!(parent, "0");
        }
        other => panic!("unexpected {other:?}"),
    }
    xp.remove_missing_parents();
    assert!(xp.validate().is_ok());
    assert_eq!(xp.datapoints[1].from_uid.as_deref(), Some("1"));
}

#[test]
fn test_reserved_keys_are_rejected() {
    for key in ["uid", "from_uid"] {
        let mut dp = Datapoint::with_uid("a", Record::new());
        dp.values.insert(key.into(), Value::from("x"));
        let err = Experiment::from_datapoints(vec![dp]).validate().unwrap_err();
        assert!(matches!(err, ValidationError::ReservedKey { .. }), "{key}");
        assert!(err.is_schema_violation());
    }
}

#[test]
fn test_empty_experiment_is_invalid() {
    assert_eq!(Experiment::new().validate().unwrap_err(), ValidationError::Empty);
}

#[test]
fn test_colors_and_colormaps() {
    let mut xp = chain(&[("1", None)]);
    xp.parameter("x").colors = Some(
        [("a", "rgb(1, 2, 3)"), ("b", "hsl(10, 50%, 50%)"), ("c", "#ff0000")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    );
    xp.parameter("x").colormap = Some("interpolateViridis".into());
    assert!(xp.validate().is_ok());

    xp.parameter("x")
        .colors
        .as_mut()
        .unwrap()
        .insert("d".into(), "red".into());
    assert!(matches!(
        xp.validate(),
        Err(ValidationError::InvalidColor { .. })
    ));

    let mut xp = chain(&[("1", None)]);
    xp.colormap = "viridis".into();
    assert!(matches!(
        xp.validate(),
        Err(ValidationError::InvalidColormap { .. })
    ));
    xp.colormap = "schemeAccent#inverse".into();
    assert!(xp.validate().is_ok());
}

#[test]
fn test_axes_must_name_columns() {
    let mut xp = chain(&[("1", None)]);
    xp.display_data(Displays::Xy).insert("axis_x".into(), json!("x"));
    xp.display_data(Displays::Xy).insert("axis_y".into(), json!("uid"));
    assert!(xp.validate().is_ok());

    xp.display_data(Displays::Distribution)
        .insert("axis".into(), json!("nope"));
    assert!(matches!(
        xp.validate(),
        Err(ValidationError::DanglingAxis { .. })
    ));
}

#[test]
fn test_merge_keeps_uids_distinct() {
    let a = chain(&[("1", None), ("2", Some("1"))]);
    let b = chain(&[("1", None)]);
    let merged = Experiment::merge([("xp1", a), ("xp2", b)]);
    assert_eq!(merged.len(), 3);
    assert_eq!(merged.datapoints[0].uid, "xp1_1");
    assert_eq!(merged.datapoints[1].from_uid.as_deref(), Some("xp1_1"));
    assert_eq!(merged.datapoints[2].uid, "xp2_1");
    assert_eq!(merged.datapoints[2].values["exp"], Value::from("xp2"));
    assert!(merged.validate().is_ok());
}

#[test]
fn test_wire_shapes() {
    let mut xp = Experiment::from_records(vec![
        record(&[("uid", "a".into()), ("lr", 0.1.into())]),
        record(&[("uid", "b".into()), ("from_uid", "a".into()), ("opt", "sgd".into())]),
    ]);
    xp.parameter("lr").value_type = Some(ValueType::NumericLog);

    let wire = xp.to_wire(false);
    assert_eq!(wire["datapoints"][1]["from_uid"], "a");
    assert_eq!(wire["parameters_definition"]["lr"]["type"], "numericlog");
    assert_eq!(wire["colormap"], "interpolateTurbo");
    assert!(wire["display_data"].is_object());

    let compressed = xp.to_wire(true);
    assert!(compressed.get("datapoints").is_none());
    assert_eq!(compressed["datapoints_compressed"]["columns"], json!(["lr", "opt"]));
    assert_eq!(
        compressed["datapoints_compressed"]["rows"][1],
        json!(["b", "a", null, "sgd"])
    );

    assert_eq!(Experiment::from_wire(&compressed).unwrap(), xp);
    assert_eq!(Experiment::from_wire(&wire).unwrap(), xp);
}

#[test]
fn test_uncompress_restores_datapoints() {
    let xp = chain(&[("1", None), ("2", Some("1"))]);
    let restored = uncompress(&compress(&xp.datapoints));
    assert_eq!(restored, xp.to_wire(false)["datapoints"].as_array().unwrap().clone());
}

#[test]
fn test_csv_roundtrip_after_string_coercion() {
    let xp = Experiment::from_records(vec![
        record(&[("uid", "a".into()), ("lr", 0.5.into()), ("opt", "adam".into())]),
        record(&[("uid", "b".into()), ("from_uid", "a".into()), ("lr", 2.into())]),
    ]);
    let mut buf = Vec::new();
    xp.to_csv(&mut buf).unwrap();
    let back = Experiment::from_csv(buf.as_slice()).unwrap();
    assert_eq!(back, xp);
}
