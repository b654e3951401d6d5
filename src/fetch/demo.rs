use std::f64::consts::PI;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::seq::IndexedRandom;
use rand::Rng;
use serde_json::{json, Map, Value as JsonValue};
use uuid::Uuid;

use super::{FetchOutcome, Fetcher, FetcherChain};
use crate::data::model::{Datapoint, Displays, Experiment, Record, ValueType};
use crate::data::value::Value;
use crate::error::Result;

type DemoFn = fn() -> Experiment;

/// Synthetic experiments, addressed by their exact name.
pub const DEMOS: &[(&str, DemoFn)] = &[
    ("demo", demo_default),
    ("demo_big", demo_big),
    ("demo_change_column_properties", demo_change_column_properties),
    ("demo_basic_usage", demo_basic_usage),
    ("demo_line_xy", demo_line_xy),
    ("demo_bug_uid", demo_bug_uid),
    ("demo_force_scale", demo_force_scale),
    ("demo_distribution_cat", demo_distribution_cat),
    ("demo_distribution_num", demo_distribution_num),
    ("demo_distribution_num_100bins", demo_distribution_num_100bins),
    ("demo_bool", demo_bool),
    ("demo_color_interpolate", demo_color_interpolate),
    ("demo_color_scheme_ylrd", demo_color_scheme_ylrd),
    ("demo_color_scheme_accent", demo_color_scheme_accent),
    ("demo_axis_style", demo_axis_style),
    ("demo_categorical", demo_categorical),
    ("demo_customize", demo_customize),
    ("demo_long_names", demo_long_names),
    ("demo_force_constant_pplot", demo_force_constant_pplot),
];

pub fn lookup(name: &str) -> Option<DemoFn> {
    DEMOS.iter().find(|(key, _)| *key == name).map(|(_, f)| *f)
}

pub struct DemoFetcher;

impl Fetcher for DemoFetcher {
    fn name(&self) -> &str {
        "demo"
    }

    fn fetch(&self, uri: &str, _chain: &FetcherChain) -> Result<FetchOutcome> {
        Ok(match lookup(uri) {
            Some(make) => FetchOutcome::Applicable(make()),
            None => FetchOutcome::not_applicable("not a demo name"),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record<const N: usize>(pairs: [(&str, Value); N]) -> Record {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn settings(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        _ => Map::new(),
    }
}

fn short_hex() -> String {
    Uuid::new_v4().simple().to_string()[..6].to_string()
}

/// Box-Muller transform for normal distribution
fn gauss<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    let u1 = rng.random::<f64>().max(1e-15);
    let u2 = rng.random::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    mean + std_dev * z
}

fn pick<R: Rng>(rng: &mut R, options: &[&str]) -> Value {
    Value::from(*options.choose(rng).unwrap_or(&""))
}

// ---------------------------------------------------------------------------
// Population-based-training style demo
// ---------------------------------------------------------------------------

struct Member {
    uid: String,
    params: Record,
    last_checkpoint: Option<String>,
}

fn fake_params<R: Rng>(rng: &mut R) -> Record {
    let r: f64 = rng.random();
    let mut p = record([
        ("lr", 10f64.powf(rng.random_range(-5.0f64..0.0)).into()),
        ("seed", rng.random_range(0.0f64..10.0).into()),
        ("name", short_hex().into()),
        ("optimizer", pick(rng, &["sgd", "adam", "adamw"])),
        ("r", r.into()),
        ("c", pick(rng, &["red", "green", "black"])),
    ]);
    if r < 0.1 {
        p.remove("optimizer");
    }
    let option = rng.random_range(1.0f64..5.0);
    if r > 0.3 {
        p.insert("optionA".into(), option.into());
    } else {
        p.insert("optionB".into(), option.into());
    }

    let pctile = if r < 0.2 {
        -1.0
    } else if r < 0.5 {
        rng.random_range(-1.0f64..10.0)
    } else if r < 0.8 {
        10f64.powf(rng.random_range(1.0f64..2.0))
    } else {
        rng.random_range(100.0f64..101.0)
    };
    p.insert("pctile".into(), pctile.into());

    let special = if rng.random::<f64>() > 0.3 {
        rng.random_range(1.0f64..5.0)
    } else {
        *[f64::INFINITY, f64::NEG_INFINITY, f64::NAN]
            .choose(rng)
            .unwrap_or(&f64::NAN)
    };
    p.insert("special_values".into(), special.into());
    p
}

fn fake_metrics<R: Rng>(rng: &mut R, step: usize, now: i64) -> Record {
    record([
        ("exp_metric", 10f64.powf(rng.random_range(-5.0f64..0.0)).into()),
        ("pct_success", rng.random_range(10.0f64..90.0).into()),
        ("chkpt", short_hex().into()),
        ("time", (step as f64 + rng.random_range(-0.2f64..0.2)).into()),
        ("force_numericlog", rng.random_range(1.0f64..100.0).into()),
        ("timestamp", (now + step as i64 * 2000).into()),
    ])
}

/// `n` generations of a population of 10 members. Checkpoints are chained
/// through `from_uid`; members die off randomly and respawn from a recent
/// checkpoint.
pub fn demo(n: usize) -> Experiment {
    let mut rng = rand::rng();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();

    let mut xp = Experiment::new();
    xp.display_data(Displays::Xy)
        .extend(settings(json!({"axis_x": "time", "axis_y": "exp_metric"})));

    let mut population: Vec<Member> = (0..10)
        .map(|i| Member {
            uid: format!("init{i}"),
            params: fake_params(&mut rng),
            last_checkpoint: None,
        })
        .collect();
    let mut respawned = 0;
    for step in 0..n {
        for member in &mut population {
            let checkpoint = format!("{}_{step}", member.uid);
            let mut values = member.params.clone();
            values.extend(fake_metrics(&mut rng, step, now));
            xp.datapoints.push(Datapoint {
                uid: checkpoint.clone(),
                from_uid: member.last_checkpoint.take(),
                values,
            });
            member.last_checkpoint = Some(checkpoint);
        }

        population.retain(|_| rng.random::<f64>() > 0.3);

        while population.len() < 10 {
            respawned += 1;
            let recent = &xp.datapoints[xp.datapoints.len().saturating_sub(10)..];
            let parent = recent.choose(&mut rng).map(|dp| dp.uid.clone());
            population.push(Member {
                uid: format!("continue{respawned}"),
                params: fake_params(&mut rng),
                last_checkpoint: parent,
            });
        }
    }

    xp.parameter("c").colors = Some(
        [
            ("red", "rgb(255, 0, 0)"),
            ("green", "rgb(0, 255, 0)"),
            ("black", "rgb(0, 0, 0)"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    );
    xp.parameter("force_numericlog").value_type = Some(ValueType::NumericLog);
    xp.parameter("pctile").value_type = Some(ValueType::NumericPercentile);
    xp.parameter("timestamp").value_type = Some(ValueType::Timestamp);
    xp
}

fn demo_default() -> Experiment {
    demo(100)
}

fn demo_big() -> Experiment {
    demo(1000)
}

// ---------------------------------------------------------------------------
// Small demos
// ---------------------------------------------------------------------------

fn demo_change_column_properties() -> Experiment {
    let mut xp = Experiment::from_records([
        record([
            ("param", 1.into()),
            ("loss", 10.into()),
            ("hidden_field", "value1".into()),
            ("c", "red".into()),
        ]),
        record([
            ("param", 2.into()),
            ("loss", 5.into()),
            ("hidden_field", "value2".into()),
            ("c", "black".into()),
        ]),
    ]);
    xp.parameter("c").colors = Some(
        [("red", "rgb(255, 0, 0)"), ("black", "rgb(0, 0, 0)")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    );
    xp.parameter("loss").value_type = Some(ValueType::NumericLog);
    xp.display_data(Displays::ParallelPlot)
        .extend(settings(json!({"hide": ["hidden_field"], "order": ["c"]})));
    xp
}

fn demo_basic_usage() -> Experiment {
    Experiment::from_records([
        record([
            ("dropout", 0.1.into()),
            ("lr", 0.001.into()),
            ("loss", 10.0.into()),
            ("optimizer", "SGD".into()),
        ]),
        record([
            ("dropout", 0.15.into()),
            ("lr", 0.01.into()),
            ("loss", 3.5.into()),
            ("optimizer", "Adam".into()),
        ]),
        record([
            ("dropout", 0.3.into()),
            ("lr", 0.1.into()),
            ("loss", 4.5.into()),
            ("optimizer", "Adam".into()),
        ]),
    ])
}

fn demo_line_xy() -> Experiment {
    let mut rng = rand::rng();
    let mut xp = Experiment::new();
    xp.display_data(Displays::Xy)
        .extend(settings(json!({"axis_x": "generation", "axis_y": "loss"})));
    for i in 0..200usize {
        let mut param = 10f64.powf(rng.random_range(-1.0f64..1.0));
        let mut loss = rng.random_range(-5.0f64..5.0);
        let mut from_uid = None;
        if i > 10 {
            let recent = &xp.datapoints[xp.datapoints.len() - 10..];
            if let Some(parent) = recent.choose(&mut rng) {
                loss += parent.values.get("loss").and_then(Value::as_f64).unwrap_or(0.0);
                param *= parent.values.get("param").and_then(Value::as_f64).unwrap_or(1.0);
                from_uid = Some(parent.uid.clone());
            }
        }
        xp.datapoints.push(Datapoint {
            uid: i.to_string(),
            from_uid,
            values: record([
                ("generation", i.into()),
                ("param", param.into()),
                ("loss", loss.into()),
            ]),
        });
    }
    xp
}

fn demo_bug_uid() -> Experiment {
    Experiment::from_records([
        record([("a", 1.into()), ("b", 2.into()), ("uid", 50.0.into())]),
        record([("a", 2.into()), ("b", 3.into()), ("uid", 49.33.into())]),
    ])
}

fn demo_force_scale() -> Experiment {
    let mut rng = rand::rng();
    let mut xp = Experiment::new();
    for _ in 0..100 {
        let raw: Vec<f64> = (0..4).map(|_| gauss(&mut rng, 0.0, 1.0).abs()).collect();
        let total: f64 = raw.iter().sum();
        let values = raw
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("value{i}"), Value::Float(v / total)))
            .collect();
        xp.datapoints.push(Datapoint::new(values));
    }
    for i in 0..4 {
        xp.parameter(&format!("value{i}")).force_range(0.0, 1.0);
    }
    xp
}

fn demo_distribution(options: JsonValue) -> Experiment {
    let mut rng = rand::rng();
    let mut xp = Experiment::from_records((0..1000).map(|_| {
        record([
            ("cat", pick(&mut rng, &["a", "b", "c", "d", "e", "f", "g", "h"])),
            ("numeric", rng.random_range(0.0f64..1.0).into()),
        ])
    }));
    xp.display_data(Displays::Distribution)
        .extend(settings(options));
    xp
}

fn demo_distribution_cat() -> Experiment {
    demo_distribution(json!({"axis": "cat"}))
}

fn demo_distribution_num() -> Experiment {
    demo_distribution(json!({"axis": "numeric"}))
}

fn demo_distribution_num_100bins() -> Experiment {
    demo_distribution(json!({"axis": "numeric", "nbins": 100}))
}

fn demo_bool() -> Experiment {
    Experiment::from_records([record([("bool", true.into())]), record([("bool", false.into())])])
}

fn demo_with_metric_colormap(colormap: &str) -> Experiment {
    let mut xp = demo(100);
    xp.parameter("exp_metric").colormap = Some(colormap.to_string());
    xp
}

fn demo_color_interpolate() -> Experiment {
    demo_with_metric_colormap("interpolateSinebow")
}

fn demo_color_scheme_ylrd() -> Experiment {
    demo_with_metric_colormap("schemeYlOrRd")
}

fn demo_color_scheme_accent() -> Experiment {
    demo_with_metric_colormap("schemeAccent")
}

fn demo_axis_style() -> Experiment {
    let mut rng = rand::rng();
    let mut xp = Experiment::from_records((0..100).map(|_| {
        let mut r: Record = (0..6)
            .map(|i| (format!("param{i}"), Value::Float(rng.random_range(0.0f64..1.0))))
            .collect();
        r.insert("loss".into(), rng.random_range(0.0f64..100.0).into());
        r.insert("metric".into(), 10f64.powf(rng.random_range(0.0f64..10.0)).into());
        r
    }));
    for i in 0..6 {
        xp.parameter(&format!("param{i}")).label_css =
            Some("badge badge-pill badge-secondary".into());
    }
    xp.parameter("loss").label_css = Some("badge badge-pill badge-primary".into());
    xp.parameter("metric").label_css = Some("badge badge-pill badge-info".into());
    xp
}

fn demo_categorical() -> Experiment {
    let mut rng = rand::rng();
    let mut xp = Experiment::from_records((0..100).map(|_| {
        record([
            ("cat_num_05", rng.random_range(0..=5i64).into()),
            ("cat_num_15", rng.random_range(0..=10i64).into()),
            ("cat_num_25", rng.random_range(0..=25i64).into()),
            ("cat_str_05", format!("s{}", rng.random_range(0..=5i64)).into()),
            ("cat_str_15", format!("s{}", rng.random_range(0..=15i64)).into()),
            ("cat_str_25", format!("s{}", rng.random_range(0..=25i64)).into()),
        ])
    }));
    for column in ["cat_num_05", "cat_num_15", "cat_num_25"] {
        xp.parameter(column).value_type = Some(ValueType::Categorical);
    }
    xp.color_categories("cat_str_05");
    xp.colorby = Some("cat_num_25".into());
    xp
}

fn demo_customize() -> Experiment {
    let mut xp = demo(100);
    xp.display_data(Displays::ParallelPlot)
        .extend(settings(json!({"hide": ["optionB"], "order": ["time"]})));
    xp.display_data(Displays::Table).extend(settings(json!({
        "hide": ["uid", "from_uid"],
        "order_by": [["pct_success", "desc"]],
    })));
    xp.display_data(Displays::Xy).extend(settings(json!({
        "axis_x": "time",
        "axis_y": "lr",
        "lines_thickness": 1.0,
        "lines_opacity": 0.1,
        "dots_thickness": 2.0,
        "dots_opacity": 0.3,
    })));
    xp
}

fn demo_long_names() -> Experiment {
    let mut rng = rand::rng();
    Experiment::from_records((0..100).map(|_| {
        record([
            ("some very very long name for a field", rng.random_range(0..=5i64).into()),
            ("this one is also very long", rng.random_range(0..=10i64).into()),
            ("another.long.one.but.with.dots", rng.random_range(0..=25i64).into()),
        ])
    }))
}

fn demo_force_constant_pplot() -> Experiment {
    let mut xp = Experiment::from_records([
        record([("uid", 123.into()), ("a", 1.into()), ("b", 3.into())]),
        record([("uid", 345.into()), ("a", 2.into()), ("b", 3.into())]),
    ]);
    xp.parameter("b").force_range(0.0, 100.0);
    xp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_demo_validates() {
        for (name, make) in DEMOS.iter().filter(|(name, _)| *name != "demo_big") {
            let xp = make();
            assert!(xp.validate().is_ok(), "{name}: {:?}", xp.validate().err());
            let _ = xp.to_wire(true);
        }
    }

    #[test]
    fn test_demo_fetcher_matches_exact_names() {
        let chain = FetcherChain::empty().build();
        assert!(DemoFetcher.fetch("demo", &chain).unwrap().is_applicable());
        assert!(!DemoFetcher.fetch("something_else", &chain).unwrap().is_applicable());
        assert!(!DemoFetcher.fetch("demo ", &chain).unwrap().is_applicable());
    }

    #[test]
    fn test_demo_lineage() {
        let xp = demo(20);
        assert!(xp.len() >= 200);
        assert!(xp.datapoints[..10].iter().all(|dp| dp.from_uid.is_none()));
        assert!(xp.datapoints[10..].iter().all(|dp| dp.from_uid.is_some()));
    }

    #[test]
    fn test_bug_uid_demo_stringifies_float_uids() {
        let xp = demo_bug_uid();
        assert_eq!(xp.datapoints[0].uid, "50.0");
        assert_eq!(xp.datapoints[1].uid, "49.33");
    }
}
