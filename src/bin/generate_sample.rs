use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use clap::Parser;
use parquet::arrow::ArrowWriter;
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;

use rusty_hiplot::{Datapoint, Experiment, Record, Value};

/// Write sample experiments in every format the fetchers understand.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Output directory (created if missing)
    #[arg(default_value = "sample_data")]
    dir: PathBuf,

    /// Number of training runs in the sweep
    #[arg(long, default_value_t = 12)]
    runs: usize,

    /// Epochs per run
    #[arg(long, default_value_t = 20)]
    epochs: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// One evaluated epoch of a sweep run.
struct Checkpoint {
    uid: String,
    from_uid: Option<String>,
    run: String,
    epoch: i64,
    lr: f64,
    optimizer: String,
    loss: f64,
    valid_loss: f64,
}

/// Box-Muller transform for normal distribution
fn gauss(rng: &mut SmallRng, mean: f64, std_dev: f64) -> f64 {
    let u1 = rng.random::<f64>().max(1e-15);
    let u2 = rng.random::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

fn generate_sweep(args: &Args, rng: &mut SmallRng) -> Vec<Checkpoint> {
    let optimizers = ["sgd", "adam", "adamw"];
    let mut rows = Vec::with_capacity(args.runs * args.epochs);
    for run in 0..args.runs {
        let lr = 10f64.powf(rng.random_range(-4.0f64..-1.0));
        let optimizer = optimizers.choose(rng).copied().unwrap_or("sgd");
        let floor = rng.random_range(0.5f64..1.5);
        let mut previous = None;
        for epoch in 1..=args.epochs as i64 {
            let decay = (-(epoch as f64) * lr * 50.0).exp();
            let loss = floor + 4.0 * decay + gauss(rng, 0.0, 0.02).abs();
            let uid = format!("run{run}_ep{epoch}");
            rows.push(Checkpoint {
                uid: uid.clone(),
                from_uid: previous.replace(uid),
                run: format!("run{run}"),
                epoch,
                lr,
                optimizer: optimizer.to_string(),
                loss,
                valid_loss: loss + gauss(rng, 0.1, 0.05).abs(),
            });
        }
    }
    rows
}

fn to_experiment(rows: &[Checkpoint]) -> Experiment {
    Experiment::from_datapoints(
        rows.iter()
            .map(|row| {
                let values: Record = [
                    ("run", Value::from(row.run.as_str())),
                    ("epoch", Value::Int(row.epoch)),
                    ("lr", Value::Float(row.lr)),
                    ("optimizer", Value::from(row.optimizer.as_str())),
                    ("loss", Value::Float(row.loss)),
                    ("valid_loss", Value::Float(row.valid_loss)),
                ]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
                let dp = Datapoint::with_uid(row.uid.clone(), values);
                match &row.from_uid {
                    Some(parent) => dp.from_parent(parent.clone()),
                    None => dp,
                }
            })
            .collect(),
    )
}

fn write_json(xp: &Experiment, path: &Path) -> Result<()> {
    let records: Vec<_> = xp
        .datapoints
        .iter()
        .map(|dp| {
            let mut record = serde_json::Map::new();
            record.insert("uid".into(), json!(dp.uid));
            record.insert("from_uid".into(), json!(dp.from_uid));
            for (k, v) in &dp.values {
                record.insert(k.clone(), v.to_json());
            }
            serde_json::Value::Object(record)
        })
        .collect();
    let file = std::fs::File::create(path).context("creating JSON file")?;
    serde_json::to_writer_pretty(file, &records).context("writing JSON")?;
    Ok(())
}

fn sweep_batch(rows: &[Checkpoint]) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("uid", DataType::Utf8, false),
        Field::new("from_uid", DataType::Utf8, true),
        Field::new("run", DataType::Utf8, false),
        Field::new("epoch", DataType::Int64, false),
        Field::new("lr", DataType::Float64, false),
        Field::new("optimizer", DataType::Utf8, false),
        Field::new("loss", DataType::Float64, false),
        Field::new("valid_loss", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.uid.as_str()))),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.from_uid.as_deref()).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.run.as_str()))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.epoch))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.lr))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.optimizer.as_str()))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.loss))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.valid_loss))),
        ],
    )
    .context("building record batch")?;
    Ok(batch)
}

fn write_parquet(batch: &RecordBatch, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).context("creating Parquet file")?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating Parquet writer")?;
    writer.write(batch).context("writing batch")?;
    writer.close().context("closing Parquet writer")?;
    Ok(())
}

/// Training log of the first run, in the pipe-separated epoch format.
fn train_log(rows: &[Checkpoint]) -> String {
    let mut log = String::new();
    let Some(first) = rows.first() else {
        return log;
    };
    let _ = writeln!(
        log,
        "Namespace(arch='transformer', lr=[{}], optimizer='{}', max_epoch={}, seed=1, fp16=True)",
        first.lr,
        first.optimizer,
        rows.iter().filter(|r| r.run == first.run).count()
    );
    for row in rows.iter().filter(|r| r.run == first.run) {
        let _ = writeln!(
            log,
            "| epoch {:03} | loss {:.3} | ppl {:.2} | lr {}",
            row.epoch,
            row.loss,
            row.loss.exp2(),
            row.lr
        );
        let _ = writeln!(
            log,
            "| epoch {:03} | valid on 'valid' subset | loss {:.3} | ppl {:.2}",
            row.epoch,
            row.valid_loss,
            row.valid_loss.exp2()
        );
    }
    log
}

/// Perf files of the last run, split in chunks of 5 epochs.
fn write_perf_logs(rows: &[Checkpoint], dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).context("creating perf directory")?;
    let run = rows.last().map(|r| r.run.as_str()).unwrap_or_default();
    let checkpoints: Vec<&Checkpoint> = rows.iter().filter(|r| r.run == run).collect();
    for (i, chunk) in checkpoints.chunks(5).enumerate() {
        let mut text = String::from("# date epoch lr loss-train loss-dev\n");
        for row in chunk {
            let _ = writeln!(
                text,
                "2019-09-{:02} {} {} {:.4} {:.4}",
                (row.epoch % 28) + 1,
                row.epoch,
                row.lr,
                row.loss,
                row.valid_loss
            );
        }
        let path = dir.join(format!("{:03}_perf", i + 1));
        std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SmallRng::seed_from_u64(args.seed);

    std::fs::create_dir_all(&args.dir)
        .with_context(|| format!("creating {}", args.dir.display()))?;

    let rows = generate_sweep(&args, &mut rng);
    let xp = to_experiment(&rows);
    xp.validate().context("generated sweep is not a valid experiment")?;

    xp.to_csv_path(&args.dir.join("sweep.csv"))
        .context("writing CSV")?;
    write_json(&xp, &args.dir.join("sweep.json"))?;

    let batch = sweep_batch(&rows)?;
    write_parquet(&batch, &args.dir.join("sweep.parquet"))?;

    let fairseq_dir = args.dir.join("fairseq");
    std::fs::create_dir_all(&fairseq_dir).context("creating fairseq directory")?;
    std::fs::write(fairseq_dir.join("train.log"), train_log(&rows))
        .context("writing training log")?;

    write_perf_logs(&rows, &args.dir.join("w2l_run01"))?;

    let preview = batch.slice(0, batch.num_rows().min(5));
    println!("{}", pretty_format_batches(&[preview]).context("formatting preview")?);
    println!(
        "Wrote {} checkpoints ({} runs x {} epochs) to {}",
        rows.len(),
        args.runs,
        args.epochs,
        args.dir.display()
    );
    println!("Try: rusty-hiplot {}", args.dir.join("sweep.parquet").display());
    Ok(())
}
