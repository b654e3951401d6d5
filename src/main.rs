use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use rusty_hiplot::{data_response, FetcherChain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Renderer wire JSON
    Json,
    /// `uid,from_uid,<columns>` table
    Csv,
}

/// Load an experiment from a URI, validate it and export it.
///
/// URIs: a demo name (`demo`, `demo_line_xy`, ...), a `.csv`, `.json` or
/// `.parquet` file, `fairseq://<run dir>`, `w2l://<run dir>` or
/// `multi://[...]`. Several URIs separated by newlines are merged.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Experiment URI, or `-` to read the URI text from stdin
    uri: String,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Send datapoints as columns + rows
    #[arg(long)]
    compress: bool,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Drop parents that do not exist before validating
    #[arg(long)]
    repair: bool,

    /// Print the `{"query", "experiment" | "error"}` response object
    #[arg(long)]
    response: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let uri = if args.uri == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("reading URI from stdin")?;
        text
    } else {
        args.uri.clone()
    };

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let chain = FetcherChain::default();
    log::debug!("Fetchers: {:?}", chain.names());

    if args.response {
        let response = data_response(&chain, &uri, args.compress);
        serde_json::to_writer(&mut out, &response).context("writing response")?;
        writeln!(out)?;
        return Ok(out.flush()?);
    }

    let mut xp = chain
        .resolve(&uri)
        .with_context(|| format!("loading {}", uri.trim()))?;
    if args.repair {
        xp.remove_missing_parents();
    }
    xp.validate().context("invalid experiment")?;
    log::info!(
        "{} datapoints, {} columns",
        xp.len(),
        xp.columns().len()
    );

    match args.format {
        Format::Json => {
            serde_json::to_writer_pretty(&mut out, &xp.to_wire(args.compress))
                .context("writing JSON")?;
            writeln!(out)?;
        }
        Format::Csv => xp.to_csv(&mut out).context("writing CSV")?,
    }
    out.flush()?;
    Ok(())
}
