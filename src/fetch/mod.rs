/// Fetchers: turn a URI into an [`Experiment`].
///
/// ```text
///  "demo\nmulti://{...}\nruns.csv"
///        │
///        ▼
///   ┌──────────────┐
///   │ split_uris    │  newline-separated, JSON-aware for multi://
///   └──────────────┘
///        │  one URI at a time
///        ▼
///   ┌──────────────┐
///   │ FetcherChain  │  demo → csv → json → parquet → fairseq → w2l → multi
///   └──────────────┘  first applicable fetcher wins
///        │
///        ▼
///   Experiment::merge  (when several URIs were given)
/// ```

pub mod demo;
pub mod file;
pub mod multi;
pub mod perf_log;
pub mod train_log;

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{json, Value as JsonValue};

use crate::data::model::Experiment;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Fetcher contract
// ---------------------------------------------------------------------------

/// What a fetcher made of a URI. Hard failures are returned as `Err`.
#[derive(Debug)]
pub enum FetchOutcome {
    Applicable(Experiment),
    /// The URI is not for this fetcher; the chain moves on.
    NotApplicable(String),
}

impl FetchOutcome {
    pub fn not_applicable(reason: impl Into<String>) -> Self {
        FetchOutcome::NotApplicable(reason.into())
    }

    pub fn is_applicable(&self) -> bool {
        matches!(self, FetchOutcome::Applicable(_))
    }

    pub fn into_experiment(self) -> Option<Experiment> {
        match self {
            FetchOutcome::Applicable(xp) => Some(xp),
            FetchOutcome::NotApplicable(_) => None,
        }
    }
}

/// Loads experiments for the URIs it recognises.
///
/// `chain` is the chain the fetcher is called from, so composite fetchers can
/// resolve nested URIs.
pub trait Fetcher: Send + Sync {
    fn name(&self) -> &str;

    fn fetch(&self, uri: &str, chain: &FetcherChain) -> Result<FetchOutcome>;
}

/// Plain functions and closures are fetchers too.
impl<F> Fetcher for F
where
    F: Fn(&str) -> Result<FetchOutcome> + Send + Sync,
{
    fn name(&self) -> &str {
        "custom"
    }

    fn fetch(&self, uri: &str, _chain: &FetcherChain) -> Result<FetchOutcome> {
        self(uri)
    }
}

// ---------------------------------------------------------------------------
// FetcherChain
// ---------------------------------------------------------------------------

/// Ordered, immutable list of fetchers.
pub struct FetcherChain {
    fetchers: Vec<Box<dyn Fetcher>>,
}

impl fmt::Debug for FetcherChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.fetchers.iter().map(|fetcher| fetcher.name()))
            .finish()
    }
}

impl Default for FetcherChain {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FetcherChain {
    /// Builder starting from the built-in fetchers.
    pub fn builder() -> FetcherChainBuilder {
        FetcherChainBuilder {
            fetchers: vec![
                Box::new(demo::DemoFetcher),
                Box::new(file::CsvFetcher),
                Box::new(file::JsonFetcher),
                Box::new(file::ParquetFetcher),
                Box::new(train_log::FairseqFetcher),
                Box::new(perf_log::Wav2LetterFetcher),
            ],
        }
    }

    /// Builder without any fetcher.
    pub fn empty() -> FetcherChainBuilder {
        FetcherChainBuilder {
            fetchers: Vec::new(),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.fetchers.iter().map(|f| f.name()).collect()
    }

    /// Load a single URI with the first fetcher that applies.
    pub fn load(&self, uri: &str) -> Result<Experiment> {
        for fetcher in &self.fetchers {
            match fetcher.fetch(uri, self)? {
                FetchOutcome::Applicable(xp) => {
                    log::info!(
                        "Loaded {uri} with {} fetcher: {} datapoints",
                        fetcher.name(),
                        xp.len()
                    );
                    return Ok(xp);
                }
                FetchOutcome::NotApplicable(reason) => {
                    log::debug!("{} fetcher skipped {uri}: {reason}", fetcher.name());
                }
            }
        }
        Err(Error::NoFetcherFound(uri.to_string()))
    }

    /// Load every URI of a newline-separated list, in order.
    pub fn load_many(&self, text: &str) -> Result<Vec<Experiment>> {
        multi::split_uris(text)?
            .into_iter()
            .map(|uri| self.load(uri))
            .collect()
    }

    /// Load a URI list and merge it into one experiment. Several experiments
    /// are merged under the keys `"0"`, `"1"`, ...
    pub fn resolve(&self, text: &str) -> Result<Experiment> {
        let mut experiments = self.load_many(text)?;
        match experiments.len() {
            0 => Err(Error::NoFetcherFound(text.to_string())),
            1 => Ok(experiments.remove(0)),
            _ => Ok(Experiment::merge(
                experiments
                    .into_iter()
                    .enumerate()
                    .map(|(i, xp)| (i.to_string(), xp)),
            )),
        }
    }
}

/// Assembles a [`FetcherChain`]. The composite `multi://` fetcher is always
/// appended last, once.
pub struct FetcherChainBuilder {
    fetchers: Vec<Box<dyn Fetcher>>,
}

impl FetcherChainBuilder {
    pub fn fetcher<F: Fetcher + 'static>(mut self, fetcher: F) -> Self {
        self.fetchers.push(Box::new(fetcher));
        self
    }

    pub fn build(mut self) -> FetcherChain {
        self.fetchers.push(Box::new(multi::MultiFetcher));
        FetcherChain {
            fetchers: self.fetchers,
        }
    }
}

// ---------------------------------------------------------------------------
// Data-fetch contract
// ---------------------------------------------------------------------------

/// Response for a data request about `uri`:
/// `{"query", "experiment"}` on success, `{"query", "error"}` otherwise.
pub fn data_response(chain: &FetcherChain, uri: &str, compress: bool) -> JsonValue {
    let loaded = chain.resolve(uri).and_then(|xp| {
        xp.validate()?;
        Ok(xp)
    });
    match loaded {
        Ok(xp) => json!({
            "query": uri,
            "experiment": xp.to_wire(compress),
        }),
        Err(e) => {
            log::warn!("Failed to load {uri}: {e}");
            json!({
                "query": uri,
                "error": e.to_string(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// File discovery
// ---------------------------------------------------------------------------

/// Files of `dir` matching `pattern`, in path order. The directory part is
/// matched literally, so run names like `sweep[3]` need no escaping.
pub(crate) fn glob_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!(
        "{}/{pattern}",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let mut files = Vec::new();
    for entry in glob::glob(&full)? {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Datapoint, Record};

    fn one_point(uid: &str) -> Experiment {
        Experiment::from_datapoints(vec![Datapoint::with_uid(uid, Record::new())])
    }

    #[test]
    fn test_first_applicable_fetcher_wins() {
        let chain = FetcherChain::empty()
            .fetcher(|uri: &str| -> Result<FetchOutcome> {
                Ok(FetchOutcome::not_applicable(format!("not {uri}")))
            })
            .fetcher(|_: &str| -> Result<FetchOutcome> {
                Ok(FetchOutcome::Applicable(one_point("second")))
            })
            .fetcher(|_: &str| -> Result<FetchOutcome> {
                Ok(FetchOutcome::Applicable(one_point("third")))
            })
            .build();
        let xp = chain.load("anything").unwrap();
        assert_eq!(xp.datapoints[0].uid, "second");
    }

    #[test]
    fn test_no_fetcher_found() {
        let chain = FetcherChain::empty().build();
        match chain.load("nowhere") {
            Err(Error::NoFetcherFound(uri)) => assert_eq!(uri, "nowhere"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_hard_failure_stops_the_chain() {
        let chain = FetcherChain::empty()
            .fetcher(|uri: &str| -> Result<FetchOutcome> {
                Err(Error::format(uri, "broken"))
            })
            .fetcher(|_: &str| -> Result<FetchOutcome> {
                Ok(FetchOutcome::Applicable(one_point("never")))
            })
            .build();
        assert!(matches!(chain.load("x"), Err(Error::Format { .. })));
    }

    #[test]
    fn test_custom_fetchers_come_before_multi() {
        let chain = FetcherChain::builder()
            .fetcher(|_: &str| -> Result<FetchOutcome> { Ok(FetchOutcome::not_applicable("")) })
            .build();
        let names = chain.names();
        assert_eq!(names.first(), Some(&"demo"));
        assert_eq!(names[names.len() - 2], "custom");
        assert_eq!(names.last(), Some(&"multi"));
    }

    #[test]
    fn test_resolve_merges_positionally() {
        let chain = FetcherChain::default();
        let xp = chain.resolve("demo_basic_usage\n\ndemo_bool\n").unwrap();
        assert_eq!(xp.len(), 5);
        assert_eq!(xp.datapoints[0].uid, "0_0");
        assert_eq!(xp.datapoints[3].uid, "1_0");
        assert!(xp.validate().is_ok());
    }

    #[test]
    fn test_data_response() {
        let chain = FetcherChain::default();
        let ok = data_response(&chain, "demo_bool", false);
        assert_eq!(ok["query"], "demo_bool");
        assert_eq!(ok["experiment"]["datapoints"].as_array().map(Vec::len), Some(2));

        let err = data_response(&chain, "nothing-here", false);
        assert_eq!(
            err["error"],
            "No fetcher found for this experiment: nothing-here"
        );
    }
}
