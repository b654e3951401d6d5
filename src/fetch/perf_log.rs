use std::path::{Path, PathBuf};

use super::{glob_files, FetchOutcome, Fetcher, FetcherChain};
use crate::data::model::{Datapoint, Experiment, Record};
use crate::data::value::Value;
use crate::error::Result;

pub const W2L_PREFIX: &str = "w2l://";
const PERF_PREFIX: &str = "perf_";

/// `w2l://<run directory>`: one datapoint per line of the `NNN_perf` files,
/// each checkpoint descending from the one before it.
///
/// ```text
/// # date      time      lr    loss-train  TER-dev
/// 2019-09-30  10:22:03  0.1   1.523       42.1
/// ```
pub struct Wav2LetterFetcher;

impl Fetcher for Wav2LetterFetcher {
    fn name(&self) -> &str {
        "w2l"
    }

    fn fetch(&self, uri: &str, _chain: &FetcherChain) -> Result<FetchOutcome> {
        let Some(dir) = uri.strip_prefix(W2L_PREFIX) else {
            return Ok(FetchOutcome::not_applicable("not a w2l:// URI"));
        };
        let run: String = {
            let chars: Vec<char> = dir.chars().collect();
            chars[chars.len().saturating_sub(5)..].iter().collect()
        };

        let mut xp = Experiment::new();
        let mut previous: Option<String> = None;
        for file in perf_files(Path::new(dir))? {
            log::debug!("w2l: reading {}", file.display());
            for values in parse_perf(&std::fs::read_to_string(&file)?) {
                let uid = format!("{run}_{}", xp.len());
                xp.datapoints.push(Datapoint {
                    uid: uid.clone(),
                    from_uid: previous.replace(uid),
                    values,
                });
            }
        }
        Ok(FetchOutcome::Applicable(xp))
    }
}

/// `dir/*_perf`, ordered by their leading number (`2_perf` before `10_perf`).
pub fn perf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !std::fs::metadata(dir)?.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a run directory", dir.display()),
        )
        .into());
    }
    let mut files = glob_files(dir, "*_perf")?;
    files.sort_by_cached_key(|p| {
        let name = p
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let digits: String = name.chars().take_while(char::is_ascii_digit).collect();
        (digits.parse::<u64>().ok(), name)
    });
    Ok(files)
}

/// Rows of one perf file. The header names the columns after a leading
/// comment token; cells are floats when they parse as one.
pub fn parse_perf(text: &str) -> Vec<Record> {
    let mut lines = text.lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let names: Vec<&str> = header.split_whitespace().skip(1).collect();
    lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            names
                .iter()
                .zip(line.split_whitespace())
                .map(|(name, cell)| (format!("{PERF_PREFIX}{name}"), Value::float_or_string(cell)))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_perf() {
        let rows = parse_perf("# date lr loss\n2019-09-30 0.1 1.5\n\n2019-10-01 0.05 nan-ish\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["perf_date"], Value::from("2019-09-30"));
        assert_eq!(rows[0]["perf_lr"], Value::Float(0.1));
        assert_eq!(rows[1]["perf_loss"], Value::from("nan-ish"));
        assert!(parse_perf("").is_empty());
    }

    #[test]
    fn test_perf_files_sort_numerically() {
        let dir = TempDir::new().unwrap();
        for name in ["10_perf", "2_perf", "001_perf", "notes.txt"] {
            std::fs::write(dir.path().join(name), "# a\n").unwrap();
        }
        let names: Vec<String> = perf_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["001_perf", "2_perf", "10_perf"]);
    }

    #[test]
    fn test_perf_files_in_bracketed_run_directory() {
        let dir = TempDir::new().unwrap();
        let run = dir.path().join("w2l[a]?");
        std::fs::create_dir(&run).unwrap();
        std::fs::write(run.join("3_perf"), "# a\n").unwrap();
        std::fs::write(run.join("1_perf"), "# a\n").unwrap();
        std::fs::create_dir(run.join("2_perf")).unwrap();
        std::fs::write(dir.path().join("0_perf"), "# a\n").unwrap();
        assert_eq!(perf_files(&run).unwrap(), [run.join("1_perf"), run.join("3_perf")]);

        let file = run.join("1_perf");
        assert!(matches!(perf_files(&file), Err(crate::Error::Io(_))));
    }

    #[test]
    fn test_fetcher_chains_checkpoints() {
        let dir = TempDir::new().unwrap();
        let run = dir.path().join("run_abcde");
        std::fs::create_dir(&run).unwrap();
        std::fs::write(run.join("001_perf"), "# date lr\nd1 0.1\nd2 0.2\n").unwrap();
        std::fs::write(run.join("002_perf"), "# date lr\nd3 0.3\n").unwrap();

        let chain = FetcherChain::empty().build();
        let uri = format!("{W2L_PREFIX}{}", run.display());
        let xp = Wav2LetterFetcher
            .fetch(&uri, &chain)
            .unwrap()
            .into_experiment()
            .unwrap();
        let uids: Vec<_> = xp.datapoints.iter().map(|dp| dp.uid.as_str()).collect();
        assert_eq!(uids, ["abcde_0", "abcde_1", "abcde_2"]);
        assert_eq!(xp.datapoints[0].from_uid, None);
        assert_eq!(xp.datapoints[2].from_uid.as_deref(), Some("abcde_1"));
        assert_eq!(xp.datapoints[2].values["perf_lr"], Value::Float(0.3));
        assert!(xp.validate().is_ok());
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let chain = FetcherChain::empty().build();
        assert!(Wav2LetterFetcher.fetch("w2l:///no/such/run", &chain).is_err());
        assert!(!Wav2LetterFetcher.fetch("demo", &chain).unwrap().is_applicable());
    }
}
