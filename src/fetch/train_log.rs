use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value as JsonValue;

use super::{glob_files, FetchOutcome, Fetcher, FetcherChain};
use crate::data::model::{Datapoint, Experiment, Record};
use crate::data::value::Value;
use crate::error::Result;

pub const FAIRSEQ_PREFIX: &str = "fairseq://";

static VALID_SUBSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^valid on '([A-Za-z0-9_]*)' subset$").expect("static subset pattern")
});

/// `fairseq://<file or run directory>`: one datapoint per training epoch.
///
/// Understands the hyper-parameter preamble `Namespace(lr=[0.25], ...)`, the
/// pipe-separated epoch summaries
///
/// ```text
/// | epoch 002 | loss 8.413 | nll_loss 8.1 | ppl 275.4
/// | epoch 002 | valid on 'valid' subset | loss 7.599 | nll_loss 7.599
/// ```
///
/// and JSON summaries such as `... | INFO | valid | {"epoch": 2, "valid_loss": "7.6"}`.
pub struct FairseqFetcher;

impl Fetcher for FairseqFetcher {
    fn name(&self) -> &str {
        "fairseq"
    }

    fn fetch(&self, uri: &str, _chain: &FetcherChain) -> Result<FetchOutcome> {
        let Some(path) = uri.strip_prefix(FAIRSEQ_PREFIX) else {
            return Ok(FetchOutcome::not_applicable("not a fairseq:// URI"));
        };
        let Some(log_file) = find_log_file(Path::new(path))? else {
            return Ok(FetchOutcome::not_applicable(format!("No log file found in {path}")));
        };
        log::debug!("fairseq: reading {}", log_file.display());
        let text = std::fs::read_to_string(&log_file)?;
        Ok(FetchOutcome::Applicable(parse_train_log(&text)))
    }
}

// ---------------------------------------------------------------------------
// Log discovery
// ---------------------------------------------------------------------------

/// The log of a run: `path` itself when it is a file, else the first of
/// `train.log`, `process.out`, `process_0.out`, `*.log`, `slurm_logs/*.log`.
/// Fails when `path` does not exist.
pub fn find_log_file(path: &Path) -> Result<Option<PathBuf>> {
    if std::fs::metadata(path)?.is_file() {
        return Ok(Some(path.to_path_buf()));
    }
    let fixed = ["train.log", "process.out", "process_0.out"]
        .iter()
        .map(|name| path.join(name));
    let found = fixed
        .chain(glob_files(path, "*.log")?)
        .chain(glob_files(&path.join("slurm_logs"), "*.log")?)
        .find(|candidate| candidate.is_file());
    Ok(found)
}

// ---------------------------------------------------------------------------
// Log grammar
// ---------------------------------------------------------------------------

/// Build the experiment of one training log. Lines of the same epoch merge
/// into one datapoint; each epoch descends from the previous one.
pub fn parse_train_log(text: &str) -> Experiment {
    let mut params = Record::new();
    let mut epochs: BTreeMap<i64, Record> = BTreeMap::new();

    for line in text.lines() {
        if line.starts_with("Namespace(") {
            params = parse_namespace(line);
            continue;
        }
        let parsed = if line.starts_with("| epoch") {
            parse_epoch_line(line)
        } else if line.contains('{') {
            parse_json_line(line)
        } else {
            None
        };
        let Some((epoch, values)) = parsed else {
            continue;
        };
        epochs
            .entry(epoch)
            .or_insert_with(|| {
                let mut record = params.clone();
                record.insert("epoch".into(), Value::Int(epoch));
                record
            })
            .extend(values);
    }

    let mut xp = Experiment::new();
    let mut previous: Option<String> = None;
    for (epoch, values) in epochs {
        let uid = epoch.to_string();
        xp.datapoints.push(Datapoint {
            uid: uid.clone(),
            from_uid: previous.replace(uid),
            values,
        });
    }
    xp
}

/// `| epoch 002 | key value | valid on 'test' subset | key value ...`
fn parse_epoch_line(line: &str) -> Option<(i64, Vec<(String, Value)>)> {
    let rest = line.strip_prefix("| epoch")?.trim_start();
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let epoch: i64 = rest[..digits].parse().ok()?;

    let mut prefix = String::new();
    let mut values = Vec::new();
    for part in rest.split('|').skip(1) {
        let part = part.trim();
        if let Some(caps) = VALID_SUBSET_RE.captures(part) {
            prefix = format!("{}_", &caps[1]);
            continue;
        }
        let Some((key, value)) = part.rsplit_once(' ') else {
            continue;
        };
        values.push((
            format!("{prefix}{}", key.trim()),
            Value::float_or_string(value.trim()),
        ));
    }
    Some((epoch, values))
}

/// A JSON object with an `epoch` key embedded in a log line.
fn parse_json_line(line: &str) -> Option<(i64, Vec<(String, Value)>)> {
    let start = line.find('{')?;
    let object: serde_json::Map<String, JsonValue> = match serde_json::from_str(line[start..].trim())
    {
        Ok(object) => object,
        Err(e) => {
            if line.contains("\"epoch\"") {
                log::warn!("fairseq: skipping unparsable JSON line: {e}");
            }
            return None;
        }
    };
    let epoch = match object.get("epoch")? {
        JsonValue::Number(n) => n.as_i64()?,
        JsonValue::String(s) => s.parse().ok()?,
        _ => return None,
    };
    let values = object
        .iter()
        .filter(|(key, _)| key.as_str() != "epoch")
        .map(|(key, value)| {
            let value = match value {
                JsonValue::String(s) => Value::float_or_string(s),
                other => Value::from(other),
            };
            (key.clone(), value)
        })
        .collect();
    Some((epoch, values))
}

// ---------------------------------------------------------------------------
// Namespace(...) preamble
// ---------------------------------------------------------------------------

/// Keyword arguments of a `Namespace(k=v, ...)` line. Scalars are typed,
/// bracketed literals are kept as their source text and `None` is dropped.
pub fn parse_namespace(line: &str) -> Record {
    let body = line
        .trim()
        .strip_prefix("Namespace(")
        .map(|s| s.strip_suffix(')').unwrap_or(s))
        .unwrap_or_default();

    let mut scanner = Scanner { src: body, pos: 0 };
    let mut params = Record::new();
    loop {
        scanner.skip(|c| c.is_whitespace() || c == ',');
        let Some(key) = scanner.keyword() else {
            break;
        };
        let raw = scanner.literal();
        match literal_value(raw) {
            Some(value) => {
                params.insert(key.to_string(), value);
            }
            None => log::debug!("fairseq: {key}=None ignored"),
        }
    }
    params
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek().filter(|c| pred(*c)) {
            self.pos += c.len_utf8();
        }
    }

    /// `name=`; returns `name`.
    fn keyword(&mut self) -> Option<&'a str> {
        let rest = &self.src[self.pos..];
        let eq = rest.find('=')?;
        let key = rest[..eq].trim();
        if key.is_empty() || !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        self.pos += eq + 1;
        Some(key)
    }

    /// Source text of one literal, up to the next top-level comma.
    fn literal(&mut self) -> &'a str {
        let start = self.pos;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut escaped = false;
        while let Some(c) = self.peek() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            } else {
                match c {
                    '\'' | '"' => quote = Some(c),
                    '[' | '(' | '{' => depth += 1,
                    ']' | ')' | '}' => depth = depth.saturating_sub(1),
                    ',' if depth == 0 => break,
                    _ => {}
                }
            }
            self.pos += c.len_utf8();
        }
        self.src[start..self.pos].trim()
    }
}

fn literal_value(raw: &str) -> Option<Value> {
    let value = match raw {
        "None" => return None,
        "True" => Value::Bool(true),
        "False" => Value::Bool(false),
        _ if is_quoted(raw) => Value::String(unescape(&raw[1..raw.len() - 1])),
        _ => {
            if let Ok(i) = raw.parse::<i64>() {
                Value::Int(i)
            } else {
                Value::float_or_string(raw)
            }
        }
    };
    Some(value)
}

fn is_quoted(raw: &str) -> bool {
    raw.len() >= 2
        && ((raw.starts_with('\'') && raw.ends_with('\''))
            || (raw.starts_with('"') && raw.ends_with('"')))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
