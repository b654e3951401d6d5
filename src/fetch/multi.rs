use serde_json::Value as JsonValue;

use super::{FetchOutcome, Fetcher, FetcherChain};
use crate::data::model::Experiment;
use crate::error::{Error, Result};

pub const MULTI_PREFIX: &str = "multi://";

// ---------------------------------------------------------------------------
// URI list grammar
// ---------------------------------------------------------------------------

/// Byte length of a `multi://` URI at the start of `text`: the prefix plus
/// one JSON value, whatever follows it.
pub fn uri_length(text: &str) -> Result<usize> {
    let payload = text.strip_prefix(MULTI_PREFIX).ok_or_else(|| {
        Error::format(text, format!("expected a URI starting with {MULTI_PREFIX}"))
    })?;
    let mut stream = serde_json::Deserializer::from_str(payload).into_iter::<JsonValue>();
    match stream.next() {
        Some(Ok(_)) => Ok(MULTI_PREFIX.len() + stream.byte_offset()),
        Some(Err(e)) => Err(e.into()),
        None => Err(Error::format(text, "missing JSON payload")),
    }
}

/// Split a newline-separated URI list. A `multi://` entry spans as many lines
/// as its JSON payload needs; blank entries are skipped.
pub fn split_uris(text: &str) -> Result<Vec<&str>> {
    let mut uris = Vec::new();
    let mut rest = text;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let end = if rest.starts_with(MULTI_PREFIX) {
            uri_length(rest)?
        } else {
            rest.find('\n').unwrap_or(rest.len())
        };
        let uri = rest[..end].trim();
        if !uri.is_empty() {
            uris.push(uri);
        }
        rest = &rest[end..];
    }
    Ok(uris)
}

// ---------------------------------------------------------------------------
// Composite fetcher
// ---------------------------------------------------------------------------

/// `multi://["a.csv", "b.csv"]` or `multi://{"name": "a.csv", ...}`: loads
/// every sub-URI through the calling chain and merges the results. Lists are
/// keyed by position, objects by their names.
pub struct MultiFetcher;

impl Fetcher for MultiFetcher {
    fn name(&self) -> &str {
        "multi"
    }

    fn fetch(&self, uri: &str, chain: &FetcherChain) -> Result<FetchOutcome> {
        let Some(payload) = uri.strip_prefix(MULTI_PREFIX) else {
            return Ok(FetchOutcome::not_applicable("not a multi:// URI"));
        };
        let defs: JsonValue = serde_json::from_str(payload)?;
        let named: Vec<(String, &JsonValue)> = match &defs {
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            JsonValue::Object(items) => items.iter().map(|(k, v)| (k.clone(), v)).collect(),
            _ => {
                return Err(Error::format(
                    uri,
                    "multi:// expects a JSON list or object of URIs",
                ))
            }
        };

        let mut experiments = Vec::with_capacity(named.len());
        for (key, sub) in named {
            let sub_uri = sub.as_str().ok_or_else(|| {
                Error::format(uri, format!("entry {key} is not a string URI"))
            })?;
            log::debug!("multi:// loading {key} = {sub_uri}");
            experiments.push((key, chain.load(sub_uri)?));
        }
        Ok(FetchOutcome::Applicable(Experiment::merge(experiments)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::value::Value;

    #[test]
    fn test_uri_length_stops_after_json() {
        let text = "multi://{\n\"test1\": \"test2\"\n}\nxp2";
        let eof = uri_length(text).unwrap();
        assert_eq!(&text[eof..], "\nxp2");
    }

    #[test]
    fn test_split_uris() {
        let text = "demo\nmulti://{\n\"xp1\": \"demo\",\n\"xp2\": \"demo\"\n}\n\n  demo_bool\n";
        let uris = split_uris(text).unwrap();
        assert_eq!(uris.len(), 3);
        assert_eq!(uris[0], "demo");
        assert!(uris[1].starts_with(MULTI_PREFIX) && uris[1].ends_with('}'));
        assert_eq!(uris[2], "demo_bool");
    }

    #[test]
    fn test_split_uris_rejects_broken_json() {
        assert!(matches!(
            split_uris("multi://{\"a\": \ndemo"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_multi_list_uses_positional_keys() {
        let chain = FetcherChain::default();
        let xp = chain
            .load(r#"multi://["demo_basic_usage", "demo_bool"]"#)
            .unwrap();
        assert_eq!(xp.len(), 5);
        assert_eq!(xp.datapoints[0].uid, "0_0");
        assert_eq!(xp.datapoints[4].values["exp"], Value::from("1"));
    }

    #[test]
    fn test_multi_object_uses_names() {
        let chain = FetcherChain::default();
        let xp = chain
            .load(r#"multi://{"base": "demo_basic_usage", "nested": "multi://[\"demo_bool\"]"}"#)
            .unwrap();
        assert_eq!(xp.datapoints[0].uid, "base_0");
        assert_eq!(xp.datapoints[3].uid, "nested_0_0");
        assert!(xp.validate().is_ok());
    }

    #[test]
    fn test_multi_rejects_scalars() {
        let chain = FetcherChain::default();
        assert!(matches!(chain.load("multi://42"), Err(Error::Format { .. })));
    }
}
