//! Data layer of a high-dimensional experiment explorer.
//!
//! An [`Experiment`] is a set of [`Datapoint`]s (flat key/value records with
//! an optional parent, forming a lineage forest) plus per-column rendering
//! hints and per-display settings. Experiments are loaded from URIs through
//! a [`FetcherChain`], checked with [`Experiment::validate`] and handed to a
//! renderer as JSON via [`Experiment::to_wire`].
//!
//! ```no_run
//! use rusty_hiplot::FetcherChain;
//!
//! let chain = FetcherChain::default();
//! let xp = chain.resolve("demo").unwrap();
//! xp.validate().unwrap();
//! println!("{}", xp.to_wire(true));
//! ```

pub mod color;
pub mod data;
pub mod error;
pub mod fetch;

pub use data::model::{Datapoint, Displays, Experiment, Record, ValueDef, ValueType};
pub use data::value::Value;
pub use error::{Error, Result, ValidationError};
pub use fetch::{data_response, FetchOutcome, Fetcher, FetcherChain};
