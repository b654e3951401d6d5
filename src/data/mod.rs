/// Data layer: record model, validation and serialization.
///
/// Architecture:
/// ```text
///  records / CSV / wire JSON
///        │
///        ▼
///   ┌────────────┐
///   │   model     │  Experiment: Vec<Datapoint>, ValueDef per column,
///   └────────────┘  display settings, merge
///        │
///        ▼
///   ┌────────────┐
///   │  validate   │  lineage graph + metadata checks, fail fast
///   └────────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ wire / csv  │  JSON for the renderer (optionally compressed), CSV
///   └────────────┘
/// ```

pub mod csv_io;
pub mod model;
pub mod validate;
pub mod value;
pub mod wire;
