use std::io::{Read, Write};
use std::path::Path;

use super::model::{Experiment, Record};
use super::value::Value;
use crate::error::Result;

// ---------------------------------------------------------------------------
// CSV export / import
// ---------------------------------------------------------------------------

/// CSV layout: header `uid,from_uid,<sorted value columns>`, one row per
/// datapoint. An empty `from_uid` means "no parent" and an empty cell an
/// absent value.
///
/// Cells are plain text: the reader cannot tell a quoted `""` from an empty
/// cell, so `Value::String("")` and `Value::Null` both read back as absent.
///
/// Column definitions and display settings are not part of the CSV.
impl Experiment {
    pub fn to_csv<W: Write>(&self, writer: W) -> Result<()> {
        let columns = self.columns();
        let mut out = csv::Writer::from_writer(writer);

        let mut header = vec!["uid", "from_uid"];
        header.extend(columns.iter().map(String::as_str));
        out.write_record(&header)?;

        for dp in &self.datapoints {
            let mut row = Vec::with_capacity(columns.len() + 2);
            row.push(dp.uid.clone());
            row.push(dp.from_uid.clone().unwrap_or_default());
            row.extend(
                columns
                    .iter()
                    .map(|c| dp.values.get(c).map(Value::to_string).unwrap_or_default()),
            );
            out.write_record(&row)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn to_csv_path(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.to_csv(file)
    }

    /// Any header-and-rows table. `uid` and `from_uid` columns are optional;
    /// cells are typed by guessing (int, float, bool, else string).
    pub fn from_csv<R: Read>(reader: R) -> Result<Experiment> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut records = Vec::new();
        for result in reader.records() {
            let row = result?;
            let record: Record = headers
                .iter()
                .zip(row.iter())
                .filter_map(|(col, cell)| {
                    if col == "uid" || col == "from_uid" {
                        // Identity columns stay text, "007" must not become 7.
                        return (!cell.is_empty())
                            .then(|| (col.clone(), Value::String(cell.to_string())));
                    }
                    Value::guess(cell).map(|v| (col.clone(), v))
                })
                .collect();
            records.push(record);
        }
        Ok(Experiment::from_records(records))
    }

    pub fn from_csv_path(path: &Path) -> Result<Experiment> {
        let file = std::fs::File::open(path)?;
        Self::from_csv(file)
    }
}
