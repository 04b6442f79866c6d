use std::{io, path::Path};

use csv::Writer;

use crate::models::results::QueryResult;

/// Writes the header and every row of `result` to `path` as CSV.
pub fn export_csv(result: &QueryResult, path: impl AsRef<Path>) -> Result<(), csv::Error> {
    let writer = Writer::from_path(path)?;
    write_rows(result, writer)
}

pub fn write_csv<W: io::Write>(result: &QueryResult, output: W) -> Result<(), csv::Error> {
    write_rows(result, Writer::from_writer(output))
}

fn write_rows<W: io::Write>(result: &QueryResult, mut writer: Writer<W>) -> Result<(), csv::Error> {
    writer.write_record(&result.columns)?;
    for row in &result.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
