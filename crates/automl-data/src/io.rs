//! CSV I/O boundary for tabular data.
//!
//! Reading uses the `csv` crate (header row, first column = sample key);
//! writing uses a plain buffered-writer formatter rather than `csv`'s
//! writer, matching the reference tool's direct, typed output style —
//! there is no escaping/quoting cleverness needed for the numeric and
//! short-categorical values this crate ever writes.

use crate::error::{EngineError, EngineResult, ResultExt};
use crate::tabular::{Header, TabularData};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Read a CSV file into a [`TabularData`]: first column is the sample key,
/// remaining columns become the header/body. No erase-incomplete policy is
/// applied here — that is [`crate::package::DataPackage`]'s concern.
pub fn read_tabular_data(path: impl AsRef<Path>) -> EngineResult<TabularData> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(format!("reading {}", path.display()))?;

    let headers = reader
        .headers()
        .context(format!("reading header of {}", path.display()))?
        .clone();
    if headers.len() < 2 {
        return Err(EngineError::DataInvalid(format!(
            "{} must have a sample-key column plus at least one value column",
            path.display()
        )));
    }
    let column_names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    let header = Header::new(column_names)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context(format!("reading row of {}", path.display()))?;
        let key = record
            .get(0)
            .ok_or_else(|| EngineError::DataInvalid(format!("{}: row missing sample key", path.display())))?
            .to_string();
        let values: Vec<String> = record.iter().skip(1).map(str::to_string).collect();
        rows.push((key, values));
    }

    TabularData::new(header, rows)
}

/// Write a [`TabularData`] as a CSV with the sample key as the first column.
pub fn write_tabular_data(path: impl AsRef<Path>, data: &TabularData) -> EngineResult<()> {
    let file = std::fs::File::create(&path)?;
    let mut writer = BufWriter::new(file);

    write!(writer, "sampleKey")?;
    for name in data.header().names() {
        write!(writer, ",{name}")?;
    }
    writeln!(writer)?;

    for key in data.sample_keys() {
        let row = data.row(key).expect("sample_keys() always resolves via row()");
        write!(writer, "{key}")?;
        for value in row {
            write!(writer, ",{value}")?;
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("automl-io-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("FDB.csv");

        let header = Header::new(vec!["f1".into(), "f2".into()]).unwrap();
        let data = TabularData::new(
            header,
            vec![
                ("a".into(), vec!["1.0".into(), "2.0".into()]),
                ("b".into(), vec!["3.0".into(), "4.0".into()]),
            ],
        )
        .unwrap();

        write_tabular_data(&path, &data).unwrap();
        let read_back = read_tabular_data(&path).unwrap();

        assert_eq!(read_back.header().names(), data.header().names());
        assert_eq!(read_back.cell("a", "f1"), Some("1.0"));
        assert_eq!(read_back.cell("b", "f2"), Some("4.0"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rejects_header_with_no_value_columns() {
        let dir = std::env::temp_dir().join(format!("automl-io-test-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.csv");
        std::fs::write(&path, "sampleKey\n").unwrap();

        let result = read_tabular_data(&path);
        assert!(result.is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
