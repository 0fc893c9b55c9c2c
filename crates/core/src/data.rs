//! Evaluation history shared by the driver and the generators.
//!
//! A [Data] is an ordered list of [Record]s, each one holding the named values
//! of an evaluated point (inputs, constants and outputs) together with the
//! evaluation runtime and an optional error message.
use crate::errors::{Result, XoptError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Named values of a point, sorted by name
pub type Point = BTreeMap<String, f64>;

/// Column holding the evaluation runtime in seconds
pub const RUNTIME_COLUMN: &str = "xopt_runtime";
/// Column flagging a failed evaluation
pub const ERROR_COLUMN: &str = "xopt_error";
/// Column holding the error message of a failed evaluation
pub const ERROR_STR_COLUMN: &str = "xopt_error_str";

/// A single evaluated point
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Inputs and outputs values
    #[serde(deserialize_with = "values_or_nan")]
    pub values: Point,
    /// Evaluation time in seconds
    #[serde(default)]
    pub runtime: f64,
    /// Error message when the evaluation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Non finite values are written `null` in json, read them back as NaN
fn values_or_nan<'de, D>(deserializer: D) -> std::result::Result<Point, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: BTreeMap<String, Option<f64>> = Deserialize::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or(f64::NAN)))
        .collect())
}

impl Record {
    /// Record of a successful evaluation
    pub fn new(values: Point) -> Self {
        Record {
            values,
            runtime: 0.,
            error: None,
        }
    }

    /// Record of a failed evaluation
    pub fn failed(values: Point, error: impl Into<String>) -> Self {
        Record {
            values,
            runtime: 0.,
            error: Some(error.into()),
        }
    }

    /// Sets the runtime
    pub fn runtime(mut self, runtime: f64) -> Self {
        self.runtime = runtime;
        self
    }

    /// Value of the given column, NaN when absent
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(f64::NAN)
    }

    /// Whether the evaluation failed
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Ordered evaluation history
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Data {
    records: Vec<Record>,
}

impl Data {
    /// Empty history
    pub fn new() -> Self {
        Data::default()
    }

    /// History made of the given records
    pub fn from_records(records: Vec<Record>) -> Self {
        Data { records }
    }

    /// History made of successful evaluations of the given points
    pub fn from_points(points: Vec<Point>) -> Self {
        points.into_iter().map(Record::new).collect()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there is no record
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends a record
    pub fn push(&mut self, record: Record) {
        self.records.push(record)
    }

    /// Appends all records of `other`
    pub fn extend(&mut self, other: &Data) {
        self.records.extend(other.records.iter().cloned())
    }

    /// Record at index `i`
    pub fn get(&self, i: usize) -> Option<&Record> {
        self.records.get(i)
    }

    /// Last record
    pub fn last(&self) -> Option<&Record> {
        self.records.last()
    }

    /// All records
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Iterator over records
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Sorted union of the value names of all records
    pub fn columns(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.records.iter().flat_map(|r| r.values.keys()).collect();
        names.into_iter().cloned().collect()
    }

    /// Values of the given column, NaN where absent
    pub fn column(&self, name: &str) -> Vec<f64> {
        self.records.iter().map(|r| r.get(name)).collect()
    }

    /// A (n, names.len()) matrix of the given columns
    pub fn to_array(&self, names: &[String]) -> Array2<f64> {
        Array2::from_shape_fn((self.len(), names.len()), |(i, j)| {
            self.records[i].get(&names[j])
        })
    }

    /// Records of successful evaluations only
    pub fn valid(&self) -> Data {
        self.records
            .iter()
            .filter(|r| !r.is_error())
            .cloned()
            .collect()
    }

    /// The `n` last records
    pub fn tail(&self, n: usize) -> Data {
        let start = self.len().saturating_sub(n);
        Data::from_records(self.records[start..].to_vec())
    }

    /// Removes records at given indices
    pub fn remove(&mut self, indices: &[usize]) -> Result<()> {
        if let Some(i) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(XoptError::InvalidValue(format!(
                "index {} out of range, data has {} records",
                i,
                self.len()
            )));
        }
        let to_remove: BTreeSet<usize> = indices.iter().copied().collect();
        let records = std::mem::take(&mut self.records);
        self.records = records
            .into_iter()
            .enumerate()
            .filter_map(|(i, r)| (!to_remove.contains(&i)).then_some(r))
            .collect();
        Ok(())
    }

    /// Writes records as csv with given value columns followed by
    /// runtime and error columns. Existing file is overwritten.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P, columns: &[String]) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(csv_header(columns))?;
        self.write_rows(&mut writer, columns)?;
        writer.flush()?;
        Ok(())
    }

    /// Appends records to a csv file, the header is written only
    /// when the file does not exist yet.
    pub fn append_csv<P: AsRef<Path>>(&self, path: P, columns: &[String]) -> Result<()> {
        let exists = path.as_ref().exists();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if !exists {
            writer.write_record(csv_header(columns))?;
        }
        self.write_rows(&mut writer, columns)?;
        writer.flush()?;
        Ok(())
    }

    fn write_rows<W: Write>(&self, writer: &mut csv::Writer<W>, columns: &[String]) -> Result<()> {
        for record in &self.records {
            let mut row: Vec<String> = columns
                .iter()
                .map(|c| match record.values.get(c) {
                    Some(v) if !v.is_nan() => v.to_string(),
                    _ => String::new(),
                })
                .collect();
            row.push(record.runtime.to_string());
            row.push(if record.is_error() { "True" } else { "False" }.to_string());
            row.push(record.error.clone().unwrap_or_default());
            writer.write_record(&row)?;
        }
        Ok(())
    }

    /// Reads records from a csv file written by [Data::write_csv]
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Data> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let mut data = Data::new();
        for row in reader.records() {
            let row = row?;
            let mut record = Record::default();
            let mut failed = false;
            for (name, field) in headers.iter().zip(row.iter()) {
                match name {
                    RUNTIME_COLUMN => record.runtime = parse_field(name, field)?.unwrap_or(0.),
                    ERROR_COLUMN => failed = field.eq_ignore_ascii_case("true"),
                    ERROR_STR_COLUMN => {
                        if !field.is_empty() {
                            record.error = Some(field.to_string())
                        }
                    }
                    _ => {
                        if let Some(v) = parse_field(name, field)? {
                            record.values.insert(name.to_string(), v);
                        }
                    }
                }
            }
            if failed && record.error.is_none() {
                record.error = Some("unknown error".to_string());
            }
            data.push(record);
        }
        Ok(data)
    }
}

fn csv_header(columns: &[String]) -> Vec<String> {
    let mut header = columns.to_vec();
    header.extend(
        [RUNTIME_COLUMN, ERROR_COLUMN, ERROR_STR_COLUMN]
            .iter()
            .map(|s| s.to_string()),
    );
    header
}

fn parse_field(name: &str, field: &str) -> Result<Option<f64>> {
    if field.is_empty() {
        return Ok(None);
    }
    field.trim().parse::<f64>().map(Some).map_err(|_| {
        XoptError::InvalidValue(format!("column {name}: cannot parse '{field}' as a number"))
    })
}

impl FromIterator<Record> for Data {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Data {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Data {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Builds a [Point] from (name, value) pairs
pub fn point<S: Into<String>>(values: impl IntoIterator<Item = (S, f64)>) -> Point {
    values.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use serial_test::serial;

    #[test]
    fn test_json_nan_values() {
        let data = Data::from_points(vec![point([("x", 1.0), ("f", f64::NAN)])]);
        let json = serde_json::to_string(&data).unwrap();
        let back: Data = serde_json::from_str(&json).unwrap();
        assert_eq!(back.records()[0].get("x"), 1.0);
        assert!(back.records()[0].get("f").is_nan());
    }

    fn sample_data() -> Data {
        Data::from_records(vec![
            Record::new(point([("x1", 1.0), ("y1", 2.0)])).runtime(0.5),
            Record::failed(point([("x1", 3.0)]), "boom"),
            Record::new(point([("x1", 5.0), ("y1", 6.0), ("c1", -1.0)])),
        ])
    }

    #[test]
    fn test_columns_and_array() {
        let data = sample_data();
        assert_eq!(data.columns(), vec!["c1", "x1", "y1"]);
        let arr = data.to_array(&["x1".to_string(), "y1".to_string()]);
        assert_eq!(arr.nrows(), 3);
        assert_abs_diff_eq!(arr.row(0).to_owned(), array![1.0, 2.0]);
        assert!(arr[[1, 1]].is_nan());
        assert_eq!(data.valid().len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut data = sample_data();
        data.remove(&[0, 2]).unwrap();
        assert_eq!(data.len(), 1);
        assert!(data.records()[0].is_error());
        assert!(data.remove(&[4]).is_err());
    }

    #[test]
    fn test_tail() {
        let data = sample_data();
        let tail = data.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.records()[1].get("x1"), 5.0);
        assert_eq!(data.tail(10).len(), 3);
    }

    #[test]
    #[serial]
    fn test_csv_write_read() {
        let outdir = "target/test_data_csv";
        std::fs::create_dir_all(outdir).unwrap();
        let path = format!("{outdir}/data.csv");
        let data = sample_data();
        let columns = vec!["x1".to_string(), "y1".to_string(), "c1".to_string()];
        data.write_csv(&path, &columns).unwrap();
        let read = Data::read_csv(&path).unwrap();
        assert_eq!(read, data);
    }

    #[test]
    #[serial]
    fn test_csv_append() {
        let outdir = "target/test_data_csv_append";
        std::fs::create_dir_all(outdir).unwrap();
        let path = format!("{outdir}/data.csv");
        let _ = std::fs::remove_file(&path);
        let columns = vec!["x1".to_string(), "y1".to_string()];
        let data = Data::from_points(vec![point([("x1", 1.0), ("y1", 1.0)])]);
        data.append_csv(&path, &columns).unwrap();
        data.append_csv(&path, &columns).unwrap();
        let read = Data::read_csv(&path).unwrap();
        assert_eq!(read.len(), 2);
    }
}
