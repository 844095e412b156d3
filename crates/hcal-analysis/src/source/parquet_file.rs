//! Parquet input with nanoAOD column names.
//!
//! Per-event scalars are primitive columns; collection fields are `List<primitive>`
//! (or `LargeList`) columns with one list per event.

use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float64Type, SchemaRef, UInt64Type};
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use hcal_root::JaggedCol;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReaderBuilder, RowSelection, RowSelector};

use super::{Columns, EventSource, ReadRequest, assemble};
use crate::error::{Error, Result};
use crate::events::EventBatch;

pub struct ParquetEventSource {
    path: PathBuf,
    schema: SchemaRef,
    n_entries: u64,
}

impl ParquetEventSource {
    pub fn open(path: &Path) -> Result<Self> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        let n_entries = builder.metadata().file_metadata().num_rows().max(0) as u64;
        tracing::debug!(path = %path.display(), entries = n_entries, "opened Parquet file");
        Ok(Self { path: path.to_path_buf(), schema: builder.schema().clone(), n_entries })
    }

    fn missing(&self, column: &str) -> Error {
        Error::MissingColumn { path: self.path.display().to_string(), column: column.to_string() }
    }

    /// Rows `range` of the named columns. Absent names are skipped.
    fn read_rows(&self, range: &Range<u64>, names: &[String]) -> Result<RecordBatch> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&self.path)?)?;
        let roots: Vec<usize> = names.iter().filter_map(|n| self.schema.index_of(n).ok()).collect();
        let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
        let selection = RowSelection::from(vec![
            RowSelector::skip(range.start as usize),
            RowSelector::select((range.end - range.start) as usize),
        ]);
        let reader = builder.with_projection(mask).with_row_selection(selection).build()?;
        let schema = reader.schema();
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(arrow::compute::concat_batches(&schema, &batches)?)
    }
}

/// Cast any numeric or boolean array to `f64`; nulls read as NaN.
fn to_f64(array: &ArrayRef) -> Result<Vec<f64>> {
    let cast = arrow::compute::cast(array, &DataType::Float64)?;
    Ok(cast.as_primitive::<Float64Type>().iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Cast an integer column to `u64`. Nulls and negative values are errors.
fn to_u64(name: &str, array: &ArrayRef) -> Result<Vec<u64>> {
    if !array.data_type().is_integer() {
        return super::integers(name, to_f64(array)?);
    }
    let cast = arrow::compute::cast_with_options(
        array,
        &DataType::UInt64,
        &arrow::compute::CastOptions { safe: false, ..Default::default() },
    )
    .map_err(|e| Error::Validation(format!("column '{name}': {e}")))?;
    cast.as_primitive::<UInt64Type>()
        .iter()
        .map(|v| v.ok_or_else(|| Error::Validation(format!("column '{name}' has a null value"))))
        .collect()
}

fn list_to_jagged(name: &str, array: &ArrayRef) -> Result<JaggedCol> {
    let (offsets, values): (Vec<usize>, ArrayRef) = match array.data_type() {
        DataType::List(_) => {
            let list = array.as_list::<i32>();
            (list.value_offsets().iter().map(|&o| o as usize).collect(), list.values().clone())
        }
        DataType::LargeList(_) => {
            let list = array.as_list::<i64>();
            (list.value_offsets().iter().map(|&o| o as usize).collect(), list.values().clone())
        }
        other => {
            return Err(Error::Validation(format!("column '{name}' is {other}, expected a list")));
        }
    };
    let first = offsets.first().copied().unwrap_or(0);
    let last = offsets.last().copied().unwrap_or(0);
    let flat = to_f64(&values.slice(first, last - first))?;
    Ok(JaggedCol { flat, offsets: offsets.iter().map(|o| o - first).collect() })
}

struct ParquetColumns<'a> {
    src: &'a ParquetEventSource,
    batch: RecordBatch,
}

impl ParquetColumns<'_> {
    fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.batch.column_by_name(name).ok_or_else(|| self.src.missing(name))
    }
}

impl Columns for ParquetColumns<'_> {
    fn has(&self, name: &str) -> bool {
        self.src.schema.index_of(name).is_ok()
    }

    fn scalar(&self, name: &str) -> Result<Vec<f64>> {
        to_f64(self.column(name)?)
    }

    fn scalar_u64(&self, name: &str) -> Result<Vec<u64>> {
        to_u64(name, self.column(name)?)
    }

    fn jagged(&self, name: &str) -> Result<JaggedCol> {
        list_to_jagged(name, self.column(name)?)
    }
}

impl EventSource for ParquetEventSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn n_entries(&self) -> u64 {
        self.n_entries
    }

    fn read(&self, dataset: &str, range: Range<u64>, request: &ReadRequest) -> Result<EventBatch> {
        let names = request.columns(|n| self.schema.index_of(n).is_ok());
        let batch = self.read_rows(&range, &names)?;
        let cols = ParquetColumns { src: self, batch };
        assemble(&cols, dataset, range.start, request)
    }
}
