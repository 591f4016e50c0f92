use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::DataType;
use log::debug;
use ndarray::Array2;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::matfile;
use super::model::Recording;
use crate::error::Error;

/// Extensions the loader understands, lower-case.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["mat", "csv", "parquet", "pq"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Whether `path` has an extension the loader can dispatch on.
pub fn is_supported(path: &Path) -> bool {
    let ext = extension(path);
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Load a recording matrix from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.mat`     – MATLAB Level-5 file, `o.data` struct layout or a bare matrix
/// * `.csv`     – numeric rows, optional header line
/// * `.parquet` – one numeric column per variable
pub fn load_recording(path: &Path) -> Result<Recording, Error> {
    let loaded = match extension(path).as_str() {
        "mat" => load_mat(path),
        "csv" => load_csv(path).map(|data| (data, None)),
        "parquet" | "pq" => load_parquet(path).map(|data| (data, None)),
        other => Err(anyhow::anyhow!(
            "unsupported file extension '.{other}', not a recognized matrix container"
        )),
    };
    let (data, rate) = loaded.map_err(|e| Error::load(path, &e))?;
    if data.is_empty() {
        return Err(Error::Load {
            path: path.to_path_buf(),
            reason: "matrix is empty".to_string(),
        });
    }

    debug!(
        "loaded {}: {} samples x {} variables",
        path.display(),
        data.nrows(),
        data.ncols()
    );
    let recording = Recording::new(path, data);
    Ok(match rate {
        Some(rate) => recording.with_sample_rate(rate),
        None => recording,
    })
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// MAT loader
// ---------------------------------------------------------------------------

fn load_mat(path: &Path) -> Result<(Array2<f64>, Option<f64>)> {
    let bytes = std::fs::read(path).context("reading MAT file")?;
    let vars = matfile::read_mat(&bytes).context("parsing MAT file")?;
    matfile::find_recording(&vars)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: one row per sample, one column per variable.
/// A first row that does not parse as numbers is taken as a header.
fn load_csv(path: &Path) -> Result<Array2<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .context("opening CSV")?;

    let mut values = Vec::new();
    let mut width = None;
    let mut rows = 0usize;

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let parsed: Result<Vec<f64>, _> = record.iter().map(str::parse::<f64>).collect();
        let row = match parsed {
            Ok(row) => row,
            Err(_) if row_no == 0 => {
                debug!("treating first CSV row as a header");
                continue;
            }
            Err(e) => bail!("CSV row {row_no}: {e}"),
        };
        match width {
            None => width = Some(row.len()),
            Some(w) if w != row.len() => {
                bail!("CSV row {row_no}: expected {w} columns, found {}", row.len())
            }
            Some(_) => {}
        }
        values.extend(row);
        rows += 1;
    }

    let cols = width.unwrap_or(0);
    Array2::from_shape_vec((rows, cols), values).context("assembling CSV matrix")
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet table where each numeric column is one variable.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Array2<f64>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let n_cols = builder.schema().fields().len();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); n_cols];

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        for (idx, column) in columns.iter_mut().enumerate() {
            let name = schema.field(idx).name();
            extend_f64(column, batch.column(idx))
                .with_context(|| format!("column '{name}'"))?;
        }
    }

    let rows = columns.first().map_or(0, Vec::len);
    let mut data = Array2::zeros((rows, n_cols));
    for (c, column) in columns.iter().enumerate() {
        for (r, &v) in column.iter().enumerate() {
            data[[r, c]] = v;
        }
    }
    Ok(data)
}

// -- Arrow helpers --

/// Append a numeric Arrow column to `out`, nulls as NaN.
fn extend_f64(out: &mut Vec<f64>, col: &Arc<dyn Array>) -> Result<()> {
    let any = col.as_any();
    match col.data_type() {
        DataType::Float64 => {
            let arr = any.downcast_ref::<Float64Array>().context("expected Float64Array")?;
            out.extend(arr.iter().map(|v| v.unwrap_or(f64::NAN)));
        }
        DataType::Float32 => {
            let arr = any.downcast_ref::<Float32Array>().context("expected Float32Array")?;
            out.extend(arr.iter().map(|v| v.map_or(f64::NAN, f64::from)));
        }
        DataType::Int64 => {
            let arr = any.downcast_ref::<Int64Array>().context("expected Int64Array")?;
            out.extend(arr.iter().map(|v| v.map_or(f64::NAN, |i| i as f64)));
        }
        DataType::Int32 => {
            let arr = any.downcast_ref::<Int32Array>().context("expected Int32Array")?;
            out.extend(arr.iter().map(|v| v.map_or(f64::NAN, f64::from)));
        }
        other => bail!("expected a numeric column, got {other:?}"),
    }
    Ok(())
}
