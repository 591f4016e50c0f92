//! MATLAB Level-5 MAT-file reader and writer.
//!
//! Covers what recordings exported from MATLAB actually contain: numeric
//! arrays of every class, structs, cells, char arrays, zlib-compressed
//! elements and the packed "small element" tag form, in either byte order.
//! Sparse and object arrays are read as [`MatValue::Unsupported`].
//! HDF5-based v7.3 files are rejected.

use std::io::{Read, Write};

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use log::debug;
use ndarray::{Array2, ShapeBuilder};

const HEADER_LEN: usize = 128;
const FIELD_NAME_LEN: usize = 32;
/// Structs and cells nested deeper than this are treated as corrupt.
const MAX_NESTING: usize = 32;
/// Smallest encoded child: one empty `miMATRIX` tag.
const MIN_CHILD_LEN: usize = 8;
/// Upper bound on up-front reservation for struct/cell children.
const MAX_RESERVE: usize = 1024;

// Data element types
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;
const MI_UTF8: u32 = 16;
const MI_UTF16: u32 = 17;

// Array classes
const MX_CELL: u8 = 1;
const MX_STRUCT: u8 = 2;
const MX_CHAR: u8 = 4;
const MX_DOUBLE: u8 = 6;
const MX_UINT64: u8 = 15;

const COMPLEX_FLAG: u32 = 0x0800;

// ---------------------------------------------------------------------------
// Value model
// ---------------------------------------------------------------------------

/// A decoded MATLAB array. Numeric data is kept column-major, as stored.
#[derive(Debug, Clone, PartialEq)]
pub enum MatValue {
    /// Real part of any numeric class, widened to `f64`.
    Numeric { dims: Vec<usize>, data: Vec<f64> },
    /// Struct array; `values[elem * fields.len() + field]`.
    Struct {
        dims: Vec<usize>,
        fields: Vec<String>,
        values: Vec<MatValue>,
    },
    Cell { dims: Vec<usize>, items: Vec<MatValue> },
    Char(String),
    /// Zero-length matrix element (an unset struct field).
    Empty,
    /// Class we do not decode (sparse, object, function handle…).
    Unsupported(u8),
}

impl MatValue {
    /// Field of the first struct element.
    pub fn field(&self, name: &str) -> Option<&MatValue> {
        match self {
            MatValue::Struct { fields, values, .. } => {
                let idx = fields.iter().position(|f| f == name)?;
                values.get(idx)
            }
            _ => None,
        }
    }

    /// Interpret a numeric array as a 2-D matrix.
    pub fn as_matrix(&self) -> Option<Array2<f64>> {
        let MatValue::Numeric { dims, data } = self else {
            return None;
        };
        let (rows, cols) = match dims.as_slice() {
            [r, c] => (*r, *c),
            [r, c, rest @ ..] if rest.iter().all(|&d| d == 1) => (*r, *c),
            _ => return None,
        };
        Array2::from_shape_vec((rows, cols).f(), data.clone()).ok()
    }

    /// First element of a numeric array.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MatValue::Numeric { data, .. } => data.first().copied(),
            _ => None,
        }
    }
}

/// A named top-level workspace variable.
#[derive(Debug, Clone, PartialEq)]
pub struct MatVariable {
    pub name: String,
    pub value: MatValue,
}

// ---------------------------------------------------------------------------
// Byte order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Copy `N` bytes and normalise them to little-endian order.
    fn le_bytes<const N: usize>(self, b: &[u8]) -> [u8; N] {
        let mut a = [0u8; N];
        a.copy_from_slice(&b[..N]);
        if self == Endian::Big {
            a.reverse();
        }
        a
    }

    fn u16(self, b: &[u8]) -> u16 {
        u16::from_le_bytes(self.le_bytes(b))
    }

    fn u32(self, b: &[u8]) -> u32 {
        u32::from_le_bytes(self.le_bytes(b))
    }
}

// ---------------------------------------------------------------------------
// Element cursor
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self { buf, pos: 0, endian }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            bail!(
                "truncated element: need {n} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            );
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(self.endian.u32(b))
    }

    /// Read one data element: `(type, payload)`. Skips alignment padding.
    fn element(&mut self) -> Result<(u32, &'a [u8])> {
        let word = self.u32()?;
        if word >> 16 != 0 {
            // Small element: type and size packed in one word, payload in the next four bytes.
            let ty = word & 0xffff;
            let size = (word >> 16) as usize;
            if size > 4 {
                bail!("small element claims {size} bytes");
            }
            let payload = self.take(4)?;
            return Ok((ty, &payload[..size]));
        }
        let ty = word;
        let size = self.u32()? as usize;
        let payload = self.take(size)?;
        if ty != MI_COMPRESSED {
            let pad = (8 - size % 8) % 8;
            self.pos += pad.min(self.remaining());
        }
        Ok((ty, payload))
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Parse every top-level variable in a MAT-file image.
pub fn read_mat(bytes: &[u8]) -> Result<Vec<MatVariable>> {
    if bytes.len() < HEADER_LEN {
        bail!("{} bytes is too short for a MAT-file header", bytes.len());
    }
    let endian = match &bytes[126..128] {
        b"IM" => Endian::Little,
        b"MI" => Endian::Big,
        _ => bail!("missing endian indicator, not a Level-5 MAT-file"),
    };
    let version = endian.u16(&bytes[124..126]);
    if version == 0x0200 {
        bail!("MAT v7.3 (HDF5) files are not supported, re-save with -v7");
    }
    if version != 0x0100 {
        bail!("unknown MAT-file version 0x{version:04x}");
    }

    let mut cursor = Cursor::new(&bytes[HEADER_LEN..], endian);
    let mut vars = Vec::new();
    while cursor.remaining() >= 8 {
        let (ty, payload) = cursor.element().context("reading top-level element")?;
        match ty {
            MI_MATRIX => vars.push(parse_matrix(payload, endian, 0)?),
            MI_COMPRESSED => {
                let inflated = inflate(payload)?;
                let mut inner = Cursor::new(&inflated, endian);
                while inner.remaining() >= 8 {
                    let (ty, payload) = inner.element().context("reading compressed element")?;
                    if ty == MI_MATRIX {
                        vars.push(parse_matrix(payload, endian, 0)?);
                    } else {
                        debug!("skipping compressed element of type {ty}");
                    }
                }
            }
            other => debug!("skipping top-level element of type {other}"),
        }
    }
    Ok(vars)
}

fn inflate(payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(payload)
        .read_to_end(&mut out)
        .context("inflating compressed element")?;
    Ok(out)
}

fn parse_matrix(payload: &[u8], endian: Endian, depth: usize) -> Result<MatVariable> {
    if depth > MAX_NESTING {
        bail!("arrays nested more than {MAX_NESTING} levels deep");
    }
    if payload.is_empty() {
        return Ok(MatVariable {
            name: String::new(),
            value: MatValue::Empty,
        });
    }
    let mut c = Cursor::new(payload, endian);

    let (ty, flags) = c.element().context("reading array flags")?;
    if ty != MI_UINT32 || flags.len() < 8 {
        bail!("malformed array flags (type {ty}, {} bytes)", flags.len());
    }
    let flags_word = endian.u32(flags);
    let class = (flags_word & 0xff) as u8;

    let (ty, raw_dims) = c.element().context("reading dimensions")?;
    let dims: Vec<usize> = decode_numeric(ty, raw_dims, endian)?
        .into_iter()
        .map(|d| d as usize)
        .collect();
    let count = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .with_context(|| format!("dimensions {dims:?} overflow the element count"))?;

    let (_, raw_name) = c.element().context("reading array name")?;
    let name = String::from_utf8_lossy(raw_name)
        .trim_end_matches('\0')
        .to_string();

    let value = match class {
        MX_DOUBLE..=MX_UINT64 => {
            let (ty, real) = c
                .element()
                .with_context(|| format!("reading data of '{name}'"))?;
            let data = decode_numeric(ty, real, endian)?;
            if data.len() != count {
                bail!("'{name}': dimensions say {count} values, found {}", data.len());
            }
            if flags_word & COMPLEX_FLAG != 0 {
                debug!("'{name}' is complex; keeping the real part");
            }
            MatValue::Numeric { dims, data }
        }
        MX_STRUCT => {
            let (ty, raw_len) = c.element().context("reading field name length")?;
            let name_len = decode_numeric(ty, raw_len, endian)?
                .first()
                .copied()
                .unwrap_or(0.0) as usize;
            if name_len == 0 {
                bail!("'{name}': struct field name length is zero");
            }
            let (_, raw_fields) = c.element().context("reading field names")?;
            let fields: Vec<String> = raw_fields
                .chunks(name_len)
                .map(|chunk| {
                    String::from_utf8_lossy(chunk)
                        .trim_end_matches('\0')
                        .to_string()
                })
                .collect();
            let children = count
                .checked_mul(fields.len())
                .filter(|&n| n <= c.remaining() / MIN_CHILD_LEN)
                .with_context(|| {
                    format!(
                        "'{name}': {dims:?} struct with {} fields does not fit in {} bytes",
                        fields.len(),
                        c.remaining()
                    )
                })?;
            let mut values = Vec::with_capacity(children.min(MAX_RESERVE));
            for i in 0..children {
                let field = &fields[i % fields.len()];
                values.push(
                    parse_child(&mut c, endian, depth)
                        .with_context(|| format!("reading field '{name}.{field}'"))?,
                );
            }
            MatValue::Struct {
                dims,
                fields,
                values,
            }
        }
        MX_CELL => {
            if count > c.remaining() / MIN_CHILD_LEN {
                bail!("'{name}': {dims:?} cell does not fit in {} bytes", c.remaining());
            }
            let mut items = Vec::with_capacity(count.min(MAX_RESERVE));
            for i in 0..count {
                items.push(
                    parse_child(&mut c, endian, depth)
                        .with_context(|| format!("reading cell '{name}'{{{i}}}"))?,
                );
            }
            MatValue::Cell { dims, items }
        }
        MX_CHAR => {
            let (ty, raw) = c.element().context("reading char data")?;
            let text = if ty == MI_UTF8 {
                String::from_utf8_lossy(raw).into_owned()
            } else {
                decode_numeric(ty, raw, endian)?
                    .into_iter()
                    .filter_map(|v| char::from_u32(v as u32))
                    .collect()
            };
            MatValue::Char(text)
        }
        other => {
            debug!("'{name}' has unsupported class {other}");
            MatValue::Unsupported(other)
        }
    };

    Ok(MatVariable { name, value })
}

fn parse_child(c: &mut Cursor<'_>, endian: Endian, depth: usize) -> Result<MatValue> {
    let (ty, payload) = c.element()?;
    if ty != MI_MATRIX {
        bail!("expected a matrix element, found type {ty}");
    }
    Ok(parse_matrix(payload, endian, depth + 1)?.value)
}

fn decode_numeric(ty: u32, raw: &[u8], endian: Endian) -> Result<Vec<f64>> {
    let width = match ty {
        MI_INT8 | MI_UINT8 | MI_UTF8 => 1,
        MI_INT16 | MI_UINT16 | MI_UTF16 => 2,
        MI_INT32 | MI_UINT32 | MI_SINGLE => 4,
        MI_DOUBLE | MI_INT64 | MI_UINT64 => 8,
        other => bail!("element type {other} is not numeric"),
    };
    if raw.len() % width != 0 {
        bail!("{} bytes is not a whole number of {width}-byte values", raw.len());
    }
    Ok(raw
        .chunks_exact(width)
        .map(|b| match ty {
            MI_INT8 => b[0] as i8 as f64,
            MI_UINT8 | MI_UTF8 => b[0] as f64,
            MI_INT16 => i16::from_le_bytes(endian.le_bytes(b)) as f64,
            MI_UINT16 | MI_UTF16 => u16::from_le_bytes(endian.le_bytes(b)) as f64,
            MI_INT32 => i32::from_le_bytes(endian.le_bytes(b)) as f64,
            MI_UINT32 => u32::from_le_bytes(endian.le_bytes(b)) as f64,
            MI_SINGLE => f32::from_le_bytes(endian.le_bytes(b)) as f64,
            MI_INT64 => i64::from_le_bytes(endian.le_bytes(b)) as f64,
            MI_UINT64 => u64::from_le_bytes(endian.le_bytes(b)) as f64,
            _ => f64::from_le_bytes(endian.le_bytes(b)),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Locating the recording
// ---------------------------------------------------------------------------

/// Pick the recording matrix out of a MAT workspace.
///
/// Preference: `o.data`, then `data` of any struct, then the first 2-D
/// numeric variable. A numeric `sampFreq` beside `data` is returned too.
pub fn find_recording(vars: &[MatVariable]) -> Result<(Array2<f64>, Option<f64>)> {
    let from_struct = |value: &MatValue| {
        let data = value.field("data")?.as_matrix()?;
        let rate = value.field("sampFreq").and_then(MatValue::as_scalar);
        Some((data, rate))
    };

    if let Some(found) = vars
        .iter()
        .filter(|v| v.name == "o")
        .find_map(|v| from_struct(&v.value))
    {
        return Ok(found);
    }
    if let Some(found) = vars.iter().find_map(|v| from_struct(&v.value)) {
        return Ok(found);
    }
    if let Some(data) = vars.iter().find_map(|v| v.value.as_matrix()) {
        return Ok((data, None));
    }

    let names: Vec<&str> = vars.iter().map(|v| v.name.as_str()).collect();
    bail!("no numeric matrix found (variables: {names:?})")
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Build the `o` struct layout recordings are distributed in.
pub fn recording_struct(data: &Array2<f64>, sample_rate: f64) -> MatVariable {
    let numeric = |dims: Vec<usize>, data: Vec<f64>| MatValue::Numeric { dims, data };
    let column_major: Vec<f64> = data.t().iter().copied().collect();
    MatVariable {
        name: "o".to_string(),
        value: MatValue::Struct {
            dims: vec![1, 1],
            fields: vec!["sampFreq".into(), "nS".into(), "data".into()],
            values: vec![
                numeric(vec![1, 1], vec![sample_rate]),
                numeric(vec![1, 1], vec![data.nrows() as f64]),
                numeric(vec![data.nrows(), data.ncols()], column_major),
            ],
        },
    }
}

/// Write variables as a little-endian Level-5 MAT-file.
pub fn write_mat<W: Write>(mut w: W, vars: &[MatVariable], compress: bool) -> Result<()> {
    let mut header = b"MATLAB 5.0 MAT-file, Platform: rust, Created by: eeg-spectrograms".to_vec();
    header.resize(116, b' ');
    header.extend_from_slice(&[0u8; 8]);
    header.extend_from_slice(&0x0100u16.to_le_bytes());
    header.extend_from_slice(b"IM");
    w.write_all(&header).context("writing MAT header")?;

    for var in vars {
        let element = encode_matrix(&var.name, &var.value)?;
        if compress {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(&element).context("compressing variable")?;
            let packed = enc.finish().context("compressing variable")?;
            w.write_all(&MI_COMPRESSED.to_le_bytes())?;
            w.write_all(&(packed.len() as u32).to_le_bytes())?;
            w.write_all(&packed)?;
        } else {
            w.write_all(&element)?;
        }
    }
    w.flush().context("flushing MAT-file")?;
    Ok(())
}

fn push_element(out: &mut Vec<u8>, ty: u32, payload: &[u8]) {
    out.extend_from_slice(&ty.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    let pad = (8 - payload.len() % 8) % 8;
    out.extend(std::iter::repeat(0u8).take(pad));
}

fn encode_header(body: &mut Vec<u8>, class: u8, dims: &[usize], name: &str) {
    let mut flags = Vec::with_capacity(8);
    flags.extend_from_slice(&(class as u32).to_le_bytes());
    flags.extend_from_slice(&0u32.to_le_bytes());
    push_element(body, MI_UINT32, &flags);

    let raw_dims: Vec<u8> = dims
        .iter()
        .flat_map(|&d| (d as i32).to_le_bytes())
        .collect();
    push_element(body, MI_INT32, &raw_dims);
    push_element(body, MI_INT8, name.as_bytes());
}

fn encode_matrix(name: &str, value: &MatValue) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    match value {
        MatValue::Empty => {}
        MatValue::Numeric { dims, data } => {
            encode_header(&mut body, MX_DOUBLE, dims, name);
            let raw: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
            push_element(&mut body, MI_DOUBLE, &raw);
        }
        MatValue::Struct {
            dims,
            fields,
            values,
        } => {
            encode_header(&mut body, MX_STRUCT, dims, name);
            push_element(&mut body, MI_INT32, &(FIELD_NAME_LEN as i32).to_le_bytes());
            let mut raw_names = Vec::with_capacity(fields.len() * FIELD_NAME_LEN);
            for field in fields {
                if field.len() >= FIELD_NAME_LEN {
                    bail!("field name '{field}' exceeds {} characters", FIELD_NAME_LEN - 1);
                }
                let start = raw_names.len();
                raw_names.extend_from_slice(field.as_bytes());
                raw_names.resize(start + FIELD_NAME_LEN, 0);
            }
            push_element(&mut body, MI_INT8, &raw_names);
            for v in values {
                body.extend(encode_matrix("", v)?);
            }
        }
        MatValue::Cell { dims, items } => {
            encode_header(&mut body, MX_CELL, dims, name);
            for item in items {
                body.extend(encode_matrix("", item)?);
            }
        }
        MatValue::Char(text) => {
            let units: Vec<u16> = text.encode_utf16().collect();
            encode_header(&mut body, MX_CHAR, &[1, units.len()], name);
            let raw: Vec<u8> = units.iter().flat_map(|u| u.to_le_bytes()).collect();
            push_element(&mut body, MI_UINT16, &raw);
        }
        MatValue::Unsupported(class) => bail!("cannot write array class {class}"),
    }
    let mut out = Vec::with_capacity(body.len() + 8);
    push_element(&mut out, MI_MATRIX, &body);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn encode(vars: &[MatVariable], compress: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        write_mat(&mut buf, vars, compress).unwrap();
        buf
    }

    #[test]
    fn reads_recording_struct_from_compressed_file() {
        let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let bytes = encode(&[recording_struct(&data, 128.0)], true);

        let vars = read_mat(&bytes).unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].name, "o");

        let (matrix, rate) = find_recording(&vars).unwrap();
        assert_eq!(matrix, data);
        assert_eq!(rate, Some(128.0));
    }

    #[test]
    fn struct_fields_survive_uncompressed_write() {
        let data = array![[0.5], [1.5]];
        let vars = read_mat(&encode(&[recording_struct(&data, 256.0)], false)).unwrap();
        let o = &vars[0].value;
        assert_eq!(o.field("nS").and_then(MatValue::as_scalar), Some(2.0));
        assert!(o.field("trials").is_none());
    }

    #[test]
    fn prefers_o_struct_over_plain_matrix() {
        let plain = MatVariable {
            name: "a".into(),
            value: MatValue::Numeric {
                dims: vec![1, 2],
                data: vec![9.0, 9.0],
            },
        };
        let data = array![[1.0, 2.0]];
        let bytes = encode(&[plain, recording_struct(&data, 128.0)], false);
        let (matrix, _) = find_recording(&read_mat(&bytes).unwrap()).unwrap();
        assert_eq!(matrix, data);
    }

    #[test]
    fn falls_back_to_first_numeric_matrix() {
        let label = MatVariable {
            name: "tag".into(),
            value: MatValue::Char("subject 1".into()),
        };
        let plain = MatVariable {
            name: "x".into(),
            value: MatValue::Numeric {
                dims: vec![2, 2],
                data: vec![1.0, 3.0, 2.0, 4.0],
            },
        };
        let vars = read_mat(&encode(&[label, plain], true)).unwrap();
        assert_eq!(vars[0].value, MatValue::Char("subject 1".into()));
        let (matrix, rate) = find_recording(&vars).unwrap();
        assert_eq!(matrix, array![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(rate, None);
    }

    #[test]
    fn decodes_small_elements_and_int16_class() {
        // int16 1x2 array named "v" = [-2, 7], name and data packed in small elements.
        let mut body = Vec::new();
        push_element(&mut body, MI_UINT32, &[10, 0, 0, 0, 0, 0, 0, 0]);
        push_element(&mut body, MI_INT32, &[1, 0, 0, 0, 2, 0, 0, 0]);
        body.extend_from_slice(&[1, 0, 1, 0, b'v', 0, 0, 0]);
        body.extend_from_slice(&[3, 0, 4, 0]);
        body.extend_from_slice(&(-2i16).to_le_bytes());
        body.extend_from_slice(&7i16.to_le_bytes());
        let mut element = Vec::new();
        push_element(&mut element, MI_MATRIX, &body);

        let mut bytes = encode(&[], false);
        bytes.extend(element);
        let vars = read_mat(&bytes).unwrap();
        assert_eq!(vars[0].name, "v");
        assert_eq!(
            vars[0].value,
            MatValue::Numeric {
                dims: vec![1, 2],
                data: vec![-2.0, 7.0]
            }
        );
    }

    #[test]
    fn rejects_non_mat_bytes() {
        let err = read_mat(&[0u8; 200]).unwrap_err();
        assert!(err.to_string().contains("endian"));
        assert!(read_mat(b"short").is_err());
    }

    #[test]
    fn rejects_hdf5_based_files() {
        let mut bytes = encode(&[], false);
        bytes[124..126].copy_from_slice(&0x0200u16.to_le_bytes());
        let err = read_mat(&bytes).unwrap_err();
        assert!(err.to_string().contains("v7.3"));
    }

    #[test]
    fn truncated_file_is_an_error_not_a_panic() {
        let data = array![[1.0, 2.0], [3.0, 4.0]];
        let bytes = encode(&[recording_struct(&data, 128.0)], false);
        assert!(read_mat(&bytes[..bytes.len() - 20]).is_err());
    }

    /// Struct header claiming `dims` with the given field names, and no children.
    fn childless_struct(dims: &[usize], fields: &[&str]) -> Vec<u8> {
        let mut body = Vec::new();
        encode_header(&mut body, MX_STRUCT, dims, "o");
        push_element(&mut body, MI_INT32, &(FIELD_NAME_LEN as i32).to_le_bytes());
        let mut raw_names = Vec::new();
        for field in fields {
            let start = raw_names.len();
            raw_names.extend_from_slice(field.as_bytes());
            raw_names.resize(start + FIELD_NAME_LEN, 0);
        }
        push_element(&mut body, MI_INT8, &raw_names);
        let mut bytes = encode(&[], false);
        push_element(&mut bytes, MI_MATRIX, &body);
        bytes
    }

    #[test]
    fn oversized_struct_dimensions_are_rejected_before_allocating() {
        let bytes = childless_struct(&[65536, 65536], &["data"]);
        assert!(bytes.len() < 300);
        let err = read_mat(&bytes).unwrap_err();
        assert!(format!("{err:#}").contains("does not fit"), "{err:#}");
    }

    #[test]
    fn overflowing_dimensions_are_an_error() {
        // (2^31 - 1)^3 overflows a 64-bit element count.
        let big = i32::MAX as usize;
        let bytes = childless_struct(&[big, big, big], &["data"]);
        let err = read_mat(&bytes).unwrap_err();
        assert!(format!("{err:#}").contains("overflow"), "{err:#}");
    }

    #[test]
    fn oversized_cell_dimensions_are_rejected() {
        let mut body = Vec::new();
        encode_header(&mut body, MX_CELL, &[100_000, 100_000], "c");
        let mut bytes = encode(&[], false);
        push_element(&mut bytes, MI_MATRIX, &body);
        assert!(read_mat(&bytes).is_err());
    }

    #[test]
    fn deeply_nested_cells_are_rejected() {
        let mut value = MatValue::Numeric {
            dims: vec![1, 1],
            data: vec![1.0],
        };
        for _ in 0..MAX_NESTING + 2 {
            value = MatValue::Cell {
                dims: vec![1, 1],
                items: vec![value],
            };
        }
        let bytes = encode(&[MatVariable { name: "c".into(), value }], false);
        let err = read_mat(&bytes).unwrap_err();
        assert!(format!("{err:#}").contains("nested"), "{err:#}");
    }

    #[test]
    fn shallow_nested_cells_still_read() {
        let leaf = MatValue::Numeric {
            dims: vec![1, 1],
            data: vec![4.0],
        };
        let value = MatValue::Cell {
            dims: vec![1, 1],
            items: vec![MatValue::Cell {
                dims: vec![1, 1],
                items: vec![leaf],
            }],
        };
        let var = MatVariable {
            name: "c".into(),
            value: value.clone(),
        };
        let vars = read_mat(&encode(&[var], true)).unwrap();
        assert_eq!(vars[0].value, value);
    }
}
