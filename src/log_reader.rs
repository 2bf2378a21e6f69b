//! Reference decoder for the telemetry log format.
//!
//! The producer never reads its own output; this module exists so the
//! format can be checked end to end and so tools can inspect a log.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{LogError, Result};
use crate::format::{DataType, FieldDescriptor, Marker};

/// A decoded field value.
///
/// Vector and matrix fields decode to [`LogValue::Array`], whose elements
/// are always in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum LogValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Array {
        rows: u32,
        cols: u32,
        elements: Vec<LogValue>,
    },
}

impl LogValue {
    /// Numeric scalar widened to `f64`; `None` for booleans and arrays.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            LogValue::U8(v) => Some(v as f64),
            LogValue::I8(v) => Some(v as f64),
            LogValue::U16(v) => Some(v as f64),
            LogValue::I16(v) => Some(v as f64),
            LogValue::U32(v) => Some(v as f64),
            LogValue::I32(v) => Some(v as f64),
            LogValue::U64(v) => Some(v as f64),
            LogValue::I64(v) => Some(v as f64),
            LogValue::F32(v) => Some(v as f64),
            LogValue::F64(v) => Some(v),
            LogValue::Bool(_) | LogValue::Array { .. } => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            LogValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Element at (`row`, `col`) of an array value.
    pub fn at(&self, row: u32, col: u32) -> Option<&LogValue> {
        match self {
            LogValue::Array { rows, cols, elements } if row < *rows && col < *cols => {
                elements.get(row as usize * *cols as usize + col as usize)
            }
            _ => None,
        }
    }
}

impl fmt::Display for LogValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogValue::U8(v) => write!(f, "{}", v),
            LogValue::I8(v) => write!(f, "{}", v),
            LogValue::U16(v) => write!(f, "{}", v),
            LogValue::I16(v) => write!(f, "{}", v),
            LogValue::U32(v) => write!(f, "{}", v),
            LogValue::I32(v) => write!(f, "{}", v),
            LogValue::U64(v) => write!(f, "{}", v),
            LogValue::I64(v) => write!(f, "{}", v),
            LogValue::F32(v) => write!(f, "{}", v),
            LogValue::F64(v) => write!(f, "{}", v),
            LogValue::Bool(v) => write!(f, "{}", v),
            LogValue::Array { rows, cols, elements } => {
                write!(f, "[")?;
                for r in 0..*rows {
                    if r > 0 {
                        write!(f, "; ")?;
                    }
                    for c in 0..*cols {
                        if c > 0 {
                            write!(f, ", ")?;
                        }
                        let index = r as usize * *cols as usize + c as usize;
                        if let Some(value) = elements.get(index) {
                            write!(f, "{}", value)?;
                        }
                    }
                }
                write!(f, "]")
            }
        }
    }
}

/// Schema of one stream as recovered from its metadata and labels frames.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSchema {
    pub id: u32,
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    /// `None` when no labels frame was written for the stream.
    pub labels: Option<Vec<String>>,
}

impl StreamSchema {
    /// Bytes of field data in each record of this stream.
    ///
    /// Saturates at `usize::MAX`; schemas accepted by [`LogReader`] always
    /// have an addressable record size.
    pub fn record_size(&self) -> usize {
        checked_record_size(&self.fields).unwrap_or(usize::MAX)
    }
}

fn checked_record_size(fields: &[FieldDescriptor]) -> Option<usize> {
    fields
        .iter()
        .try_fold(0usize, |total, field| total.checked_add(field.checked_encoded_size()?))
}

/// A single data record.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub stream_id: u32,
    pub timestamp: u64,
    pub values: Vec<LogValue>,
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Metadata(StreamSchema),
    Labels { stream_id: u32, labels: Vec<String> },
    Data(DataRecord),
}

/// Why a frame could not be decoded.
enum DecodeError {
    /// The data ends inside the frame.
    Truncated,
    Invalid(String),
}

type Decode<T> = std::result::Result<T, DecodeError>;

fn invalid<T>(reason: impl Into<String>) -> Decode<T> {
    Err(DecodeError::Invalid(reason.into()))
}

/// Sequential frame decoder over an in-memory log.
///
/// The reader keeps the schema of every stream it has seen so it can size
/// the data frames that follow. A log that ends in the middle of a frame
/// (for example after a failed write) is read up to the last complete frame;
/// [`LogReader::is_truncated`] then reports the cut.
///
/// # Examples
///
/// ```
/// use binary_telemetry::{Frame, Log, LogOptions, LogReader, LogValue};
///
/// let log = Log::from_writer(Vec::new(), LogOptions::default()).unwrap();
/// let mut stream = log.add_stream::<(i32,)>("counter", None).unwrap();
/// stream.log(7, &(42,)).unwrap();
/// drop(stream);
/// let bytes = log.close().unwrap();
///
/// let mut reader = LogReader::new(&bytes);
/// assert!(matches!(reader.read_frame().unwrap(), Some(Frame::Metadata(_))));
/// match reader.read_frame().unwrap() {
///     Some(Frame::Data(record)) => {
///         assert_eq!(record.timestamp, 7);
///         assert_eq!(record.values, vec![LogValue::I32(42)]);
///     }
///     other => panic!("unexpected frame {:?}", other),
/// }
/// assert!(reader.read_frame().unwrap().is_none());
/// ```
pub struct LogReader<'a> {
    data: &'a [u8],
    pos: usize,
    schemas: HashMap<u32, StreamSchema>,
    truncated: bool,
}

impl<'a> LogReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            schemas: HashMap::new(),
            truncated: false,
        }
    }

    /// Offset of the next frame.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// True once the reader stopped at an incomplete trailing frame.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn schema(&self, stream_id: u32) -> Option<&StreamSchema> {
        self.schemas.get(&stream_id)
    }

    /// Reads the next frame.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(frame))` - the next complete frame
    /// * `Ok(None)` - end of data, or an incomplete trailing frame
    ///
    /// # Errors
    ///
    /// `InvalidLogFile` for an unknown marker, a data/labels frame for an
    /// undeclared stream, a bad type tag or a non UTF-8 string. The reader
    /// does not advance past an invalid frame.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.truncated || self.pos >= self.data.len() {
            return Ok(None);
        }

        let start = self.pos;
        match self.decode_frame() {
            Ok(frame) => Ok(Some(frame)),
            Err(DecodeError::Truncated) => {
                self.pos = start;
                self.truncated = true;
                warn!(offset = start, "log ends with an incomplete frame");
                Ok(None)
            }
            Err(DecodeError::Invalid(reason)) => {
                self.pos = start;
                Err(LogError::InvalidLogFile { offset: start, reason })
            }
        }
    }

    fn decode_frame(&mut self) -> Decode<Frame> {
        let byte = self.read_u8()?;
        match Marker::from_u8(byte) {
            Some(Marker::StreamMetadata) => self.decode_metadata(),
            Some(Marker::Labels) => self.decode_labels(),
            Some(Marker::Data) => self.decode_data(),
            None => invalid(format!("unexpected marker byte 0x{:02X}", byte)),
        }
    }

    fn decode_metadata(&mut self) -> Decode<Frame> {
        let id = self.read_u32()?;
        let name = self.read_str()?;
        let count = self.read_u32()?;
        let mut fields = Vec::new();
        for _ in 0..count {
            fields.push(self.read_descriptor()?);
        }

        if self.schemas.contains_key(&id) {
            return invalid(format!("stream {} declared twice", id));
        }
        if checked_record_size(&fields).is_none() {
            return invalid(format!("record size of stream {} overflows", id));
        }
        let schema = StreamSchema {
            id,
            name,
            fields,
            labels: None,
        };
        debug!(id, stream = %schema.name, fields = schema.fields.len(), "read stream metadata");
        self.schemas.insert(id, schema.clone());
        Ok(Frame::Metadata(schema))
    }

    fn read_descriptor(&mut self) -> Decode<FieldDescriptor> {
        let tag = self.read_u8()?;
        let Some(kind) = DataType::from_u8(tag) else {
            return invalid(format!("unknown data type tag {}", tag));
        };
        let field = match kind {
            DataType::Vector => {
                let element = self.read_element_kind()?;
                let len = self.read_u32()?;
                FieldDescriptor::Vector { element, len }
            }
            DataType::Matrix => {
                let element = self.read_element_kind()?;
                let rows = self.read_u32()?;
                let cols = self.read_u32()?;
                FieldDescriptor::Matrix { element, rows, cols }
            }
            scalar => FieldDescriptor::Scalar(scalar),
        };
        if field.checked_encoded_size().is_none() {
            return invalid(format!("{:?} is too large to decode", field));
        }
        Ok(field)
    }

    fn read_element_kind(&mut self) -> Decode<DataType> {
        let tag = self.read_u8()?;
        match DataType::from_u8(tag) {
            Some(kind) if kind.is_numeric() => Ok(kind),
            _ => invalid(format!("invalid element type tag {}", tag)),
        }
    }

    fn decode_labels(&mut self) -> Decode<Frame> {
        let stream_id = self.read_u32()?;
        let count = match self.schemas.get(&stream_id) {
            Some(schema) if schema.labels.is_some() => {
                return invalid(format!("stream {} labeled twice", stream_id))
            }
            Some(schema) => schema.fields.len(),
            None => return invalid(format!("labels for undeclared stream {}", stream_id)),
        };

        let mut labels = Vec::with_capacity(count);
        for _ in 0..count {
            labels.push(self.read_str()?);
        }
        if let Some(schema) = self.schemas.get_mut(&stream_id) {
            schema.labels = Some(labels.clone());
        }
        Ok(Frame::Labels { stream_id, labels })
    }

    fn decode_data(&mut self) -> Decode<Frame> {
        let stream_id = self.read_u32()?;
        let fields = match self.schemas.get(&stream_id) {
            Some(schema) => schema.fields.clone(),
            None => return invalid(format!("data for undeclared stream {}", stream_id)),
        };
        let timestamp = self.read_u64()?;

        let mut values = Vec::with_capacity(fields.len());
        for field in &fields {
            values.push(self.read_value(field)?);
        }
        Ok(Frame::Data(DataRecord {
            stream_id,
            timestamp,
            values,
        }))
    }

    fn read_value(&mut self, field: &FieldDescriptor) -> Decode<LogValue> {
        match *field {
            FieldDescriptor::Scalar(kind) => self.read_scalar(kind),
            FieldDescriptor::Vector { element, .. } | FieldDescriptor::Matrix { element, .. } => {
                let (rows, cols) = field.shape();
                // The whole array must be present. Its size was checked when
                // the schema was read, so the element count fits in memory.
                if self.remaining() < field.encoded_size() {
                    return Err(DecodeError::Truncated);
                }
                let count = rows as usize * cols as usize;
                let mut elements = Vec::with_capacity(count);
                for _ in 0..count {
                    elements.push(self.read_scalar(element)?);
                }
                Ok(LogValue::Array { rows, cols, elements })
            }
        }
    }

    fn read_scalar(&mut self, kind: DataType) -> Decode<LogValue> {
        let value = match kind {
            DataType::U8 => LogValue::U8(self.read_u8()?),
            DataType::I8 => LogValue::I8(self.read_u8()? as i8),
            DataType::U16 => LogValue::U16(u16::from_le_bytes(self.read_array()?)),
            DataType::I16 => LogValue::I16(i16::from_le_bytes(self.read_array()?)),
            DataType::U32 => LogValue::U32(u32::from_le_bytes(self.read_array()?)),
            DataType::I32 => LogValue::I32(i32::from_le_bytes(self.read_array()?)),
            DataType::U64 => LogValue::U64(u64::from_le_bytes(self.read_array()?)),
            DataType::I64 => LogValue::I64(i64::from_le_bytes(self.read_array()?)),
            DataType::F32 => LogValue::F32(f32::from_le_bytes(self.read_array()?)),
            DataType::F64 => LogValue::F64(f64::from_le_bytes(self.read_array()?)),
            DataType::Boolean => LogValue::Bool(self.read_u8()? != 0),
            DataType::Vector | DataType::Matrix => {
                return invalid(format!("{:?} is not a scalar type", kind))
            }
        };
        Ok(value)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_bytes(&mut self, len: usize) -> Decode<&'a [u8]> {
        if self.remaining() < len {
            return Err(DecodeError::Truncated);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Decode<[u8; N]> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.read_bytes(N)?);
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Decode<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> Decode<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Decode<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Reads a null-terminated UTF-8 string.
    fn read_str(&mut self) -> Decode<String> {
        let rest = &self.data[self.pos..];
        let Some(len) = rest.iter().position(|&b| b == 0) else {
            return Err(DecodeError::Truncated);
        };
        let bytes = self.read_bytes(len + 1)?;
        match std::str::from_utf8(&bytes[..len]) {
            Ok(s) => Ok(s.to_string()),
            Err(err) => invalid(format!("string is not valid UTF-8: {}", err)),
        }
    }
}

/// All records of one stream, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStream {
    pub schema: StreamSchema,
    pub timestamps: Vec<u64>,
    pub records: Vec<Vec<LogValue>>,
}

impl ParsedStream {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of the field at `index` across all records.
    pub fn column(&self, index: usize) -> Vec<&LogValue> {
        self.records.iter().filter_map(|record| record.get(index)).collect()
    }

    /// Values of the field with the given label; `None` if unlabeled or no
    /// such label.
    pub fn column_by_label(&self, label: &str) -> Option<Vec<&LogValue>> {
        let labels = self.schema.labels.as_ref()?;
        let index = labels.iter().position(|l| l == label)?;
        Some(self.column(index))
    }
}

/// A fully decoded log, grouped by stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLog {
    /// Streams in declaration order.
    pub streams: Vec<ParsedStream>,
    /// True if the log ended in an incomplete frame.
    pub truncated: bool,
}

impl ParsedLog {
    /// First stream with the given name.
    pub fn get(&self, name: &str) -> Option<&ParsedStream> {
        self.streams.iter().find(|s| s.schema.name == name)
    }

    pub fn by_id(&self, id: u32) -> Option<&ParsedStream> {
        self.streams.iter().find(|s| s.schema.id == id)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.streams.iter().map(|s| s.schema.name.as_str())
    }
}

/// Decodes a complete log held in memory.
pub fn parse(data: &[u8]) -> Result<ParsedLog> {
    let mut reader = LogReader::new(data);
    let mut parsed = ParsedLog::default();
    let mut index: HashMap<u32, usize> = HashMap::new();

    while let Some(frame) = reader.read_frame()? {
        match frame {
            Frame::Metadata(schema) => {
                index.insert(schema.id, parsed.streams.len());
                parsed.streams.push(ParsedStream {
                    schema,
                    timestamps: Vec::new(),
                    records: Vec::new(),
                });
            }
            Frame::Labels { stream_id, labels } => {
                if let Some(&i) = index.get(&stream_id) {
                    parsed.streams[i].schema.labels = Some(labels);
                }
            }
            Frame::Data(record) => {
                if let Some(&i) = index.get(&record.stream_id) {
                    let stream = &mut parsed.streams[i];
                    stream.timestamps.push(record.timestamp);
                    stream.records.push(record.values);
                }
            }
        }
    }

    parsed.truncated = reader.is_truncated();
    Ok(parsed)
}

/// Reads and decodes the log file at `path`.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<ParsedLog> {
    let data = fs::read(path)?;
    parse(&data)
}
