//! Wire format of the telemetry log.
//!
//! A log file is a flat concatenation of frames with no global header. Every
//! frame starts with a one-byte [`Marker`]:
//!
//! ```text
//! STREAM_METADATA: [0xC3][id:u32][name\0][field_count:u32][field descriptor]*
//! LABELS:          [0x81][id:u32][label\0]{field_count}
//! DATA:            [0xA5][id:u32][timestamp:u64][field value]*
//!
//! field descriptor:
//!   scalar: [tag:u8]
//!   vector: [11][element:u8][len:u32]
//!   matrix: [12][element:u8][rows:u32][cols:u32]
//! ```
//!
//! All multi-byte integers are little-endian. Data frames carry no length
//! prefix: a decoder derives the record size from the stream's schema.

/// Frame marker bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Marker {
    StreamMetadata = 0xC3,
    Labels = 0x81,
    Data = 0xA5,
}

impl Marker {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0xC3 => Some(Marker::StreamMetadata),
            0x81 => Some(Marker::Labels),
            0xA5 => Some(Marker::Data),
            _ => None,
        }
    }
}

/// Type tag of a field, or of the elements of a vector/matrix field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    U8 = 0,
    I8 = 1,
    U16 = 2,
    I16 = 3,
    U32 = 4,
    I32 = 5,
    U64 = 6,
    I64 = 7,
    F32 = 8,
    F64 = 9,
    Boolean = 10,
    Vector = 11,
    Matrix = 12,
}

impl DataType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        let data_type = match tag {
            0 => DataType::U8,
            1 => DataType::I8,
            2 => DataType::U16,
            3 => DataType::I16,
            4 => DataType::U32,
            5 => DataType::I32,
            6 => DataType::U64,
            7 => DataType::I64,
            8 => DataType::F32,
            9 => DataType::F64,
            10 => DataType::Boolean,
            11 => DataType::Vector,
            12 => DataType::Matrix,
            _ => return None,
        };
        Some(data_type)
    }

    /// Encoded width in bytes of a single value; `None` for vector/matrix.
    pub fn scalar_size(self) -> Option<usize> {
        match self {
            DataType::U8 | DataType::I8 | DataType::Boolean => Some(1),
            DataType::U16 | DataType::I16 => Some(2),
            DataType::U32 | DataType::I32 | DataType::F32 => Some(4),
            DataType::U64 | DataType::I64 | DataType::F64 => Some(8),
            DataType::Vector | DataType::Matrix => None,
        }
    }

    /// True for the ten numeric kinds allowed as vector/matrix elements.
    pub fn is_numeric(self) -> bool {
        (self as u8) <= DataType::F64 as u8
    }

    pub fn is_scalar(self) -> bool {
        self.scalar_size().is_some()
    }
}

/// Resolved wire description of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldDescriptor {
    /// A numeric scalar or a boolean.
    Scalar(DataType),
    /// A fixed-length vector of `len` elements.
    Vector { element: DataType, len: u32 },
    /// A fixed `rows` x `cols` matrix, persisted row-major.
    Matrix { element: DataType, rows: u32, cols: u32 },
}

impl FieldDescriptor {
    pub fn kind(&self) -> DataType {
        match self {
            FieldDescriptor::Scalar(data_type) => *data_type,
            FieldDescriptor::Vector { .. } => DataType::Vector,
            FieldDescriptor::Matrix { .. } => DataType::Matrix,
        }
    }

    pub fn element_kind(&self) -> Option<DataType> {
        match self {
            FieldDescriptor::Scalar(_) => None,
            FieldDescriptor::Vector { element, .. } | FieldDescriptor::Matrix { element, .. } => {
                Some(*element)
            }
        }
    }

    /// Logical `(rows, cols)` of the value; scalars are 1x1, vectors Nx1.
    pub fn shape(&self) -> (u32, u32) {
        match self {
            FieldDescriptor::Scalar(_) => (1, 1),
            FieldDescriptor::Vector { len, .. } => (*len, 1),
            FieldDescriptor::Matrix { rows, cols, .. } => (*rows, *cols),
        }
    }

    /// Number of bytes one value of this field occupies in a data frame.
    ///
    /// Saturates at `usize::MAX` for shapes too large to address; see
    /// [`FieldDescriptor::checked_encoded_size`].
    pub fn encoded_size(&self) -> usize {
        self.checked_encoded_size().unwrap_or(usize::MAX)
    }

    /// Like [`FieldDescriptor::encoded_size`], `None` on overflow.
    pub fn checked_encoded_size(&self) -> Option<usize> {
        match self {
            FieldDescriptor::Scalar(data_type) => data_type.scalar_size(),
            FieldDescriptor::Vector { element, len } => {
                element.scalar_size()?.checked_mul(usize::try_from(*len).ok()?)
            }
            FieldDescriptor::Matrix { element, rows, cols } => element
                .scalar_size()?
                .checked_mul(usize::try_from(*rows).ok()?)?
                .checked_mul(usize::try_from(*cols).ok()?),
        }
    }

    /// Appends the descriptor's schema bytes.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        put_u8(out, self.kind() as u8);
        match self {
            FieldDescriptor::Scalar(_) => {}
            FieldDescriptor::Vector { element, len } => {
                put_u8(out, *element as u8);
                put_u32(out, *len);
            }
            FieldDescriptor::Matrix { element, rows, cols } => {
                put_u8(out, *element as u8);
                put_u32(out, *rows);
                put_u32(out, *cols);
            }
        }
    }
}

#[inline]
pub fn put_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

#[inline]
pub fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Appends UTF-8 bytes followed by a single null terminator.
///
/// Callers must have rejected strings with embedded nulls beforehand.
#[inline]
pub fn put_str(out: &mut Vec<u8>, value: &str) {
    debug_assert!(!value.contains('\0'));
    out.extend_from_slice(value.as_bytes());
    out.push(0);
}

pub fn encode_metadata_frame(id: u32, name: &str, fields: &[FieldDescriptor], out: &mut Vec<u8>) {
    put_u8(out, Marker::StreamMetadata as u8);
    put_u32(out, id);
    put_str(out, name);
    put_u32(out, fields.len() as u32);
    for field in fields {
        field.write_to(out);
    }
}

pub fn encode_labels_frame<S: AsRef<str>>(id: u32, labels: &[S], out: &mut Vec<u8>) {
    put_u8(out, Marker::Labels as u8);
    put_u32(out, id);
    for label in labels {
        put_str(out, label.as_ref());
    }
}

/// Writes the fixed prefix of a data frame; field values follow.
pub fn encode_data_header(id: u32, timestamp: u64, out: &mut Vec<u8>) {
    put_u8(out, Marker::Data as u8);
    put_u32(out, id);
    put_u64(out, timestamp);
}

/// Size of marker + id + timestamp in front of every record.
pub const DATA_HEADER_SIZE: usize = 1 + 4 + 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_values_are_fixed() {
        assert_eq!(DataType::U8 as u8, 0);
        assert_eq!(DataType::F64 as u8, 9);
        assert_eq!(DataType::Boolean as u8, 10);
        assert_eq!(DataType::Vector as u8, 11);
        assert_eq!(DataType::Matrix as u8, 12);
        for tag in 0..=12u8 {
            assert_eq!(DataType::from_u8(tag).map(|t| t as u8), Some(tag));
        }
        assert_eq!(DataType::from_u8(13), None);
    }

    #[test]
    fn test_markers_are_distinct() {
        assert_eq!(Marker::StreamMetadata as u8, 0xC3);
        assert_eq!(Marker::Data as u8, 0xA5);
        assert_ne!(Marker::Labels as u8, Marker::StreamMetadata as u8);
        assert_ne!(Marker::Labels as u8, Marker::Data as u8);
        assert_eq!(Marker::from_u8(0x81), Some(Marker::Labels));
        assert_eq!(Marker::from_u8(0x00), None);
    }

    #[test]
    fn test_numeric_kinds() {
        assert!(DataType::I64.is_numeric());
        assert!(!DataType::Boolean.is_numeric());
        assert!(!DataType::Matrix.is_numeric());
        assert!(DataType::Boolean.is_scalar());
        assert!(!DataType::Vector.is_scalar());
    }

    #[test]
    fn test_matrix_descriptor_bytes() {
        let mut out = Vec::new();
        FieldDescriptor::Matrix { element: DataType::F32, rows: 2, cols: 3 }.write_to(&mut out);
        assert_eq!(out, vec![12, 8, 2, 0, 0, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn test_encoded_sizes() {
        assert_eq!(FieldDescriptor::Scalar(DataType::Boolean).encoded_size(), 1);
        assert_eq!(FieldDescriptor::Vector { element: DataType::F64, len: 4 }.encoded_size(), 32);
        assert_eq!(
            FieldDescriptor::Matrix { element: DataType::I16, rows: 3, cols: 3 }.encoded_size(),
            18
        );
    }

    #[test]
    fn test_oversized_shape_has_no_size() {
        let huge = FieldDescriptor::Matrix { element: DataType::F64, rows: 1 << 31, cols: 1 << 30 };
        assert_eq!(huge.checked_encoded_size(), None);
        assert_eq!(huge.encoded_size(), usize::MAX);
        assert_eq!(FieldDescriptor::Scalar(DataType::Vector).checked_encoded_size(), None);
    }

    #[test]
    fn test_string_is_null_terminated() {
        let mut out = Vec::new();
        put_str(&mut out, "héllo");
        assert_eq!(out.last(), Some(&0));
        assert_eq!(&out[..out.len() - 1], "héllo".as_bytes());
    }
}
