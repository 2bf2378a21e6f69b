use crate::error::{LogError, Result};
use crate::format::FieldDescriptor;
use crate::value::{Matrix, MatrixValue, Scalar, StorageOrder};

/// A type that can occupy one field slot of a stream.
///
/// Resolution happens once, when the stream is created; `encode` runs for
/// every record and must emit exactly `descriptor().encoded_size()` bytes.
pub trait Field {
    /// Maps the type to its wire description.
    ///
    /// # Errors
    ///
    /// `UnsupportedType` when the type has no fixed-size representation.
    fn descriptor() -> Result<FieldDescriptor>;

    /// Appends the value's bytes to a data frame.
    fn encode(&self, out: &mut Vec<u8>);
}

macro_rules! impl_scalar_field {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Field for $ty {
                fn descriptor() -> Result<FieldDescriptor> {
                    Ok(FieldDescriptor::Scalar(<$ty as Scalar>::DATA_TYPE))
                }

                #[inline]
                fn encode(&self, out: &mut Vec<u8>) {
                    Scalar::put(*self, out);
                }
            }
        )*
    };
}

impl_scalar_field!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64, bool);

/// Resolves a vector or matrix type.
///
/// A type with one dimension equal to 1 is a vector and records its element
/// count; anything else is a matrix and records rows and columns.
pub fn resolve_matrix<M: MatrixValue>() -> Result<FieldDescriptor> {
    let (rows, cols) = match (M::ROWS.fixed(), M::COLS.fixed()) {
        (Some(rows), Some(cols)) => (rows, cols),
        _ => {
            return Err(LogError::unsupported::<M>(
                "vector/matrix dimensions must be fixed at compile time",
            ))
        }
    };
    if rows == 0 || cols == 0 {
        return Err(LogError::unsupported::<M>("vector/matrix dimensions must be non-zero"));
    }

    let element = <M::Elem as Scalar>::DATA_TYPE;
    if !element.is_numeric() {
        return Err(LogError::unsupported::<M>(format!(
            "{:?} is not a numeric element kind",
            element
        )));
    }

    let dim = |n: usize| {
        u32::try_from(n).map_err(|_| LogError::unsupported::<M>("dimension exceeds u32"))
    };

    if rows == 1 || cols == 1 {
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| LogError::unsupported::<M>("element count overflows"))?;
        Ok(FieldDescriptor::Vector { element, len: dim(len)? })
    } else {
        Ok(FieldDescriptor::Matrix {
            element,
            rows: dim(rows)?,
            cols: dim(cols)?,
        })
    }
}

/// Writes a vector/matrix value row-major, whatever its storage order.
///
/// Column-major storage with more than one column is transposed on the fly.
/// With a single column (or a single row) both orders coincide and the
/// storage is copied as is.
pub fn encode_matrix<M: MatrixValue>(value: &M, out: &mut Vec<u8>) {
    let rows = M::ROWS.fixed().unwrap_or(value.len());
    let cols = M::COLS.fixed().unwrap_or(1);

    if M::ORDER == StorageOrder::ColumnMajor && cols > 1 && rows > 1 {
        transpose_to_row_major(value, rows, cols, out);
    } else {
        for index in 0..value.len() {
            value.element(index).put(out);
        }
    }
}

/// Emits a column-major `rows` x `cols` value in row-major element order.
pub fn transpose_to_row_major<M: MatrixValue>(
    value: &M,
    rows: usize,
    cols: usize,
    out: &mut Vec<u8>,
) {
    for r in 0..rows {
        for c in 0..cols {
            value.element(c * rows + r).put(out);
        }
    }
}

impl<T: Scalar, const N: usize> Field for [T; N] {
    fn descriptor() -> Result<FieldDescriptor> {
        resolve_matrix::<Self>()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        encode_matrix(self, out);
    }
}

impl<T: Scalar, const R: usize, const C: usize> Field for [[T; C]; R] {
    fn descriptor() -> Result<FieldDescriptor> {
        resolve_matrix::<Self>()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        encode_matrix(self, out);
    }
}

impl<T: Scalar, const R: usize, const C: usize> Field for Matrix<T, R, C> {
    fn descriptor() -> Result<FieldDescriptor> {
        resolve_matrix::<Self>()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        encode_matrix(self, out);
    }
}

impl<T: Scalar> Field for Vec<T> {
    fn descriptor() -> Result<FieldDescriptor> {
        resolve_matrix::<Self>()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        encode_matrix(self, out);
    }
}

/// An ordered, fixed list of fields: the record type of a stream.
///
/// Implemented for tuples of one to twelve [`Field`]s. Because a stream is
/// generic over its record type, logging a value of the wrong arity or with
/// the wrong field types does not compile.
pub trait Record {
    /// Number of fields.
    const ARITY: usize;

    /// Resolves every field in declared order.
    fn descriptors() -> Result<Vec<FieldDescriptor>>;

    /// Appends every field value in declared order.
    fn encode(&self, out: &mut Vec<u8>);
}

macro_rules! impl_record {
    ($($name:ident . $idx:tt),+ ; $arity:expr) => {
        impl<$($name: Field),+> Record for ($($name,)+) {
            const ARITY: usize = $arity;

            fn descriptors() -> Result<Vec<FieldDescriptor>> {
                Ok(vec![$($name::descriptor()?),+])
            }

            #[inline]
            fn encode(&self, out: &mut Vec<u8>) {
                $(self.$idx.encode(out);)+
            }
        }
    };
}

impl_record!(A.0; 1);
impl_record!(A.0, B.1; 2);
impl_record!(A.0, B.1, C.2; 3);
impl_record!(A.0, B.1, C.2, D.3; 4);
impl_record!(A.0, B.1, C.2, D.3, E.4; 5);
impl_record!(A.0, B.1, C.2, D.3, E.4, F.5; 6);
impl_record!(A.0, B.1, C.2, D.3, E.4, F.5, G.6; 7);
impl_record!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7; 8);
impl_record!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7, I.8; 9);
impl_record!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7, I.8, J.9; 10);
impl_record!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7, I.8, J.9, K.10; 11);
impl_record!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7, I.8, J.9, K.10, L.11; 12);
