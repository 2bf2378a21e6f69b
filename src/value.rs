use std::fmt::Debug;

use crate::format::DataType;

/// A primitive value with a fixed wire representation.
///
/// Implemented for the ten numeric primitives and `bool`. Anything else
/// (`i128`, `usize`, `char`, ...) has no tag in the format and is rejected
/// by the compiler when used as a field.
pub trait Scalar: Copy + Default + Debug + 'static {
    /// Tag written into stream metadata for this type.
    const DATA_TYPE: DataType;

    /// Appends the little-endian bytes of the value.
    fn put(self, out: &mut Vec<u8>);
}

macro_rules! impl_scalar {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const DATA_TYPE: DataType = DataType::$tag;

                #[inline]
                fn put(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_scalar! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

impl Scalar for bool {
    const DATA_TYPE: DataType = DataType::Boolean;

    #[inline]
    fn put(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }
}

/// Element ordering of a matrix value's backing storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOrder {
    RowMajor,
    ColumnMajor,
}

/// A compile-time dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    Fixed(usize),
    /// Only known at runtime. Such types cannot be described by the format.
    Dynamic,
}

impl Dim {
    pub const fn fixed(self) -> Option<usize> {
        match self {
            Dim::Fixed(n) => Some(n),
            Dim::Dynamic => None,
        }
    }
}

/// Contract a vector/matrix type must fulfil to be logged.
///
/// The dimensions and storage order are associated constants so they are
/// known before any value exists. `element` gives raw access into the
/// backing storage: index `i` is the `i`-th element in `ORDER`.
pub trait MatrixValue {
    type Elem: Scalar;

    const ROWS: Dim;
    const COLS: Dim;
    const ORDER: StorageOrder;

    /// Number of stored elements.
    fn len(&self) -> usize;

    /// The `index`-th element in storage order.
    fn element(&self, index: usize) -> Self::Elem;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed-size array: a column vector of `N` elements.
impl<T: Scalar, const N: usize> MatrixValue for [T; N] {
    type Elem = T;

    const ROWS: Dim = Dim::Fixed(N);
    const COLS: Dim = Dim::Fixed(1);
    const ORDER: StorageOrder = StorageOrder::RowMajor;

    fn len(&self) -> usize {
        N
    }

    #[inline]
    fn element(&self, index: usize) -> T {
        self[index]
    }
}

/// Nested array `[[T; C]; R]`: an `R` x `C` matrix stored row by row.
impl<T: Scalar, const R: usize, const C: usize> MatrixValue for [[T; C]; R] {
    type Elem = T;

    const ROWS: Dim = Dim::Fixed(R);
    const COLS: Dim = Dim::Fixed(C);
    const ORDER: StorageOrder = StorageOrder::RowMajor;

    fn len(&self) -> usize {
        R * C
    }

    #[inline]
    fn element(&self, index: usize) -> T {
        self[index / C][index % C]
    }
}

/// Growable vector. Its length is a runtime property, so registering it as
/// a field always fails.
impl<T: Scalar> MatrixValue for Vec<T> {
    type Elem = T;

    const ROWS: Dim = Dim::Dynamic;
    const COLS: Dim = Dim::Fixed(1);
    const ORDER: StorageOrder = StorageOrder::RowMajor;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    #[inline]
    fn element(&self, index: usize) -> T {
        self[index]
    }
}

/// Fixed-size `R` x `C` matrix with column-major storage.
///
/// This is the layout most linear algebra libraries use. The log always
/// persists matrices row-major, so values of this type are transposed on
/// the way out.
///
/// # Examples
///
/// ```
/// use binary_telemetry::Matrix;
///
/// let m = Matrix::<f64, 2, 3>::from_rows([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
/// assert_eq!(m.get(1, 0), 4.0);
/// assert_eq!(m.as_column_major(), &[[1.0, 4.0], [2.0, 5.0], [3.0, 6.0]]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix<T: Scalar, const R: usize, const C: usize> {
    columns: [[T; R]; C],
}

impl<T: Scalar, const R: usize, const C: usize> Matrix<T, R, C> {
    pub fn zeros() -> Self {
        Self {
            columns: [[T::default(); R]; C],
        }
    }

    /// Builds the matrix from its storage directly, one inner array per column.
    pub fn from_column_major(columns: [[T; R]; C]) -> Self {
        Self { columns }
    }

    /// Builds the matrix from its logical rows.
    pub fn from_rows(rows: [[T; C]; R]) -> Self {
        let mut m = Self::zeros();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                m.columns[c][r] = *value;
            }
        }
        m
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        self.columns[col][row]
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.columns[col][row] = value;
    }

    pub fn as_column_major(&self) -> &[[T; R]; C] {
        &self.columns
    }
}

impl<T: Scalar, const R: usize, const C: usize> Default for Matrix<T, R, C> {
    fn default() -> Self {
        Self::zeros()
    }
}

impl<T: Scalar, const R: usize, const C: usize> MatrixValue for Matrix<T, R, C> {
    type Elem = T;

    const ROWS: Dim = Dim::Fixed(R);
    const COLS: Dim = Dim::Fixed(C);
    const ORDER: StorageOrder = StorageOrder::ColumnMajor;

    fn len(&self) -> usize {
        R * C
    }

    #[inline]
    fn element(&self, index: usize) -> T {
        self.columns[index / R][index % R]
    }
}
