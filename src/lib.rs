//! # Binary Telemetry
//!
//! A library for logging strongly-typed telemetry into a compact,
//! self-describing binary file:
//!
//! * **Typed streams**: each stream is fixed to a tuple of scalar, vector
//!   and matrix fields; logging a record of the wrong shape does not compile
//! * **Self-describing**: every stream writes its schema (and optional
//!   field labels) before its first record, so a reader needs no knowledge
//!   of the producer's types
//! * **Row-major everywhere**: matrices are always persisted row-major,
//!   whatever their in-memory storage order
//!
//! ## Main Components
//!
//! * `Log`: owns the output file and hands out streams with unique ids
//! * `Stream`: typed channel that appends timestamped records
//! * `Matrix`: fixed-size column-major matrix usable as a field
//! * `LogReader` / `parse`: reference decoder for the format
//!
//! The byte layout is documented in [`format`].
//!
//! ## Quick Start
//!
//! ```
//! use binary_telemetry::{parse, Log, LogOptions, LogValue, Matrix};
//!
//! let log = Log::from_writer(Vec::new(), LogOptions::default()).unwrap();
//! let mut imu = log
//!     .add_stream::<(u32, bool, Matrix<f32, 2, 2>)>("imu", Some(&["seq", "valid", "cov"]))
//!     .unwrap();
//!
//! imu.log(4000, &(1, true, Matrix::from_rows([[1.0, 2.0], [3.0, 4.0]]))).unwrap();
//! drop(imu);
//!
//! let bytes = log.close().unwrap();
//! let parsed = parse(&bytes).unwrap();
//! let imu = parsed.get("imu").unwrap();
//! assert_eq!(imu.timestamps, vec![4000]);
//! assert_eq!(imu.column_by_label("valid").unwrap(), vec![&LogValue::Bool(true)]);
//! ```

pub mod config;
pub mod error;
pub mod field;
pub mod format;
pub mod log_reader;
pub mod log_writer;
pub mod value;

pub use config::LogOptions;
pub use error::{LogError, Result};
pub use field::{Field, Record};
pub use format::{DataType, FieldDescriptor, Marker};
pub use log_reader::{
    parse, read_file, DataRecord, Frame, LogReader, LogValue, ParsedLog, ParsedStream, StreamSchema,
};
pub use log_writer::{Log, Stream};
pub use value::{Dim, Matrix, MatrixValue, Scalar, StorageOrder};
