//! Producer side of the telemetry log format.
//!
//! This module provides the Log sink, which owns the output and hands out
//! stream ids, and the typed Stream handle that writes records into it.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

use tracing::{debug, info, trace, warn};

use crate::config::LogOptions;
use crate::error::{LogError, Result};
use crate::field::Record;
use crate::format::{
    encode_data_header, encode_labels_frame, encode_metadata_frame, FieldDescriptor,
    DATA_HEADER_SIZE,
};

/// Owner of the log output and allocator of stream ids.
///
/// Every frame produced by the log or by one of its streams goes through a
/// single write primitive, so the file is one linear sequence of frames in
/// call order.
///
/// # Thread Safety
///
/// **Important**: Log is single-writer. It is `!Sync`, so the compiler keeps
/// it and its streams on one thread. A program that wants to log from
/// several threads has to funnel records to one owning thread itself.
///
/// # Examples
///
/// ```
/// use binary_telemetry::{Log, LogOptions};
///
/// let log = Log::from_writer(Vec::new(), LogOptions::default()).unwrap();
/// let mut pose = log
///     .add_stream::<(f64, [f32; 3])>("pose", Some(&["heading", "position"]))
///     .unwrap();
/// pose.log(1_000, &(0.5, [1.0, 2.0, 3.0])).unwrap();
/// drop(pose);
///
/// let bytes = log.close().unwrap();
/// assert_eq!(bytes[0], 0xC3);
/// ```
pub struct Log<W: Write = BufWriter<File>> {
    sink: RefCell<Option<W>>,
    next_id: Cell<u64>,
    bytes_written: Cell<u64>,
    options: LogOptions,
}

impl Log<BufWriter<File>> {
    /// Creates (or truncates) the file at `path` and opens it for writing.
    ///
    /// # Errors
    ///
    /// `LogError::Io` if the file cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, LogOptions::default())
    }

    /// Like [`Log::open`] with explicit options.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: LogOptions) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref();
        let file = File::create(path)?;
        info!(path = %path.display(), "opened telemetry log");
        Self::from_writer(BufWriter::with_capacity(options.buffer_capacity, file), options)
    }
}

impl<W: Write> Log<W> {
    /// Wraps an arbitrary byte sink.
    ///
    /// The sink is used as given; `buffer_capacity` only applies to logs
    /// opened from a path.
    pub fn from_writer(writer: W, options: LogOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            sink: RefCell::new(Some(writer)),
            next_id: Cell::new(0),
            bytes_written: Cell::new(0),
            options,
        })
    }

    /// Registers a new stream and writes its schema.
    ///
    /// The record type `R` fixes the stream's field list for its whole
    /// life. Before returning, the metadata frame (and the labels frame,
    /// when `labels` is given) has been handed to the sink.
    ///
    /// # Arguments
    ///
    /// * `name` - Stream name, written null-terminated
    /// * `labels` - Optional per-field labels, one for each field of `R`
    ///
    /// # Errors
    ///
    /// All of the following are detected before anything is written and
    /// before an id is consumed:
    ///
    /// * `UnsupportedType` - a field of `R` has no fixed-size representation
    /// * `LabelCountMismatch` - `labels` does not have one entry per field
    /// * `EmbeddedNul` - the name or a label contains a null byte
    /// * `TooManyStreams` - the 32-bit id space is used up
    ///
    /// `Io` is returned if the sink rejects the frames.
    pub fn add_stream<R: Record>(
        &self,
        name: &str,
        labels: Option<&[&str]>,
    ) -> Result<Stream<'_, R, W>> {
        let fields = R::descriptors()?;

        if let Some(labels) = labels {
            if labels.len() != fields.len() {
                return Err(LogError::LabelCountMismatch {
                    fields: fields.len(),
                    labels: labels.len(),
                });
            }
        }
        check_no_nul(name)?;
        for label in labels.unwrap_or_default() {
            check_no_nul(label)?;
        }

        let id = self.allocate_id()?;

        let mut frame = Vec::new();
        encode_metadata_frame(id, name, &fields, &mut frame);
        self.write_frame(&frame)?;

        if let Some(labels) = labels {
            frame.clear();
            encode_labels_frame(id, labels, &mut frame);
            self.write_frame(&frame)?;
        }

        debug!(
            id,
            stream = name,
            fields = fields.len(),
            labeled = labels.is_some(),
            "added stream"
        );

        let record_size = fields.iter().map(FieldDescriptor::encoded_size).sum();
        frame.clear();
        Ok(Stream {
            log: self,
            id,
            name: name.to_string(),
            fields,
            labels: labels.map(|labels| labels.iter().map(|l| l.to_string()).collect()),
            record_size,
            records_written: 0,
            frame,
            _record: PhantomData,
        })
    }

    /// Flushes buffered frames to the underlying sink.
    pub fn flush(&self) -> Result<()> {
        let mut guard = self.sink.borrow_mut();
        let sink = guard.as_mut().ok_or_else(closed)?;
        sink.flush()?;
        Ok(())
    }

    /// Flushes and closes the log, returning the sink.
    ///
    /// All streams borrow the log, so they must be gone before it can be
    /// closed.
    pub fn close(self) -> Result<W> {
        let mut sink = self.sink.borrow_mut().take().ok_or_else(closed)?;
        sink.flush()?;
        info!(
            streams = self.next_id.get(),
            bytes = self.bytes_written.get(),
            "closed telemetry log"
        );
        Ok(sink)
    }

    /// Number of streams created so far.
    pub fn stream_count(&self) -> u64 {
        self.next_id.get()
    }

    /// Total bytes of all frames handed to the sink.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.get()
    }

    pub fn options(&self) -> &LogOptions {
        &self.options
    }

    fn allocate_id(&self) -> Result<u32> {
        let id = self.next_id.get();
        let id = u32::try_from(id).map_err(|_| LogError::TooManyStreams)?;
        self.next_id.set(u64::from(id) + 1);
        Ok(id)
    }

    /// The single write primitive: one complete frame per call.
    fn write_frame(&self, frame: &[u8]) -> Result<()> {
        let mut guard = self.sink.borrow_mut();
        let sink = guard.as_mut().ok_or_else(closed)?;
        sink.write_all(frame)?;
        self.bytes_written.set(self.bytes_written.get() + frame.len() as u64);
        if self.options.flush_each_frame {
            sink.flush()?;
        }
        Ok(())
    }
}

impl<W: Write> Drop for Log<W> {
    fn drop(&mut self) {
        if let Some(mut sink) = self.sink.get_mut().take() {
            if let Err(err) = sink.flush() {
                warn!(error = %err, "failed to flush telemetry log on drop");
            }
        }
    }
}

fn closed() -> LogError {
    LogError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "telemetry log is closed"))
}

fn check_no_nul(s: &str) -> Result<()> {
    if s.contains('\0') {
        return Err(LogError::EmbeddedNul(s.to_string()));
    }
    Ok(())
}

/// A named, schema-fixed channel of timestamped records.
///
/// Created by [`Log::add_stream`]. The record type `R` is a tuple of fields;
/// [`Stream::log`] only accepts values of exactly that type.
///
/// # Examples
///
/// ```
/// use binary_telemetry::{Log, LogOptions, Matrix};
///
/// let log = Log::from_writer(Vec::new(), LogOptions::default()).unwrap();
/// let mut stream = log
///     .add_stream::<(u8, Matrix<f64, 2, 2>)>("attitude", None)
///     .unwrap();
/// assert_eq!(stream.id(), 0);
/// assert_eq!(stream.record_size(), 1 + 4 * 8);
///
/// stream.log(10, &(3, Matrix::from_rows([[1.0, 0.0], [0.0, 1.0]]))).unwrap();
/// assert_eq!(stream.records_written(), 1);
/// ```
pub struct Stream<'log, R: Record, W: Write = BufWriter<File>> {
    log: &'log Log<W>,
    id: u32,
    name: String,
    fields: Vec<FieldDescriptor>,
    labels: Option<Vec<String>>,
    record_size: usize,
    records_written: u64,
    frame: Vec<u8>,
    _record: PhantomData<fn(&R)>,
}

impl<'log, R: Record, W: Write> Stream<'log, R, W> {
    /// Appends one record.
    ///
    /// The timestamp is stored as given; ordering and uniqueness are up to
    /// the caller.
    ///
    /// # Arguments
    ///
    /// * `timestamp` - Caller-defined time of the record
    /// * `values` - One value per field, in declared order
    ///
    /// # Errors
    ///
    /// `LogError::Io` if the sink fails. A failure can leave a partial
    /// frame at the end of the file.
    pub fn log(&mut self, timestamp: u64, values: &R) -> Result<()> {
        self.frame.clear();
        encode_data_header(self.id, timestamp, &mut self.frame);
        values.encode(&mut self.frame);
        debug_assert_eq!(self.frame.len(), DATA_HEADER_SIZE + self.record_size);

        self.log.write_frame(&self.frame)?;
        self.records_written += 1;
        trace!(id = self.id, timestamp, "logged record");
        Ok(())
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    /// Bytes of field data in each record, excluding the frame header.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}
