use crate::error::{LogError, Result};

/// Default capacity of the write buffer in front of the log file (64KB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Options for opening a [`Log`](crate::Log).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// Capacity in bytes of the buffer between frames and the file.
    pub buffer_capacity: usize,

    /// Flush the sink after every frame.
    ///
    /// Makes records visible to a concurrent reader as soon as `log`
    /// returns, at the cost of one write syscall per record.
    pub flush_each_frame: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        LogOptions {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            flush_each_frame: false,
        }
    }
}

impl LogOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set buffer capacity (builder pattern).
    pub fn with_buffer_capacity(mut self, bytes: usize) -> Self {
        self.buffer_capacity = bytes;
        self
    }

    /// Set per-frame flushing (builder pattern).
    pub fn with_flush_each_frame(mut self, enabled: bool) -> Self {
        self.flush_each_frame = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(LogError::InvalidConfig(
                "buffer_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = LogOptions::default();
        assert_eq!(options.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
        assert!(!options.flush_each_frame);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let options = LogOptions::new()
            .with_buffer_capacity(512)
            .with_flush_each_frame(true);
        assert_eq!(options.buffer_capacity, 512);
        assert!(options.flush_each_frame);
    }

    #[test]
    fn test_zero_capacity_is_invalid() {
        let options = LogOptions::new().with_buffer_capacity(0);
        assert!(matches!(options.validate(), Err(LogError::InvalidConfig(_))));
    }
}
