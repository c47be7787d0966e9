//! Console sink: entries go to standard output, unbounded.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use crate::error::SinkError;
use crate::sink::Sink;

/// Writes each entry to a stream, by default the process's stdout.
pub struct ConsoleSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self::with_writer(io::stdout())
    }

    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }
}

impl Sink for ConsoleSink {
    fn write(&self, line: &[u8]) -> Result<(), SinkError> {
        // Holding the lock for the whole entry keeps lines from interleaving.
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(line)?;
        out.flush()?;
        Ok(())
    }
}
