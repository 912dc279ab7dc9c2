//! Event sinks: the append-only record of completed pushes and pops.
//!
//! The stack calls [`EventSink::record`] while it holds its guard, so
//! events reach a sink in exactly the stack's serialization order and
//! each event is written as one unit.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::SinkError;

/// A completed stack operation.
///
/// The stack hands sinks `StackEvent<&T>`; sinks that keep events
/// convert them to owned `StackEvent<T>` with [`StackEvent::cloned`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackEvent<V> {
    Pushed(V),
    Popped(V),
}

impl<V> StackEvent<V> {
    /// The value carried by the event.
    pub fn value(&self) -> &V {
        match self {
            StackEvent::Pushed(value) | StackEvent::Popped(value) => value,
        }
    }

    pub fn is_push(&self) -> bool {
        matches!(self, StackEvent::Pushed(_))
    }
}

impl<T: Clone> StackEvent<&T> {
    pub fn cloned(self) -> StackEvent<T> {
        match self {
            StackEvent::Pushed(value) => StackEvent::Pushed(value.clone()),
            StackEvent::Popped(value) => StackEvent::Popped(value.clone()),
        }
    }
}

/// Log line format: `Pushed <value>` / `Popped <value>`.
impl<V: fmt::Display> fmt::Display for StackEvent<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackEvent::Pushed(value) => write!(f, "Pushed {}", value),
            StackEvent::Popped(value) => write!(f, "Popped {}", value),
        }
    }
}

/// Receiver of stack events.
///
/// Implementations must not call back into the stack that owns them.
pub trait EventSink<T>: Send {
    /// Record one completed operation.
    fn record(&mut self, event: StackEvent<&T>) -> Result<(), SinkError>;

    /// Push buffered events to their destination.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl<T> EventSink<T> for NullSink {
    fn record(&mut self, _event: StackEvent<&T>) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Clone)]
pub struct MemorySink<T> {
    events: Vec<StackEvent<T>>,
}

impl<T> MemorySink<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn events(&self) -> &[StackEvent<T>] {
        &self.events
    }

    pub fn into_events(self) -> Vec<StackEvent<T>> {
        self.events
    }
}

impl<T> Default for MemorySink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> EventSink<T> for MemorySink<T> {
    fn record(&mut self, event: StackEvent<&T>) -> Result<(), SinkError> {
        self.events.push(event.cloned());
        Ok(())
    }
}

/// Writes one text line per event.
pub struct FileSink<W: Write> {
    writer: BufWriter<W>,
    lines_written: u64,
}

impl FileSink<File> {
    /// Create (or truncate) the log file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = File::create(path.as_ref())?;
        Ok(Self::new(file))
    }
}

impl<W: Write> FileSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            lines_written: 0,
        }
    }

    /// Number of lines handed to the writer so far.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|err| SinkError::Io(err.into_error()))
    }
}

impl<T: fmt::Display, W: Write + Send> EventSink<T> for FileSink<W> {
    fn record(&mut self, event: StackEvent<&T>) -> Result<(), SinkError> {
        // One write per line so a failed write cannot leave half a line.
        let line = format!("{}\n", event);
        self.writer.write_all(line.as_bytes())?;
        self.lines_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}
