//! JSON-lines wire: source records in, canonical graph elements out.
//!
//! Input is one [`SourceRecord`] per line. Blank lines are ignored; lines that
//! fail to parse are logged, counted and skipped. Output lines are nodes and
//! edges tagged with `"kind"`:
//!
//! ```text
//! {"kind":"node","id":"uniprot:P69905","type":"protein","properties":{"length":141}}
//! {"kind":"edge","id":"...","type":"gene to protein relationship","label":"Encodes",...}
//! ```

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use biocanon_resolve::{CanonicalEdge, CanonicalNode, GraphSink, SinkError, SourceRecord};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

/// Streams records from a line reader. Lines are read as bytes, so a line
/// that is not UTF-8 is just another malformed line. I/O failures end the
/// stream and are parked in `failure` for the caller to report after the run.
pub struct RecordReader<'a, R> {
    reader: R,
    buf: Vec<u8>,
    line_no: usize,
    malformed: &'a AtomicU64,
    failure: &'a Mutex<Option<io::Error>>,
}

impl<'a, R: BufRead> RecordReader<'a, R> {
    pub fn new(reader: R, malformed: &'a AtomicU64, failure: &'a Mutex<Option<io::Error>>) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_no: 0,
            malformed,
            failure,
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<'_, R> {
    type Item = SourceRecord;

    fn next(&mut self) -> Option<SourceRecord> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    *self.failure.lock() = Some(err);
                    return None;
                }
            }
            self.line_no += 1;
            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<SourceRecord>(&self.buf) {
                Ok(record) => return Some(record),
                Err(err) => {
                    self.malformed.fetch_add(1, Ordering::Relaxed);
                    warn!(line = self.line_no, error = %err, "skipping malformed input line");
                }
            }
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Element<'a> {
    Node(&'a CanonicalNode),
    Edge(&'a CanonicalEdge),
}

pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn write_line(&self, element: &Element<'_>) -> Result<(), SinkError> {
        // Encode outside the lock.
        let mut line = serde_json::to_vec(element)?;
        line.push(b'\n');
        self.out.lock().write_all(&line)?;
        Ok(())
    }
}

impl<W: Write + Send> GraphSink for JsonLinesSink<W> {
    fn put_node(&self, node: CanonicalNode) -> Result<(), SinkError> {
        self.write_line(&Element::Node(&node))
    }

    fn put_edge(&self, edge: CanonicalEdge) -> Result<(), SinkError> {
        self.write_line(&Element::Edge(&edge))
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.out.lock().flush()?;
        Ok(())
    }
}
