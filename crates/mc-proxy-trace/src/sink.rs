//! Trace file writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use mc_proxy_proto::{Packet, PacketDirection};
use serde::{Deserialize, Serialize};

use crate::error::TraceError;

/// At which point of its trip a packet was traced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceEvent {
    /// Arrived at the proxy, before any interceptor ran.
    Received,
    /// Written to its destination; includes injected packets.
    Sent,
}

/// One line of a trace file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Nanoseconds since the trace was opened.
    pub ts: u64,
    pub event: TraceEvent,
    /// Side the packet came from: `client` or `server`.
    pub dir: String,
    pub phase: String,
    pub id: i32,
    pub name: String,
    /// Packet body without the id, base64.
    pub body: String,
}

impl TraceRecord {
    pub fn new(ts: u64, event: TraceEvent, packet: &Packet) -> Self {
        let dir = match packet.direction() {
            PacketDirection::Serverbound => "client",
            PacketDirection::Clientbound => "server",
        };
        Self {
            ts,
            event,
            dir: dir.to_owned(),
            phase: packet.phase().as_str().to_owned(),
            id: packet.id(),
            name: packet.name().to_owned(),
            body: STANDARD.encode(packet.body_bytes()),
        }
    }
}

enum Output {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Output {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Output::Plain(w) => w,
            Output::Gzip(w) => w,
        }
    }
}

/// An open trace file.
pub struct TraceSink {
    output: Output,
    opened: Instant,
}

impl TraceSink {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: &Path, compress: bool) -> Result<Self, TraceError> {
        let file = BufWriter::new(File::create(path)?);
        let output = if compress {
            Output::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            Output::Plain(file)
        };
        Ok(Self {
            output,
            opened: Instant::now(),
        })
    }

    pub fn record(&mut self, event: TraceEvent, packet: &Packet) -> Result<(), TraceError> {
        let ts = self.opened.elapsed().as_nanos() as u64;
        let record = TraceRecord::new(ts, event, packet);
        let writer = self.output.writer();
        serde_json::to_writer(&mut *writer, &record)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flush everything and, for gzip, write the trailer.
    pub fn close(self) -> Result<(), TraceError> {
        let mut file = match self.output {
            Output::Plain(file) => file,
            Output::Gzip(encoder) => encoder.finish()?,
        };
        file.flush()?;
        Ok(())
    }
}
