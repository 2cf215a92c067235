//! Packet consumers
//!
//! Sinks live outside the session: callers forward the packets a session
//! returns, and any I/O failure stays with the sink.

use crate::bitstream::SEQUENCE_END_CODE;
use crate::frame::EncodedPacket;
use std::io::{self, Write};

/// Consumer of encoded packets
pub trait BitstreamSink {
    /// Take ownership of one packet
    fn consume(&mut self, packet: EncodedPacket) -> io::Result<()>;

    /// Consume every packet in order, stopping at the first failure
    fn consume_all(&mut self, packets: Vec<EncodedPacket>) -> io::Result<()> {
        for packet in packets {
            self.consume(packet)?;
        }
        Ok(())
    }
}

/// Collects packets in memory
impl BitstreamSink for Vec<EncodedPacket> {
    fn consume(&mut self, packet: EncodedPacket) -> io::Result<()> {
        self.push(packet);
        Ok(())
    }
}

/// Writes a raw elementary stream: payloads back to back, no container
pub struct ElementaryStreamWriter<W: Write> {
    writer: W,
    bytes_written: u64,
    packets_written: u64,
}

impl<W: Write> ElementaryStreamWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bytes_written: 0,
            packets_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    /// Flush the writer and return it.
    ///
    /// `append_end_code` adds the legacy `00 00 01 B7` sequence end code,
    /// which only MPEG-1/2 decoders look for.
    pub fn finish(mut self, append_end_code: bool) -> io::Result<W> {
        if append_end_code {
            self.writer.write_all(&SEQUENCE_END_CODE)?;
            self.bytes_written += SEQUENCE_END_CODE.len() as u64;
        }
        self.writer.flush()?;
        log::debug!(
            "Elementary stream finished: {} packets, {} bytes",
            self.packets_written,
            self.bytes_written
        );
        Ok(self.writer)
    }
}

impl<W: Write> BitstreamSink for ElementaryStreamWriter<W> {
    fn consume(&mut self, packet: EncodedPacket) -> io::Result<()> {
        self.writer.write_all(&packet.data)?;
        self.bytes_written += packet.data.len() as u64;
        self.packets_written += 1;
        Ok(())
    }
}
