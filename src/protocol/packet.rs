//! Packet framing over a TCP stream.
//!
//! Every unit on the wire is a packet: a 4-byte header (3-byte little-endian
//! body length, 1-byte sequence number) followed by the body. A logical
//! message spans several packets when its payload reaches the maximum
//! single-packet size; reassembly stops at the first short packet.

use crate::error::{Error, Result};
use crate::protocol::constants::*;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

/// One framed packet.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Sequence number from the header.
    pub sequence: u8,
    /// Packet body (excluding the header).
    pub body: Bytes,
}

impl Packet {
    /// Frame a body into header + body wire bytes.
    ///
    /// The body must not exceed the maximum single-packet payload; larger
    /// logical messages are split by [`frame_message`].
    pub fn frame(body: &[u8], sequence: u8) -> Bytes {
        debug_assert!(body.len() <= MAX_PACKET_PAYLOAD);
        let mut buf = BytesMut::with_capacity(PACKET_HEADER_SIZE + body.len());
        let len = body.len() as u32;
        buf.extend_from_slice(&len.to_le_bytes()[..3]);
        buf.extend_from_slice(&[sequence]);
        buf.extend_from_slice(body);
        buf.freeze()
    }

    /// Try to split one packet off the front of `buf`.
    ///
    /// Returns `None` when fewer bytes than a header, or fewer than the
    /// declared body length, are buffered; the caller must read more from
    /// the transport. This is the need-more-data condition, not an error.
    pub fn parse(buf: &mut BytesMut) -> Option<Packet> {
        if buf.len() < PACKET_HEADER_SIZE {
            return None;
        }
        let length = buf[0] as usize | (buf[1] as usize) << 8 | (buf[2] as usize) << 16;
        if buf.len() < PACKET_HEADER_SIZE + length {
            return None;
        }
        let sequence = buf[3];
        let mut frame = buf.split_to(PACKET_HEADER_SIZE + length);
        let body = frame.split_off(PACKET_HEADER_SIZE).freeze();
        Some(Packet { sequence, body })
    }

    /// Whether a logical message continues past this packet.
    pub fn has_continuation(&self) -> bool {
        self.body.len() == MAX_PACKET_PAYLOAD
    }
}

/// Frame a logical message into wire bytes, splitting payloads that exceed
/// the maximum packet size.
///
/// A payload that is an exact multiple of the maximum is followed by an
/// empty terminating packet so the reader can detect the end. Returns the
/// wire bytes and the next sequence number.
pub fn frame_message(payload: &[u8], start_sequence: u8) -> (Bytes, u8) {
    let mut seq = start_sequence;
    let mut out = BytesMut::with_capacity(payload.len() + PACKET_HEADER_SIZE);
    let mut chunks = payload.chunks(MAX_PACKET_PAYLOAD).peekable();
    if chunks.peek().is_none() {
        // Zero-length message is still one (empty) packet.
        out.extend_from_slice(&Packet::frame(&[], seq));
        return (out.freeze(), seq.wrapping_add(1));
    }
    let mut last_len = 0;
    for chunk in chunks {
        out.extend_from_slice(&Packet::frame(chunk, seq));
        seq = seq.wrapping_add(1);
        last_len = chunk.len();
    }
    if last_len == MAX_PACKET_PAYLOAD {
        out.extend_from_slice(&Packet::frame(&[], seq));
        seq = seq.wrapping_add(1);
    }
    (out.freeze(), seq)
}

/// Packet reader/writer over a TCP stream.
///
/// Owns the running sequence number. Sequence numbers increment by one
/// (mod 256) per packet exchanged and reset to zero at the start of each
/// command; a packet arriving out of order is a hard protocol error.
pub struct PacketStream {
    stream: TcpStream,
    /// Bytes read from the transport that do not yet form a full packet.
    partial_buf: BytesMut,
    sequence: u8,
}

impl PacketStream {
    /// Create a new packet stream.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            partial_buf: BytesMut::with_capacity(8192),
            sequence: 0,
        }
    }

    /// Reset the sequence number for a new command.
    pub fn reset_sequence(&mut self) {
        self.sequence = 0;
    }

    /// The sequence number the next packet is expected to carry.
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Read one packet, accumulating transport reads until a full packet is
    /// buffered.
    ///
    /// Transport EOF before a complete packet is assembled is a framing
    /// failure (`Error::ConnectionClosed`).
    pub async fn read_packet(&mut self) -> Result<Packet> {
        loop {
            if let Some(packet) = Packet::parse(&mut self.partial_buf) {
                trace!(
                    sequence = packet.sequence,
                    len = packet.body.len(),
                    "read packet"
                );
                if packet.sequence != self.sequence {
                    return Err(Error::PacketOutOfOrder {
                        expected: self.sequence,
                        actual: packet.sequence,
                    });
                }
                self.sequence = self.sequence.wrapping_add(1);
                return Ok(packet);
            }
            let n = self.stream.read_buf(&mut self.partial_buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    /// Read one logical message, reassembling continuation packets.
    pub async fn read_message(&mut self) -> Result<Bytes> {
        let packet = self.read_packet().await?;
        if !packet.has_continuation() {
            return Ok(packet.body);
        }
        let mut body = BytesMut::from(&packet.body[..]);
        loop {
            let next = self.read_packet().await?;
            let done = !next.has_continuation();
            body.extend_from_slice(&next.body);
            if done {
                return Ok(body.freeze());
            }
        }
    }

    /// Write one logical message, splitting oversized payloads.
    pub async fn write_message(&mut self, payload: &[u8]) -> Result<()> {
        let (wire, next_seq) = frame_message(payload, self.sequence);
        trace!(
            sequence = self.sequence,
            len = payload.len(),
            "write message"
        );
        self.sequence = next_seq;
        self.stream.write_all(&wire).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Shut down the underlying transport.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        for len in [0usize, 1, 255, 4096] {
            let payload = vec![0xabu8; len];
            let framed = Packet::frame(&payload, 3);
            let mut buf = BytesMut::from(&framed[..]);
            let packet = Packet::parse(&mut buf).expect("complete packet");
            assert_eq!(packet.sequence, 3);
            assert_eq!(&packet.body[..], &payload[..]);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_parse_needs_header() {
        let mut buf = BytesMut::new();
        assert!(Packet::parse(&mut buf).is_none());
        buf.extend_from_slice(&[0x05, 0x00]);
        assert!(Packet::parse(&mut buf).is_none());
    }

    #[test]
    fn test_parse_needs_full_body() {
        // Declares 5 bytes of body, delivers 3.
        let mut buf = BytesMut::from(&[0x05, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03][..]);
        assert!(Packet::parse(&mut buf).is_none());
        // Nothing consumed while incomplete.
        assert_eq!(buf.len(), 7);
        buf.extend_from_slice(&[0x04, 0x05]);
        let packet = Packet::parse(&mut buf).expect("complete packet");
        assert_eq!(&packet.body[..], &[0x01, 0x02, 0x03, 0x04, 0x05]);
    }

    #[test]
    fn test_parse_two_packets_back_to_back() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Packet::frame(b"one", 0));
        buf.extend_from_slice(&Packet::frame(b"twos", 1));
        let first = Packet::parse(&mut buf).unwrap();
        let second = Packet::parse(&mut buf).unwrap();
        assert_eq!(&first.body[..], b"one");
        assert_eq!(second.sequence, 1);
        assert_eq!(&second.body[..], b"twos");
        assert!(Packet::parse(&mut buf).is_none());
    }

    #[test]
    fn test_frame_message_splits_at_max() {
        // One byte over the maximum forces a two-packet message.
        let payload = vec![0x5au8; MAX_PACKET_PAYLOAD + 1];
        let (wire, next_seq) = frame_message(&payload, 0);
        assert_eq!(next_seq, 2);

        let mut buf = BytesMut::from(&wire[..]);
        let first = Packet::parse(&mut buf).unwrap();
        let second = Packet::parse(&mut buf).unwrap();
        assert!(first.has_continuation());
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(second.body.len(), 1);
        assert!(!second.has_continuation());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_frame_message_exact_multiple_gets_empty_terminator() {
        let payload = vec![0u8; MAX_PACKET_PAYLOAD];
        let (wire, next_seq) = frame_message(&payload, 0);
        assert_eq!(next_seq, 2);

        let mut buf = BytesMut::from(&wire[..]);
        let first = Packet::parse(&mut buf).unwrap();
        let terminator = Packet::parse(&mut buf).unwrap();
        assert!(first.has_continuation());
        assert!(terminator.body.is_empty());
    }

    #[test]
    fn test_frame_message_empty_payload() {
        let (wire, next_seq) = frame_message(&[], 0);
        assert_eq!(next_seq, 1);
        let mut buf = BytesMut::from(&wire[..]);
        let packet = Packet::parse(&mut buf).unwrap();
        assert!(packet.body.is_empty());
    }
}
