//! UDP transport for exported frames with chunked framing.
//!
//! Each frame becomes one header datagram followed by MTU-sized chunk
//! datagrams. The sender is a non-blocking std socket so it can run
//! inside a render tick; the receiver is async on tokio.
//!
//! ## Wire format (little-endian)
//!
//! **Frame header datagram** (26 bytes):
//! ```text
//! tag:           u8   (1)  = 0x01
//! sequence:      u32  (4)
//! kind:          u8   (1)  0 = raw, 1 = text-safe
//! width:         u32  (4)
//! height:        u32  (4)
//! payload_len:   u32  (4)
//! total_chunks:  u32  (4)
//! chunk_len:     u32  (4)  nominal payload bytes per chunk
//! ```
//!
//! **Chunk datagram** (13 byte header + payload):
//! ```text
//! tag:           u8   (1)  = 0x02
//! sequence:      u32  (4)
//! chunk_index:   u32  (4)
//! chunk_size:    u32  (4)
//! data:          [u8] (chunk_size)
//! ```

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

use bytes::{Buf, BufMut, BytesMut};
use tokio::net::UdpSocket;

use crate::encoder::decode_text;
use crate::error::ExportError;
use crate::sink::FrameSink;
use crate::types::{Dimensions, FrameDescriptor, PayloadKind};

// ── Constants ────────────────────────────────────────────────────

/// Maximum transmission unit minus IP (20) + UDP (8) headers.
pub const DEFAULT_MTU: usize = 1400;

/// Largest payload a receiver will reassemble (8K RGBA with headroom).
pub const MAX_FRAME_PAYLOAD: usize = 256 * 1024 * 1024;

/// Largest UDP payload over IPv4.
const MAX_DATAGRAM: usize = 65_507;

const TAG_FRAME: u8 = 0x01;
const TAG_CHUNK: u8 = 0x02;

// ── FrameHeader ──────────────────────────────────────────────────

/// Per-frame metadata sent as the first datagram of each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub sequence: u32,
    pub kind: PayloadKind,
    pub width: u32,
    pub height: u32,
    pub payload_len: u32,
    pub total_chunks: u32,
    pub chunk_len: u32,
}

impl FrameHeader {
    /// Encoded size on the wire.
    pub const SIZE: usize = 26;

    pub fn write_to(&self, buf: &mut impl BufMut) {
        buf.put_u8(TAG_FRAME);
        buf.put_u32_le(self.sequence);
        buf.put_u8(self.kind.to_wire());
        buf.put_u32_le(self.width);
        buf.put_u32_le(self.height);
        buf.put_u32_le(self.payload_len);
        buf.put_u32_le(self.total_chunks);
        buf.put_u32_le(self.chunk_len);
    }

    pub fn decode(mut data: &[u8]) -> Result<Self, ExportError> {
        if data.len() < Self::SIZE {
            return Err(ExportError::MalformedDatagram("frame header too short"));
        }
        if data.get_u8() != TAG_FRAME {
            return Err(ExportError::MalformedDatagram("not a frame header"));
        }
        let sequence = data.get_u32_le();
        let kind = PayloadKind::from_wire(data.get_u8())
            .ok_or(ExportError::MalformedDatagram("unknown payload kind"))?;
        Ok(Self {
            sequence,
            kind,
            width: data.get_u32_le(),
            height: data.get_u32_le(),
            payload_len: data.get_u32_le(),
            total_chunks: data.get_u32_le(),
            chunk_len: data.get_u32_le(),
        })
    }

    /// `true` if the chunk count agrees with the payload length and the
    /// payload is within [`MAX_FRAME_PAYLOAD`].
    pub fn is_consistent(&self) -> bool {
        let payload = self.payload_len as usize;
        let chunk = self.chunk_len as usize;
        chunk > 0
            && chunk + ChunkHeader::SIZE <= MAX_DATAGRAM
            && payload <= MAX_FRAME_PAYLOAD
            && payload.div_ceil(chunk) == self.total_chunks as usize
    }
}

// ── ChunkHeader ──────────────────────────────────────────────────

/// Per-chunk metadata prepended to each data datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub sequence: u32,
    pub chunk_index: u32,
    pub chunk_size: u32,
}

impl ChunkHeader {
    /// Encoded size on the wire.
    pub const SIZE: usize = 13;

    pub fn write_to(&self, buf: &mut impl BufMut) {
        buf.put_u8(TAG_CHUNK);
        buf.put_u32_le(self.sequence);
        buf.put_u32_le(self.chunk_index);
        buf.put_u32_le(self.chunk_size);
    }

    pub fn decode(mut data: &[u8]) -> Result<Self, ExportError> {
        if data.len() < Self::SIZE {
            return Err(ExportError::MalformedDatagram("chunk header too short"));
        }
        if data.get_u8() != TAG_CHUNK {
            return Err(ExportError::MalformedDatagram("not a chunk"));
        }
        Ok(Self {
            sequence: data.get_u32_le(),
            chunk_index: data.get_u32_le(),
            chunk_size: data.get_u32_le(),
        })
    }
}

// ── UdpFrameSink ─────────────────────────────────────────────────

/// Fire-and-forget UDP sender.
///
/// The socket is non-blocking, so a full send buffer drops the
/// remainder of the frame rather than stalling the render loop.
/// Datagrams are built in a scratch buffer that is reused across frames.
pub struct UdpFrameSink {
    socket: std::net::UdpSocket,
    remote_addr: SocketAddr,
    sequence: u32,
    mtu: usize,
    scratch: BytesMut,
    /// Total bytes sent since construction.
    bytes_sent: u64,
    frames_sent: u64,
    frames_dropped: u64,
}

impl UdpFrameSink {
    /// Bind `local` and target `remote_addr`.
    pub fn bind(local: impl ToSocketAddrs, remote_addr: SocketAddr) -> Result<Self, ExportError> {
        Self::new(std::net::UdpSocket::bind(local)?, remote_addr)
    }

    /// Wrap an already-bound socket targeting `remote_addr`.
    pub fn new(socket: std::net::UdpSocket, remote_addr: SocketAddr) -> Result<Self, ExportError> {
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            remote_addr,
            sequence: 0,
            mtu: DEFAULT_MTU,
            scratch: BytesMut::with_capacity(DEFAULT_MTU),
            bytes_sent: 0,
            frames_sent: 0,
            frames_dropped: 0,
        })
    }

    /// Override the effective MTU (must exceed both header sizes).
    pub fn with_mtu(mut self, mtu: usize) -> Result<Self, ExportError> {
        if mtu <= FrameHeader::SIZE.max(ChunkHeader::SIZE + 1) {
            return Err(ExportError::InvalidConfig(format!("mtu {mtu} too small")));
        }
        self.mtu = mtu;
        self.scratch = BytesMut::with_capacity(mtu);
        Ok(self)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    fn send_scratch(&mut self) -> io::Result<()> {
        let sent = self.socket.send_to(&self.scratch, self.remote_addr)?;
        self.bytes_sent += sent as u64;
        Ok(())
    }

    fn send_payload(&mut self, frame: &FrameDescriptor<'_>) -> Result<(), ExportError> {
        let payload = frame.payload();
        let dims = frame.dimensions();
        let chunk_len = self.mtu - ChunkHeader::SIZE;
        let total_chunks = payload.len().div_ceil(chunk_len);
        let too_large = || ExportError::FrameTooLarge {
            width: dims.width,
            height: dims.height,
        };

        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        // 1. Frame header datagram.
        let header = FrameHeader {
            sequence: seq,
            kind: frame.kind(),
            width: dims.width,
            height: dims.height,
            payload_len: u32::try_from(payload.len()).map_err(|_| too_large())?,
            total_chunks: u32::try_from(total_chunks).map_err(|_| too_large())?,
            chunk_len: chunk_len as u32,
        };
        self.scratch.clear();
        header.write_to(&mut self.scratch);
        self.send_scratch()?;

        // 2. Data chunk datagrams.
        for (idx, chunk) in payload.chunks(chunk_len).enumerate() {
            let ch = ChunkHeader {
                sequence: seq,
                chunk_index: idx as u32,
                chunk_size: chunk.len() as u32,
            };
            self.scratch.clear();
            ch.write_to(&mut self.scratch);
            self.scratch.extend_from_slice(chunk);
            self.send_scratch()?;
        }
        Ok(())
    }
}

impl FrameSink for UdpFrameSink {
    fn send_frame(&mut self, frame: &FrameDescriptor<'_>) -> Result<(), ExportError> {
        match self.send_payload(frame) {
            Ok(()) => {
                self.frames_sent += 1;
                Ok(())
            }
            Err(e) => {
                self.frames_dropped += 1;
                Err(e)
            }
        }
    }
}

// ── ReceivedFrame ────────────────────────────────────────────────

/// A frame reassembled by [`FrameReceiver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub sequence: u32,
    pub kind: PayloadKind,
    pub width: u32,
    pub height: u32,
    pub payload: Vec<u8>,
}

impl ReceivedFrame {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// RGBA pixel bytes, decoding text-safe payloads.
    ///
    /// Raw payloads are origin-at-bottom, text-safe ones origin-at-top;
    /// no reorientation is done here.
    pub fn pixels(&self) -> Result<Vec<u8>, ExportError> {
        match self.kind {
            PayloadKind::Raw => Ok(self.payload.clone()),
            PayloadKind::TextSafe => {
                let text = std::str::from_utf8(&self.payload)
                    .map_err(|_| ExportError::MalformedDatagram("text payload is not utf-8"))?;
                decode_text(text)
            }
        }
    }
}

// ── FrameReceiver ────────────────────────────────────────────────

/// In-flight reassembly state for one sequence number.
struct Assembly {
    header: FrameHeader,
    payload: Vec<u8>,
    seen: Vec<bool>,
    remaining: usize,
}

impl Assembly {
    fn new(header: FrameHeader) -> Self {
        let total = header.total_chunks as usize;
        Self {
            header,
            payload: vec![0; header.payload_len as usize],
            seen: vec![false; total],
            remaining: total,
        }
    }

    /// Place a chunk; returns `false` if it does not belong here or its
    /// length is not exactly what the frame header implies.
    fn accept(&mut self, ch: ChunkHeader, data: &[u8]) -> bool {
        let idx = ch.chunk_index as usize;
        if ch.sequence != self.header.sequence || idx >= self.seen.len() || self.seen[idx] {
            return false;
        }
        let chunk_len = self.header.chunk_len as usize;
        let start = idx * chunk_len;
        let expected = if idx + 1 == self.seen.len() {
            self.payload.len().saturating_sub(start)
        } else {
            chunk_len
        };
        if data.len() != expected || ch.chunk_size as usize != expected {
            return false;
        }
        let Some(dst) = self.payload.get_mut(start..start + expected) else {
            return false;
        };
        dst.copy_from_slice(data);
        self.seen[idx] = true;
        self.remaining -= 1;
        true
    }

    fn finish(self) -> ReceivedFrame {
        ReceivedFrame {
            sequence: self.header.sequence,
            kind: self.header.kind,
            width: self.header.width,
            height: self.header.height,
            payload: self.payload,
        }
    }
}

/// Async receiver that reassembles frames sent by [`UdpFrameSink`].
///
/// A frame header for a new sequence abandons any incomplete frame.
/// Stray, duplicate or truncated chunks are dropped. The receive buffer
/// grows to the sender's chunk size announced in each frame header.
pub struct FrameReceiver {
    socket: UdpSocket,
    buf: Vec<u8>,
    frames_abandoned: u64,
}

impl FrameReceiver {
    pub fn new(socket: UdpSocket) -> Self {
        Self::with_mtu(socket, DEFAULT_MTU)
    }

    pub fn with_mtu(socket: UdpSocket, mtu: usize) -> Self {
        Self {
            socket,
            buf: vec![0; mtu.max(FrameHeader::SIZE)],
            frames_abandoned: 0,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Frames that were started but replaced before completion.
    pub fn frames_abandoned(&self) -> u64 {
        self.frames_abandoned
    }

    /// Wait for the next complete frame.
    pub async fn receive_frame(&mut self) -> Result<ReceivedFrame, ExportError> {
        let mut current: Option<Assembly> = None;

        loop {
            let (len, _) = self.socket.recv_from(&mut self.buf).await?;
            let datagram = &self.buf[..len];

            match datagram.first() {
                Some(&TAG_FRAME) => {
                    let Ok(header) = FrameHeader::decode(datagram) else {
                        continue;
                    };
                    if !header.is_consistent() {
                        continue;
                    }
                    let needed = header.chunk_len as usize + ChunkHeader::SIZE;
                    if self.buf.len() < needed {
                        self.buf.resize(needed, 0);
                    }
                    if current.is_some() {
                        self.frames_abandoned += 1;
                    }
                    let assembly = Assembly::new(header);
                    if assembly.remaining == 0 {
                        return Ok(assembly.finish());
                    }
                    current = Some(assembly);
                }
                Some(&TAG_CHUNK) => {
                    let (Some(assembly), Ok(ch)) = (current.as_mut(), ChunkHeader::decode(datagram))
                    else {
                        continue;
                    };
                    if len != ChunkHeader::SIZE + ch.chunk_size as usize {
                        continue;
                    }
                    assembly.accept(ch, &datagram[ChunkHeader::SIZE..]);
                    if assembly.remaining == 0 {
                        if let Some(done) = current.take() {
                            return Ok(done.finish());
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_header_layout() {
        let hdr = FrameHeader {
            sequence: 42,
            kind: PayloadKind::TextSafe,
            width: 1920,
            height: 1080,
            payload_len: 9000,
            total_chunks: 7,
            chunk_len: 1387,
        };

        let mut buf = BytesMut::new();
        hdr.write_to(&mut buf);
        assert_eq!(buf.len(), FrameHeader::SIZE);
        assert_eq!(buf[0], TAG_FRAME);
        assert_eq!(FrameHeader::decode(&buf).unwrap(), hdr);
    }

    #[test]
    fn chunk_header_layout() {
        let ch = ChunkHeader {
            sequence: 7,
            chunk_index: 3,
            chunk_size: 1024,
        };

        let mut buf = BytesMut::new();
        ch.write_to(&mut buf);
        assert_eq!(buf.len(), ChunkHeader::SIZE);
        assert_eq!(ChunkHeader::decode(&buf).unwrap(), ch);
    }

    #[test]
    fn inconsistent_headers_are_flagged() {
        let mut hdr = FrameHeader {
            sequence: 0,
            kind: PayloadKind::Raw,
            width: 10,
            height: 10,
            payload_len: 400,
            total_chunks: 2,
            chunk_len: 200,
        };
        assert!(hdr.is_consistent());
        hdr.total_chunks = 3;
        assert!(!hdr.is_consistent());
        hdr.chunk_len = 0;
        assert!(!hdr.is_consistent());
        hdr = FrameHeader {
            payload_len: u32::MAX,
            total_chunks: u32::MAX.div_ceil(1387),
            chunk_len: 1387,
            ..hdr
        };
        assert!(!hdr.is_consistent());
    }

    #[test]
    fn headers_too_short() {
        assert!(FrameHeader::decode(&[TAG_FRAME; 10]).is_err());
        assert!(ChunkHeader::decode(&[TAG_CHUNK; 4]).is_err());
    }

    #[test]
    fn headers_reject_wrong_tag() {
        let ch = ChunkHeader {
            sequence: 1,
            chunk_index: 0,
            chunk_size: 0,
        };
        let mut buf = BytesMut::new();
        ch.write_to(&mut buf);
        buf.extend_from_slice(&[0; 32]);
        assert!(FrameHeader::decode(&buf).is_err());
    }

    #[test]
    fn assembly_ignores_duplicates_and_strays() {
        let header = FrameHeader {
            sequence: 5,
            kind: PayloadKind::Raw,
            width: 1,
            height: 1,
            payload_len: 6,
            total_chunks: 2,
            chunk_len: 4,
        };
        let mut asm = Assembly::new(header);

        let stray = ChunkHeader {
            sequence: 4,
            chunk_index: 0,
            chunk_size: 4,
        };
        assert!(!asm.accept(stray, &[9; 4]));

        let second = ChunkHeader {
            sequence: 5,
            chunk_index: 1,
            chunk_size: 2,
        };
        assert!(asm.accept(second, &[5, 6]));
        assert!(!asm.accept(second, &[5, 6]));

        let first = ChunkHeader {
            sequence: 5,
            chunk_index: 0,
            chunk_size: 4,
        };
        assert!(asm.accept(first, &[1, 2, 3, 4]));
        assert_eq!(asm.remaining, 0);
        assert_eq!(asm.finish().payload, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn assembly_rejects_short_chunks() {
        let header = FrameHeader {
            sequence: 1,
            kind: PayloadKind::Raw,
            width: 1,
            height: 1,
            payload_len: 10,
            total_chunks: 3,
            chunk_len: 4,
        };
        let mut asm = Assembly::new(header);

        // Middle chunk shorter than chunk_len.
        let short_middle = ChunkHeader {
            sequence: 1,
            chunk_index: 1,
            chunk_size: 2,
        };
        assert!(!asm.accept(short_middle, &[1, 2]));

        // Last chunk must carry exactly the remaining 2 bytes.
        let long_last = ChunkHeader {
            sequence: 1,
            chunk_index: 2,
            chunk_size: 4,
        };
        assert!(!asm.accept(long_last, &[1, 2, 3, 4]));

        // Declared size disagrees with the data.
        let lying = ChunkHeader {
            sequence: 1,
            chunk_index: 0,
            chunk_size: 3,
        };
        assert!(!asm.accept(lying, &[1, 2, 3, 4]));

        assert_eq!(asm.remaining, 3);
    }

    #[test]
    fn oversized_chunk_len_is_inconsistent() {
        let hdr = FrameHeader {
            sequence: 0,
            kind: PayloadKind::Raw,
            width: 1,
            height: 1,
            payload_len: 100_000,
            total_chunks: 1,
            chunk_len: 100_000,
        };
        assert!(!hdr.is_consistent());
    }

    #[tokio::test]
    async fn receiver_with_smaller_mtu_gets_intact_frame() {
        let receiver_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver_addr = receiver_sock.local_addr().unwrap();

        // Sender uses the default 1400-byte MTU, receiver starts at 256.
        let mut sink = UdpFrameSink::bind("127.0.0.1:0", receiver_addr).unwrap();
        let mut receiver = FrameReceiver::with_mtu(receiver_sock, 256);

        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8 + 1).collect();
        let frame = FrameDescriptor::Raw {
            data: &data,
            width: 25,
            height: 50,
        };
        sink.send_frame(&frame).unwrap();

        let received = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            receiver.receive_frame(),
        )
        .await
        .expect("timeout")
        .unwrap();
        assert_eq!(received.payload.len(), 5000);
        assert!(received.payload.iter().all(|&b| b != 0));
        assert_eq!(received.payload, data);
    }

    #[tokio::test]
    async fn udp_sink_to_receiver() {
        let receiver_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver_addr = receiver_sock.local_addr().unwrap();

        let mut sink = UdpFrameSink::bind("127.0.0.1:0", receiver_addr).unwrap();
        let mut receiver = FrameReceiver::new(receiver_sock);

        // Several chunks, last one partial.
        let data: Vec<u8> = (0..5000u32).map(|i| i as u8).collect();
        let frame = FrameDescriptor::Raw {
            data: &data,
            width: 25,
            height: 50,
        };

        sink.send_frame(&frame).unwrap();
        let recv = tokio::spawn(async move { receiver.receive_frame().await.unwrap() });

        let received = recv.await.unwrap();
        assert_eq!(received.sequence, 0);
        assert_eq!(received.kind, PayloadKind::Raw);
        assert_eq!(received.dimensions(), Dimensions::new(25, 50));
        assert_eq!(received.payload, data);
        assert_eq!(sink.frames_sent(), 1);
        assert!(sink.bytes_sent() > 5000);
    }

    #[tokio::test]
    async fn text_safe_frames_decode_on_receipt() {
        let receiver_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver_addr = receiver_sock.local_addr().unwrap();

        let mut sink = UdpFrameSink::bind("127.0.0.1:0", receiver_addr)
            .unwrap()
            .with_mtu(256)
            .unwrap();
        let mut receiver = FrameReceiver::with_mtu(receiver_sock, 256);

        let pixels = vec![0x7Fu8; 2 * 2 * 4];
        let mut text = String::new();
        crate::encoder::encode_chunked(&pixels, &mut text);
        let frame = FrameDescriptor::TextSafe {
            encoded: &text,
            width: 2,
            height: 2,
        };

        sink.send_frame(&frame).unwrap();
        let recv = tokio::spawn(async move { receiver.receive_frame().await.unwrap() });

        let received = recv.await.unwrap();
        assert_eq!(received.kind, PayloadKind::TextSafe);
        assert_eq!(received.pixels().unwrap(), pixels);
    }

    #[test]
    fn tiny_mtu_is_rejected() {
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let sink = UdpFrameSink::bind("127.0.0.1:0", addr).unwrap();
        assert!(sink.with_mtu(8).is_err());
    }
}
