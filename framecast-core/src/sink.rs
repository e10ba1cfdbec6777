//! The transport boundary.
//!
//! A [`FrameSink`] receives each exported [`FrameDescriptor`] exactly
//! once. Hand-off is fire-and-forget: the pipeline never retries and
//! never waits for an acknowledgement.

use std::io::{self, Write};
use std::thread;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::error::ExportError;
use crate::types::FrameDescriptor;

/// Consumer of exported frames.
pub trait FrameSink {
    /// Deliver one frame. Must not block; drop the frame instead.
    fn send_frame(&mut self, frame: &FrameDescriptor<'_>) -> Result<(), ExportError>;
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn send_frame(&mut self, frame: &FrameDescriptor<'_>) -> Result<(), ExportError> {
        (**self).send_frame(frame)
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn send_frame(&mut self, frame: &FrameDescriptor<'_>) -> Result<(), ExportError> {
        (**self).send_frame(frame)
    }
}

// ── JsonLineSink ─────────────────────────────────────────────────

/// One text-safe frame as written by [`JsonLineSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFrameLine<'a> {
    #[serde(borrow)]
    pub encoded: std::borrow::Cow<'a, str>,
    pub width: u32,
    pub height: u32,
}

/// Lines that may wait for the writer thread.
const LINE_QUEUE_DEPTH: usize = 1;

/// Writes text-safe frames as newline-delimited JSON.
///
/// Intended for a pipe to another process. Serialization happens on the
/// caller; the blocking write happens on a dedicated thread. When the
/// writer falls behind and the queue is full, the frame is dropped with
/// [`ExportError::SinkBusy`]. Raw frames are refused.
///
/// Line buffers travel back from the writer thread and are reused, so a
/// steady stream of equally sized frames does not allocate.
pub struct JsonLineSink<W> {
    lines: mpsc::Sender<Vec<u8>>,
    recycled: mpsc::Receiver<Vec<u8>>,
    spare: Option<Vec<u8>>,
    writer: Option<thread::JoinHandle<io::Result<W>>>,
    lines_queued: u64,
}

impl<W: Write + Send + 'static> JsonLineSink<W> {
    /// Start the writer thread.
    pub fn spawn(writer: W) -> Result<Self, ExportError> {
        let (lines, queue) = mpsc::channel(LINE_QUEUE_DEPTH);
        let (recycle, recycled) = mpsc::channel(LINE_QUEUE_DEPTH + 1);
        let handle = thread::Builder::new()
            .name("framecast-json-writer".into())
            .spawn(move || write_lines(writer, queue, recycle))?;
        Ok(Self {
            lines,
            recycled,
            spare: None,
            writer: Some(handle),
            lines_queued: 0,
        })
    }
}

impl<W> JsonLineSink<W> {
    /// Lines handed to the writer thread so far.
    pub fn lines_queued(&self) -> u64 {
        self.lines_queued
    }

    /// Flush every queued line, stop the writer thread, and return the
    /// writer. Blocks until the thread exits.
    pub fn close(mut self) -> Result<W, ExportError> {
        let handle = self.writer.take();
        drop(self);
        match handle {
            Some(handle) => handle
                .join()
                .map_err(|_| io::Error::other("json writer thread panicked"))?
                .map_err(ExportError::from),
            None => Err(io::Error::other("json writer already closed").into()),
        }
    }

    fn line_buffer(&mut self) -> Vec<u8> {
        let mut buf = self
            .spare
            .take()
            .or_else(|| self.recycled.try_recv().ok())
            .unwrap_or_default();
        buf.clear();
        buf
    }
}

impl<W> FrameSink for JsonLineSink<W> {
    fn send_frame(&mut self, frame: &FrameDescriptor<'_>) -> Result<(), ExportError> {
        let FrameDescriptor::TextSafe {
            encoded,
            width,
            height,
        } = *frame
        else {
            return Err(ExportError::UnsupportedPayload(frame.kind().as_str()));
        };

        let line = TextFrameLine {
            encoded: encoded.into(),
            width,
            height,
        };
        let mut buf = self.line_buffer();
        serde_json::to_writer(&mut buf, &line)?;
        buf.push(b'\n');

        match self.lines.try_send(buf) {
            Ok(()) => {
                self.lines_queued += 1;
                Ok(())
            }
            Err(TrySendError::Full(buf)) => {
                self.spare = Some(buf);
                Err(ExportError::SinkBusy)
            }
            Err(TrySendError::Closed(_)) => Err(io::Error::from(io::ErrorKind::BrokenPipe).into()),
        }
    }
}

/// Writer thread body: drain lines until the sink is dropped.
fn write_lines<W: Write>(
    mut writer: W,
    mut queue: mpsc::Receiver<Vec<u8>>,
    recycle: mpsc::Sender<Vec<u8>>,
) -> io::Result<W> {
    while let Some(line) = queue.blocking_recv() {
        if let Err(e) = writer.write_all(&line).and_then(|()| writer.flush()) {
            warn!("json line writer stopped: {e}");
            return Err(e);
        }
        let _ = recycle.try_send(line);
    }
    Ok(writer)
}

// ── NullSink ─────────────────────────────────────────────────────

/// Accepts and discards every frame, counting them.
#[derive(Debug, Default)]
pub struct NullSink {
    frames: u64,
    bytes: u64,
}

impl NullSink {
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl FrameSink for NullSink {
    fn send_frame(&mut self, frame: &FrameDescriptor<'_>) -> Result<(), ExportError> {
        self.frames += 1;
        self.bytes += frame.payload().len() as u64;
        Ok(())
    }
}
