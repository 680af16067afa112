//! Pull-based readers over a streamed console body.

use std::collections::VecDeque;
use std::io;
use std::io::Read;

use suitedeck_core::classify_frame;
use suitedeck_core::LineAssembler;
use suitedeck_core::RuntimeAction;
use suitedeck_core::StreamFrame;

/// Yields raw chunks as the transport delivers them. Finite; stops after the
/// first error or end of body.
pub struct ChunkSource<R> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
}

impl<R: Read> ChunkSource<R> {
    pub fn new(reader: R, chunk_bytes: usize) -> Self {
        Self {
            reader,
            buf: vec![0; chunk_bytes.max(1)],
            done: false,
        }
    }
}

impl<R: Read> Iterator for ChunkSource<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.reader.read(&mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(n) => return Some(Ok(self.buf[..n].to_vec())),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Lazily classified frames. The unterminated tail is yielded once the body ends.
pub struct FrameStream<R> {
    chunks: ChunkSource<R>,
    assembler: LineAssembler,
    ready: VecDeque<String>,
    finished: bool,
}

impl<R: Read> FrameStream<R> {
    pub fn new(reader: R, chunk_bytes: usize) -> Self {
        Self {
            chunks: ChunkSource::new(reader, chunk_bytes),
            assembler: LineAssembler::new(),
            ready: VecDeque::new(),
            finished: false,
        }
    }
}

impl<R: Read> Iterator for FrameStream<R> {
    type Item = io::Result<StreamFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(Ok(classify_frame(&line)));
            }
            if self.finished {
                return None;
            }
            match self.chunks.next() {
                Some(Ok(chunk)) => self.ready.extend(self.assembler.push(&chunk)),
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                None => {
                    self.finished = true;
                    self.ready.extend(self.assembler.finish());
                }
            }
        }
    }
}

/// Forwards every chunk of `reader` as runtime actions, ending with
/// `StreamEnded` or `StreamFailed`. Returns the bytes forwarded.
pub fn pump<R, F>(reader: R, chunk_bytes: usize, mut emit: F) -> u64
where
    R: Read,
    F: FnMut(RuntimeAction),
{
    let mut forwarded = 0_u64;
    for chunk in ChunkSource::new(reader, chunk_bytes) {
        match chunk {
            Ok(bytes) => {
                forwarded += bytes.len() as u64;
                emit(RuntimeAction::StreamChunkReceived(bytes));
            }
            Err(err) => {
                tracing::warn!(%err, forwarded, "console stream read failed");
                emit(RuntimeAction::StreamFailed(err.to_string()));
                return forwarded;
            }
        }
    }
    tracing::debug!(forwarded, "console stream ended");
    emit(RuntimeAction::StreamEnded);
    forwarded
}
