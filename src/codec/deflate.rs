//! Raw deflate framing with manual buffer chunking.
//!
//! Payloads are compressed without a zlib header. Output is drained through a fixed-size
//! scratch buffer: every full drain is copied into a chunk list, and once the compressor
//! reports the end of the stream the partially filled scratch buffer itself is handed to
//! [`fuse`] as the final chunk, which copies exactly the bytes that belong to the output.
//!
//! Input is fed with [`FlushCompress::Sync`] so the compressor emits complete output for
//! everything it has seen without waiting for the end of input; the stream is terminated with
//! a final block once all input is consumed. Decoding accepts streams that end on a sync flush
//! without a final block.
//!
//! A [`Workspace`] owns the scratch buffer, the chunk list and the (de)compressor objects. The
//! concurrency strategy of a codec decides whether a workspace lives for one call or for the
//! lifetime of the codec.
use std::fmt;

use bytes::Bytes;
use flate2::{Compress, Decompress, FlushCompress, FlushDecompress, Status};
use log::trace;

use crate::error::CompressionError;

/// Scratch buffer size of codecs that allocate per call.
pub const REENTRANT_BUFFER_SIZE: usize = 1024;
/// Scratch buffer size of codecs that keep their workspace across calls.
pub const SINGLE_OWNER_BUFFER_SIZE: usize = 1024 * 1024;

pub struct Workspace {
    buffer_size: usize,
    buffer: Vec<u8>,
    chunks: Vec<Vec<u8>>,
    deflater: Option<(flate2::Compression, Compress)>,
    inflater: Option<Decompress>,
}

impl Workspace {
    /// Creates a workspace; the scratch buffer is allocated on first use.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(REENTRANT_BUFFER_SIZE),
            buffer: Vec::new(),
            chunks: Vec::new(),
            deflater: None,
            inflater: None,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of chunks waiting to be fused. Always zero between calls.
    pub fn pending_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub(crate) fn clear(&mut self) {
        self.chunks.clear();
    }

    fn prepare(&mut self) {
        if self.buffer.len() != self.buffer_size {
            self.buffer = vec![0; self.buffer_size];
        }
        self.chunks.clear();
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("buffer_size", &self.buffer_size)
            .field("allocated", &!self.buffer.is_empty())
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

/// Compresses `input` as a raw deflate stream.
pub fn deflate(
    input: &[u8],
    level: flate2::Compression,
    workspace: &mut Workspace,
) -> Result<Bytes, CompressionError> {
    workspace.prepare();
    let Workspace {
        buffer,
        chunks,
        deflater,
        ..
    } = workspace;

    let mut compress = match deflater.take() {
        Some((current, mut compress)) if current == level => {
            compress.reset();
            compress
        }
        _ => Compress::new(level, false),
    };

    let mut consumed = 0;
    let mut total = 0;
    loop {
        let (in_before, out_before) = (compress.total_in(), compress.total_out());
        let flush = if consumed < input.len() {
            FlushCompress::Sync
        } else {
            FlushCompress::Finish
        };

        let status = compress.compress(&input[consumed..], buffer, flush)?;
        let read = (compress.total_in() - in_before) as usize;
        let produced = (compress.total_out() - out_before) as usize;
        consumed += read;
        total += produced;

        if status == Status::StreamEnd {
            // final drain stays in the scratch buffer, fuse truncates it
            break;
        }
        if read == 0 && produced == 0 {
            return Err(CompressionError::Stalled {
                consumed,
                total: input.len(),
            });
        }
        if produced > 0 {
            chunks.push(buffer[..produced].to_vec());
        }
    }

    trace!(
        "deflated {} bytes into {total} bytes over {} chunks",
        input.len(),
        chunks.len() + 1
    );
    let fused = fuse(chunks, buffer, total);
    *deflater = Some((level, compress));
    Ok(fused)
}

/// Decompresses a raw deflate stream.
pub fn inflate(input: &[u8], workspace: &mut Workspace) -> Result<Bytes, CompressionError> {
    workspace.prepare();
    let Workspace {
        buffer,
        chunks,
        inflater,
        ..
    } = workspace;

    let mut decompress = match inflater.take() {
        Some(mut decompress) => {
            decompress.reset(false);
            decompress
        }
        None => Decompress::new(false),
    };

    let mut consumed = 0;
    let mut total = 0;
    let finished = loop {
        let (in_before, out_before) = (decompress.total_in(), decompress.total_out());
        let status = decompress.decompress(&input[consumed..], buffer, FlushDecompress::None)?;
        let read = (decompress.total_in() - in_before) as usize;
        let produced = (decompress.total_out() - out_before) as usize;
        consumed += read;
        total += produced;

        if produced > 0 {
            chunks.push(buffer[..produced].to_vec());
        }
        if status == Status::StreamEnd {
            break true;
        }
        if read == 0 && produced == 0 {
            break false;
        }
    };

    if consumed < input.len() {
        chunks.clear();
        return Err(if finished {
            CompressionError::TrailingData(input.len() - consumed)
        } else {
            CompressionError::Stalled {
                consumed,
                total: input.len(),
            }
        });
    }

    trace!("inflated {} bytes into {total} bytes", input.len());
    let fused = fuse(chunks, &[], total);
    *inflater = Some(decompress);
    Ok(fused)
}

/// Joins `chunks` followed by `tail` into one read-only buffer of exactly `length` bytes.
///
/// Whatever exceeds `length` is cut off, which lets callers pass a partially filled scratch
/// buffer as `tail` without copying it first. The chunk list is empty afterwards.
pub fn fuse(chunks: &mut Vec<Vec<u8>>, tail: &[u8], length: usize) -> Bytes {
    let mut fused = Vec::with_capacity(length);

    for chunk in chunks.iter().map(Vec::as_slice).chain(std::iter::once(tail)) {
        let remaining = length - fused.len();
        if chunk.len() > remaining {
            fused.extend_from_slice(&chunk[..remaining]);
        } else {
            fused.extend_from_slice(chunk);
        }
    }

    chunks.clear();
    Bytes::from(fused)
}

/// Compresses with a throwaway workspace.
pub fn compress(input: &[u8], level: flate2::Compression) -> Result<Bytes, CompressionError> {
    deflate(input, level, &mut Workspace::new(REENTRANT_BUFFER_SIZE))
}

/// Decompresses with a throwaway workspace.
pub fn decompress(input: &[u8]) -> Result<Bytes, CompressionError> {
    inflate(input, &mut Workspace::new(REENTRANT_BUFFER_SIZE))
}
