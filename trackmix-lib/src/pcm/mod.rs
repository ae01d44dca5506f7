//! Sequential, seekable readers over the PCM payload of WAV files.

mod convert;
mod header;

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::PreviewError;

pub use convert::{decode_i16_into, is_normalizable, normalized_sample};
pub use header::{read_wav_info, SampleEncoding, WavInfo};

/// Frame cursor over the `data` chunk of a WAV file.
///
/// Reads never cross the end of the data chunk, so trailing metadata
/// chunks are never interpreted as audio.
#[derive(Debug)]
pub struct PcmSource {
    info: WavInfo,
    reader: BufReader<File>,
    position: u64,
}

impl PcmSource {
    /// Open `path`, parse its header and position the cursor on the first frame.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PreviewError> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let info = read_wav_info(&mut reader)?;
        reader.seek(SeekFrom::Start(info.data_offset))?;
        Ok(Self {
            info,
            reader,
            position: 0,
        })
    }

    pub fn info(&self) -> &WavInfo {
        &self.info
    }

    /// Byte offset of the cursor relative to the start of the payload.
    pub fn position_bytes(&self) -> u64 {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.info.data_len
    }

    /// Read up to `buf.len()` bytes of whole frames.
    ///
    /// Returns the number of bytes read; `0` means end of stream.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, PreviewError> {
        let frame_bytes = self.info.frame_bytes();
        let remaining = self.info.data_len.saturating_sub(self.position);
        let wanted = (buf.len() as u64).min(remaining) as usize;
        let wanted = wanted - wanted % frame_bytes;

        let mut filled = 0;
        while filled < wanted {
            match self.reader.read(&mut buf[filled..wanted]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }

        let whole = filled - filled % frame_bytes;
        self.position += whole as u64;
        if whole != filled {
            self.reader
                .seek(SeekFrom::Start(self.info.data_offset + self.position))?;
        }
        Ok(whole)
    }

    /// Move the cursor to `offset` bytes into the payload.
    ///
    /// The offset is aligned down to a frame boundary and clamped to the
    /// payload length.
    pub fn seek_to_byte_offset(&mut self, offset: u64) -> Result<(), PreviewError> {
        let frame_bytes = self.info.frame_bytes() as u64;
        let offset = offset.min(self.info.data_len);
        let offset = offset - offset % frame_bytes;
        self.reader
            .seek(SeekFrom::Start(self.info.data_offset + offset))?;
        self.position = offset;
        Ok(())
    }

    /// Step the cursor back by `frames`, stopping at the first frame.
    pub fn rewind_frames(&mut self, frames: u64) -> Result<(), PreviewError> {
        let back = frames.saturating_mul(self.info.frame_bytes() as u64);
        self.seek_to_byte_offset(self.position.saturating_sub(back))
    }
}
