//! RIFF/WAVE header parsing.

use std::io::{Read, Seek, SeekFrom};

use crate::error::PreviewError;

const FORMAT_PCM: u16 = 0x0001;
const FORMAT_IEEE_FLOAT: u16 = 0x0003;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Bytes of a `fmt ` chunk that are ever inspected; the rest is skipped.
const FMT_READ_LIMIT: usize = 64;

/// Sample encoding declared by the `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    Pcm,
    Float,
}

/// Format and payload location of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub encoding: SampleEncoding,
    /// Absolute byte offset of the first sample.
    pub data_offset: u64,
    /// Payload length in bytes, always a whole number of frames.
    pub data_len: u64,
}

impl WavInfo {
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample as usize + 7) / 8
    }

    pub fn frame_bytes(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    pub fn total_frames(&self) -> u64 {
        self.data_len / self.frame_bytes() as u64
    }

    pub fn duration_seconds(&self) -> f64 {
        self.total_frames() as f64 / self.sample_rate as f64
    }

    /// True for the only layout the preview mixer accepts: 16-bit integer PCM.
    pub fn is_pcm16(&self) -> bool {
        self.encoding == SampleEncoding::Pcm && self.bits_per_sample == 16
    }
}

#[derive(Debug, Clone, Copy)]
struct FmtChunk {
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

/// Parse a RIFF/WAVE header from `reader`.
///
/// Chunks may appear in any order; unknown chunks are skipped by their
/// declared length (plus the pad byte for odd sizes). The returned data
/// length is clamped to the bytes actually present and truncated to whole
/// frames.
///
/// # Errors
/// `InvalidFormat` for malformed containers or an empty payload,
/// `Unsupported` for encodings or channel layouts outside 1-2 channel
/// integer PCM / IEEE float.
pub fn read_wav_info<R: Read + Seek>(reader: &mut R) -> Result<WavInfo, PreviewError> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let mut header = [0u8; 12];
    reader
        .read_exact(&mut header)
        .map_err(|_| PreviewError::InvalidFormat("file shorter than riff header".to_string()))?;
    if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return Err(PreviewError::InvalidFormat("missing RIFF/WAVE signature".to_string()));
    }

    let mut fmt: Option<FmtChunk> = None;
    let mut data: Option<(u64, u64)> = None;
    let mut position = 12u64;

    while fmt.is_none() || data.is_none() {
        let mut chunk_header = [0u8; 8];
        if reader.read_exact(&mut chunk_header).is_err() {
            break;
        }
        position += 8;
        let chunk_id = &chunk_header[0..4];
        let chunk_size = u32::from_le_bytes([
            chunk_header[4],
            chunk_header[5],
            chunk_header[6],
            chunk_header[7],
        ]) as u64;

        if chunk_id == b"fmt " {
            if chunk_size < 16 {
                return Err(PreviewError::InvalidFormat(format!(
                    "fmt chunk too small ({} bytes)",
                    chunk_size
                )));
            }
            if chunk_size > file_len.saturating_sub(position) {
                return Err(PreviewError::InvalidFormat(format!(
                    "fmt chunk declares {} bytes past the end of the file",
                    chunk_size
                )));
            }
            let mut body = [0u8; FMT_READ_LIMIT];
            let body = &mut body[..(chunk_size as usize).min(FMT_READ_LIMIT)];
            reader
                .read_exact(body)
                .map_err(|_| PreviewError::InvalidFormat("truncated fmt chunk".to_string()))?;
            fmt = Some(parse_fmt(body));
            position += chunk_size + (chunk_size % 2);
            if position >= file_len {
                break;
            }
            reader.seek(SeekFrom::Start(position))?;
            continue;
        }

        if chunk_id == b"data" {
            let available = file_len.saturating_sub(position);
            data = Some((position, chunk_size.min(available)));
        }

        let skip = chunk_size + (chunk_size % 2);
        position += skip;
        if position >= file_len {
            break;
        }
        reader.seek(SeekFrom::Start(position))?;
    }

    let fmt = fmt.ok_or_else(|| PreviewError::InvalidFormat("missing fmt chunk".to_string()))?;
    let (data_offset, data_len) =
        data.ok_or_else(|| PreviewError::InvalidFormat("missing data chunk".to_string()))?;

    let encoding = match fmt.format_tag {
        FORMAT_PCM => SampleEncoding::Pcm,
        FORMAT_IEEE_FLOAT => SampleEncoding::Float,
        other => {
            return Err(PreviewError::Unsupported(format!(
                "wav format tag {:#06x}",
                other
            )))
        }
    };
    if fmt.channels == 0 || fmt.channels > 2 {
        return Err(PreviewError::Unsupported(format!(
            "{} channel source",
            fmt.channels
        )));
    }
    if fmt.sample_rate == 0 || fmt.bits_per_sample == 0 {
        return Err(PreviewError::InvalidFormat(
            "zero sample rate or bit depth".to_string(),
        ));
    }

    let mut info = WavInfo {
        sample_rate: fmt.sample_rate,
        channels: fmt.channels,
        bits_per_sample: fmt.bits_per_sample,
        encoding,
        data_offset,
        data_len,
    };
    let frame_bytes = info.frame_bytes() as u64;
    info.data_len -= info.data_len % frame_bytes;
    if info.data_len == 0 {
        return Err(PreviewError::InvalidFormat("empty data chunk".to_string()));
    }

    Ok(info)
}

fn parse_fmt(body: &[u8]) -> FmtChunk {
    let mut format_tag = u16::from_le_bytes([body[0], body[1]]);
    // WAVE_FORMAT_EXTENSIBLE carries the real tag at the start of the sub-format GUID.
    if format_tag == FORMAT_EXTENSIBLE && body.len() >= 26 {
        format_tag = u16::from_le_bytes([body[24], body[25]]);
    }
    FmtChunk {
        format_tag,
        channels: u16::from_le_bytes([body[2], body[3]]),
        sample_rate: u32::from_le_bytes([body[4], body[5], body[6], body[7]]),
        bits_per_sample: u16::from_le_bytes([body[14], body[15]]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn fmt_chunk(format_tag: u16, channels: u16, sample_rate: u32, bits: u16) -> Vec<u8> {
        let block_align = channels * ((bits + 7) / 8);
        let mut chunk = Vec::new();
        chunk.extend_from_slice(b"fmt ");
        chunk.extend_from_slice(&16u32.to_le_bytes());
        chunk.extend_from_slice(&format_tag.to_le_bytes());
        chunk.extend_from_slice(&channels.to_le_bytes());
        chunk.extend_from_slice(&sample_rate.to_le_bytes());
        chunk.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        chunk.extend_from_slice(&block_align.to_le_bytes());
        chunk.extend_from_slice(&bits.to_le_bytes());
        chunk
    }

    fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut chunk = Vec::new();
        chunk.extend_from_slice(id);
        chunk.extend_from_slice(&(body.len() as u32).to_le_bytes());
        chunk.extend_from_slice(body);
        if body.len() % 2 == 1 {
            chunk.push(0);
        }
        chunk
    }

    fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut file = Vec::new();
        file.extend_from_slice(b"RIFF");
        file.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
        file.extend_from_slice(b"WAVE");
        file.extend_from_slice(&body);
        file
    }

    #[test]
    fn parses_canonical_header() {
        let bytes = riff(&[fmt_chunk(1, 2, 44_100, 16), chunk(b"data", &[0u8; 16])]);
        let info = read_wav_info(&mut Cursor::new(bytes)).expect("parse");
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.encoding, SampleEncoding::Pcm);
        assert_eq!(info.data_offset, 44);
        assert_eq!(info.data_len, 16);
        assert_eq!(info.total_frames(), 4);
        assert!(info.is_pcm16());
    }

    #[test]
    fn skips_unknown_chunks_with_odd_padding() {
        let bytes = riff(&[
            chunk(b"LIST", &[1, 2, 3]),
            fmt_chunk(1, 1, 8_000, 16),
            chunk(b"junk", &[0u8; 10]),
            chunk(b"data", &[0u8; 8]),
        ]);
        let info = read_wav_info(&mut Cursor::new(bytes)).expect("parse");
        assert_eq!(info.channels, 1);
        assert_eq!(info.data_offset, 12 + 12 + 24 + 18 + 8);
        assert_eq!(info.data_len, 8);
    }

    #[test]
    fn accepts_data_before_fmt() {
        let bytes = riff(&[chunk(b"data", &[0u8; 12]), fmt_chunk(3, 1, 48_000, 32)]);
        let info = read_wav_info(&mut Cursor::new(bytes)).expect("parse");
        assert_eq!(info.encoding, SampleEncoding::Float);
        assert_eq!(info.data_offset, 20);
        assert_eq!(info.data_len, 12);
    }

    #[test]
    fn clamps_oversized_data_chunk_and_truncates_partial_frame() {
        let mut bytes = riff(&[fmt_chunk(1, 2, 44_100, 16)]);
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 10]);
        let info = read_wav_info(&mut Cursor::new(bytes)).expect("parse");
        assert_eq!(info.data_len, 8);
    }

    #[test]
    fn rejects_bad_signature_and_empty_data() {
        let mut bytes = riff(&[fmt_chunk(1, 1, 8_000, 16), chunk(b"data", &[0u8; 4])]);
        bytes[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(
            read_wav_info(&mut Cursor::new(bytes)),
            Err(PreviewError::InvalidFormat(_))
        ));

        let bytes = riff(&[fmt_chunk(1, 1, 8_000, 16), chunk(b"data", &[])]);
        assert!(matches!(
            read_wav_info(&mut Cursor::new(bytes)),
            Err(PreviewError::InvalidFormat(_))
        ));
    }

    #[test]
    fn rejects_compressed_and_multichannel_sources() {
        let bytes = riff(&[fmt_chunk(2, 1, 8_000, 4), chunk(b"data", &[0u8; 4])]);
        assert!(matches!(
            read_wav_info(&mut Cursor::new(bytes)),
            Err(PreviewError::Unsupported(_))
        ));

        let bytes = riff(&[fmt_chunk(1, 6, 8_000, 16), chunk(b"data", &[0u8; 12])]);
        assert!(matches!(
            read_wav_info(&mut Cursor::new(bytes)),
            Err(PreviewError::Unsupported(_))
        ));
    }

    #[test]
    fn rejects_fmt_chunk_larger_than_the_file() {
        let mut fmt = fmt_chunk(1, 1, 8_000, 16);
        fmt[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        let bytes = riff(&[fmt, chunk(b"data", &[0u8; 4])]);
        assert!(matches!(
            read_wav_info(&mut Cursor::new(bytes)),
            Err(PreviewError::InvalidFormat(_))
        ));
    }

    #[test]
    fn skips_the_tail_of_an_oversized_fmt_chunk() {
        let mut body = fmt_chunk(1, 2, 22_050, 16)[8..].to_vec();
        body.extend_from_slice(&[0xAB; 101]);
        let bytes = riff(&[chunk(b"fmt ", &body), chunk(b"data", &[0u8; 8])]);
        let info = read_wav_info(&mut Cursor::new(bytes)).expect("parse");
        assert_eq!(info.sample_rate, 22_050);
        assert_eq!(info.channels, 2);
        assert_eq!(info.data_offset, 12 + 8 + 118 + 8);
        assert_eq!(info.data_len, 8);
    }

    #[test]
    fn resolves_extensible_sub_format() {
        let mut body = Vec::new();
        body.extend_from_slice(&FORMAT_EXTENSIBLE.to_le_bytes());
        body.extend_from_slice(&2u16.to_le_bytes());
        body.extend_from_slice(&48_000u32.to_le_bytes());
        body.extend_from_slice(&(48_000u32 * 6).to_le_bytes());
        body.extend_from_slice(&6u16.to_le_bytes());
        body.extend_from_slice(&24u16.to_le_bytes());
        body.extend_from_slice(&22u16.to_le_bytes());
        body.extend_from_slice(&24u16.to_le_bytes());
        body.extend_from_slice(&3u32.to_le_bytes());
        body.extend_from_slice(&FORMAT_PCM.to_le_bytes());
        body.extend_from_slice(&[0u8; 14]);
        let bytes = riff(&[chunk(b"fmt ", &body), chunk(b"data", &[0u8; 12])]);
        let info = read_wav_info(&mut Cursor::new(bytes)).expect("parse");
        assert_eq!(info.encoding, SampleEncoding::Pcm);
        assert_eq!(info.bits_per_sample, 24);
        assert_eq!(info.frame_bytes(), 6);
    }
}
