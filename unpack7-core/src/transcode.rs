//! Conversion of archive entry names from UTF-16 code units to narrow bytes.

use crate::buffer::{AllocError, GrowBuffer};

/// Lead-byte bias for a UTF-8 sequence, indexed by continuation byte count - 1.
const UTF8_LIMITS: [u8; 5] = [0xC0, 0xE0, 0xF0, 0xF8, 0xFC];

/// Byte written in place of code points a narrow charset cannot represent.
pub const DEFAULT_CHAR: u8 = b'_';

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("unpaired surrogate at code unit {position}")]
    UnpairedSurrogate { position: usize },

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error("narrow conversion did not fit its buffer")]
    Overflow,
}

/// Target encoding for decoded names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Charset {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl std::str::FromStr for Charset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Charset::Utf8),
            "ascii" | "us-ascii" => Ok(Charset::Ascii),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Charset::Latin1),
            _ => Err(format!("unknown charset: {}", s)),
        }
    }
}

/// A platform-style wide-to-narrow conversion.
///
/// Writes at most `dest.len()` bytes, substituting `default_char` for code
/// points it cannot represent, and returns the number of bytes written.
/// Filling `dest` completely is read as truncation by the caller.
pub trait WideToNarrow {
    fn convert(&self, src: &[u16], dest: &mut [u8], default_char: u8) -> usize;
}

/// Single-byte charset whose code points map to themselves below a ceiling.
#[derive(Debug, Clone, Copy)]
struct SingleByte {
    ceiling: u32,
}

impl WideToNarrow for SingleByte {
    fn convert(&self, src: &[u16], dest: &mut [u8], default_char: u8) -> usize {
        let mut written = 0;
        for c in char::decode_utf16(src.iter().copied()) {
            if written == dest.len() {
                break;
            }
            dest[written] = match c {
                Ok(c) if (c as u32) < self.ceiling => c as u8,
                _ => default_char,
            };
            written += 1;
        }
        written
    }
}

struct Sink<'a> {
    dest: Option<&'a mut [u8]>,
    pos: usize,
}

impl Sink<'_> {
    #[inline(always)]
    fn push(&mut self, byte: u8) {
        if let Some(dest) = self.dest.as_deref_mut() {
            dest[self.pos] = byte;
        }
        self.pos += 1;
    }
}

/// Encodes `src` as UTF-8 into `dest`, or only measures it when `dest` is
/// `None`. Returns the encoded length, without a terminator.
pub fn utf16_to_utf8(dest: Option<&mut [u8]>, src: &[u16]) -> Result<usize, TranscodeError> {
    let mut sink = Sink { dest, pos: 0 };
    let mut i = 0;

    while i < src.len() {
        let position = i;
        let mut value = u32::from(src[i]);
        i += 1;

        if value < 0x80 {
            sink.push(value as u8);
            continue;
        }

        if (0xD800..0xE000).contains(&value) {
            if value >= 0xDC00 || i == src.len() {
                return Err(TranscodeError::UnpairedSurrogate { position });
            }
            let low = u32::from(src[i]);
            if !(0xDC00..0xE000).contains(&low) {
                return Err(TranscodeError::UnpairedSurrogate { position });
            }
            i += 1;
            value = (((value - 0xD800) << 10) | (low - 0xDC00)) + 0x10000;
        }

        let mut adds = 1;
        while adds < 5 && value >= 1 << (adds * 5 + 6) {
            adds += 1;
        }

        sink.push(UTF8_LIMITS[adds - 1] + (value >> (6 * adds)) as u8);
        while adds != 0 {
            adds -= 1;
            sink.push(0x80 | ((value >> (6 * adds)) & 0x3F) as u8);
        }
    }

    Ok(sink.pos)
}

enum Mode {
    Utf8,
    Narrow(Box<dyn WideToNarrow>),
}

/// Converts names into a NUL-terminated byte buffer that is reused between
/// calls.
pub struct Transcoder {
    mode: Mode,
    buf: GrowBuffer<u8>,
    len: usize,
}

impl std::fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcoder")
            .field("utf8", &matches!(self.mode, Mode::Utf8))
            .field("buf", &self.buf)
            .field("len", &self.len)
            .finish()
    }
}

impl Transcoder {
    pub fn new(charset: Charset) -> Transcoder {
        match charset {
            Charset::Utf8 => Self::with_mode(Mode::Utf8),
            Charset::Ascii => Self::with_codec(SingleByte { ceiling: 0x80 }),
            Charset::Latin1 => Self::with_codec(SingleByte { ceiling: 0x100 }),
        }
    }

    pub fn with_codec<C: WideToNarrow + 'static>(codec: C) -> Transcoder {
        Self::with_mode(Mode::Narrow(Box::new(codec)))
    }

    fn with_mode(mode: Mode) -> Transcoder {
        Transcoder {
            mode,
            buf: GrowBuffer::new(),
            len: 0,
        }
    }

    /// Transcodes `units`, which are read up to the first NUL, and returns the
    /// bytes without their terminator. The buffer behind the returned slice
    /// keeps the NUL right after it.
    pub fn to_narrow(&mut self, units: &[u16]) -> Result<&mut [u8], TranscodeError> {
        let units = match units.iter().position(|&u| u == 0) {
            Some(end) => &units[..end],
            None => units,
        };

        let len = match &self.mode {
            Mode::Utf8 => {
                let len = utf16_to_utf8(None, units)?;
                self.buf.ensure_capacity(len + 1)?;
                utf16_to_utf8(Some(&mut self.buf.as_mut_slice()[..len]), units)?
            }
            Mode::Narrow(codec) => {
                let size = units
                    .len()
                    .checked_mul(3)
                    .and_then(|n| n.checked_add(100))
                    .ok_or(TranscodeError::Overflow)?;
                self.buf.ensure_capacity(size)?;
                let written = codec.convert(units, &mut self.buf.as_mut_slice()[..size], DEFAULT_CHAR);
                if (written == 0 && !units.is_empty()) || written >= size {
                    return Err(TranscodeError::Overflow);
                }
                written
            }
        };

        self.buf.as_mut_slice()[len] = 0;
        self.len = len;
        Ok(&mut self.buf.as_mut_slice()[..len])
    }

    /// The last successful result, including its terminator.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        match self.buf.capacity() {
            0 => &[0],
            _ => &self.buf.as_slice()[..=self.len],
        }
    }

    pub fn allocations(&self) -> usize {
        self.buf.allocations()
    }
}
