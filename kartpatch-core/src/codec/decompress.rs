use super::{Command, END_OF_STREAM};
use crate::{KartError, Result};

struct Header {
    command: Command,
    length: usize,
}

fn fail(offset: usize, reason: &'static str) -> KartError {
    KartError::Decompress { offset, reason }
}

fn byte_at(buffer: &[u8], pos: usize) -> Result<u8> {
    buffer
        .get(pos)
        .copied()
        .ok_or_else(|| fail(pos, "unexpected end of data"))
}

/// Reads the command header at `pos`. `None` marks the end of the stream.
fn read_header(buffer: &[u8], pos: &mut usize) -> Result<Option<Header>> {
    let start = *pos;
    let b = byte_at(buffer, start)?;
    if b == END_OF_STREAM {
        *pos += 1;
        return Ok(None);
    }

    let (code, length) = if b & 0xE0 == 0xE0 {
        let low = byte_at(buffer, start + 1)?;
        *pos += 2;
        ((b >> 2) & 0x07, ((((b & 0x03) as usize) << 8) | low as usize) + 1)
    } else {
        *pos += 1;
        (b >> 5, (b & 0x1F) as usize + 1)
    };

    let command = Command::from_code(code).ok_or_else(|| fail(start, "reserved command"))?;
    Ok(Some(Header { command, length }))
}

fn read_u16(buffer: &[u8], pos: usize) -> Result<usize> {
    Ok(u16::from_le_bytes([byte_at(buffer, pos)?, byte_at(buffer, pos + 1)?]) as usize)
}

/// Where a back-reference reads from, given the output produced so far.
fn source_of(
    buffer: &[u8],
    operand: usize,
    command: Command,
    produced: usize,
) -> Result<Option<usize>> {
    let src = match command {
        Command::Repeat | Command::RepeatInverted => read_u16(buffer, operand)?,
        Command::RepeatRelative => {
            let dist = byte_at(buffer, operand)? as usize;
            if dist == 0 || dist > produced {
                return Err(fail(operand, "relative reference before start of output"));
            }
            produced - dist
        }
        _ => return Ok(None),
    };
    if src >= produced {
        return Err(fail(operand, "reference past end of output"));
    }
    Ok(Some(src))
}

/// Decompresses the stream starting at `offset` inside a larger buffer.
pub fn decompress_at(buffer: &[u8], offset: usize) -> Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();
    let mut pos = offset;

    while let Some(Header { command, length }) = read_header(buffer, &mut pos)? {
        let operand = pos;
        match command {
            Command::Copy => {
                let bytes = buffer
                    .get(operand..operand + length)
                    .ok_or_else(|| fail(operand, "literal run past end of data"))?;
                out.extend_from_slice(bytes);
            }
            Command::ByteFill => {
                let b = byte_at(buffer, operand)?;
                out.extend(std::iter::repeat(b).take(length));
            }
            Command::WordFill => {
                let pair = [byte_at(buffer, operand)?, byte_at(buffer, operand + 1)?];
                out.extend((0..length).map(|i| pair[i & 1]));
            }
            Command::IncreasingFill => {
                let b = byte_at(buffer, operand)?;
                out.extend((0..length).map(|i| b.wrapping_add(i as u8)));
            }
            Command::Repeat | Command::RepeatInverted | Command::RepeatRelative => {
                let src = source_of(buffer, operand, command, out.len())?.unwrap_or_default();
                let mask = if command == Command::RepeatInverted { 0xFF } else { 0x00 };
                // Byte by byte: the source may overlap what is being written.
                for i in 0..length {
                    let b = out[src + i] ^ mask;
                    out.push(b);
                }
            }
        }
        pos = operand + command.operand_len(length);
    }

    Ok(out)
}

/// Decompresses a standalone compressed buffer.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_at(data, 0)
}

/// Number of compressed bytes, terminator included, of the stream at
/// `offset`. Output is never materialised.
pub fn compressed_len(buffer: &[u8], offset: usize) -> Result<usize> {
    let mut produced = 0usize;
    let mut pos = offset;

    while let Some(Header { command, length }) = read_header(buffer, &mut pos)? {
        let operand = pos;
        let operand_len = command.operand_len(length);
        if operand + operand_len > buffer.len() {
            return Err(fail(operand, "command operands past end of data"));
        }
        source_of(buffer, operand, command, produced)?;
        produced += length;
        pos = operand + operand_len;
    }

    Ok(pos - offset)
}

/// The raw compressed bytes of the stream at `offset`, for copying a chunk
/// verbatim without recompressing it.
pub fn compressed_chunk(buffer: &[u8], offset: usize) -> Result<&[u8]> {
    let len = compressed_len(buffer, offset)?;
    Ok(&buffer[offset..offset + len])
}
