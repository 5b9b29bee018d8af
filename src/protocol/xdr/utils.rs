use std::fmt;
use std::io::{Read, Write};

pub const ALIGNMENT: usize = 4;

fn padding_len(src_len: usize) -> usize {
    (ALIGNMENT - (src_len % ALIGNMENT)) % ALIGNMENT
}

pub fn read_padding(src_len: usize, src: &mut impl Read) -> std::io::Result<()> {
    let pad_len = padding_len(src_len);
    if pad_len > 0 {
        let mut padding_buffer: [u8; ALIGNMENT] = Default::default();
        src.read_exact(&mut padding_buffer[..pad_len])?;
    }
    Ok(())
}

pub fn write_padding(src_len: usize, dest: &mut impl Write) -> std::io::Result<()> {
    let pad_len = padding_len(src_len);
    if pad_len > 0 {
        let padding_buffer: [u8; ALIGNMENT] = Default::default();
        dest.write_all(&padding_buffer[..pad_len])?;
    }
    Ok(())
}

pub fn invalid_data(m: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, m)
}

/// Payload of the io error raised when a union or enum tag has no matching arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDiscriminant {
    pub type_name: &'static str,
    pub value: i64,
}

impl fmt::Display for UnknownDiscriminant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized discriminant {} for {}", self.value, self.type_name)
    }
}

impl std::error::Error for UnknownDiscriminant {}

pub fn unknown_discriminant(type_name: &'static str, value: impl Into<i64>) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        UnknownDiscriminant { type_name, value: value.into() },
    )
}

/// Reads exactly `length` bytes without trusting `length` for the allocation size,
/// so a corrupt length prefix fails with `UnexpectedEof` instead of a huge buffer.
pub fn read_bounded(length: usize, src: &mut impl Read, dest: &mut Vec<u8>) -> std::io::Result<()> {
    dest.clear();
    let read = src.take(length as u64).read_to_end(dest)?;
    if read != length {
        dest.clear();
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("expected {length} bytes of opaque data, got {read}"),
        ));
    }
    Ok(())
}
