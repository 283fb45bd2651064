//! Small helpers shared by the decoders: little-endian field extraction from
//! raw sector buffers and the text decoding policy used for file content.

/// Extracts an 8-bit unsigned integer from a buffer at a given offset.
///
/// # Panics
///
/// Panics if the slice does not contain enough bytes starting from the offset.
pub fn u8_at(buffer: &[u8], offset: usize) -> u8 {
    buffer[offset]
}

/// Extracts a 16-bit little-endian unsigned integer from a buffer at a given offset.
///
/// # Panics
///
/// Panics if the slice does not contain enough bytes starting from the offset.
pub fn u16_at(buffer: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(
        buffer[offset..offset + 2]
            .try_into()
            .expect("invalid slice"),
    )
}

/// Extracts a 32-bit little-endian unsigned integer from a buffer at a given offset.
///
/// # Panics
///
/// Panics if the slice does not contain enough bytes starting from the offset.
pub fn u32_at(buffer: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(
        buffer[offset..offset + 4]
            .try_into()
            .expect("invalid slice"),
    )
}

/// Extracts a 48-bit little-endian unsigned integer from a buffer at a given
/// offset. NTFS stores parent record references in 6 bytes.
///
/// # Panics
///
/// Panics if the slice does not contain enough bytes starting from the offset.
pub fn u48_at(buffer: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[..6].copy_from_slice(&buffer[offset..offset + 6]);
    u64::from_le_bytes(bytes)
}

/// Extracts a 64-bit little-endian unsigned integer from a buffer at a given offset.
///
/// # Panics
///
/// Panics if the slice does not contain enough bytes starting from the offset.
pub fn u64_at(buffer: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(
        buffer[offset..offset + 8]
            .try_into()
            .expect("invalid slice"),
    )
}

/// Decodes a UTF-16LE byte sequence, returning `None` for odd lengths or
/// unpaired surrogates. Trailing NUL code units are stripped.
pub fn utf16_le(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }

    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    while units.last() == Some(&0) {
        units.pop();
    }

    char::decode_utf16(units).collect::<Result<String, _>>().ok()
}

/// Decodes file content bytes as text.
///
/// The policy is shared by both volume readers: UTF-8 first, UTF-16LE on
/// failure, and a lossy UTF-8 decode as the final fallback. Decode failures
/// are always recovered locally and never surface as errors.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => match utf16_le(bytes) {
            Some(text) => text,
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    }
}
