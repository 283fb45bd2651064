//! NTFS cluster run-list decoding.
//!
//! A non-resident attribute stores its extents as a compressed run-list: each
//! run starts with a header byte whose low nibble is the byte-length of the
//! run-length field and whose high nibble is the byte-length of a signed
//! cluster-offset field. Offsets are deltas from the previous run's absolute
//! cluster; a zero header terminates the list.

/// One resolved extent of a non-resident attribute, in bytes relative to the
/// start of the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// Length of the extent in bytes.
    pub length: u64,
    /// Absolute byte offset of the extent from the partition start.
    pub offset: u64,
}

/// Decodes a run-list into byte extents.
///
/// Each resolved run contributes `(length_in_clusters * bytes_per_cluster,
/// running_absolute_cluster * bytes_per_cluster)`. Runs whose offset field is
/// absent (sparse) keep the previous absolute position. Decoding stops at the
/// zero header or at the end of the buffer.
pub fn decode_runs(bytes: &[u8], bytes_per_cluster: u64) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut pos = 0usize;
    let mut absolute_cluster = 0i64;

    while pos < bytes.len() {
        let header = bytes[pos];
        if header == 0 {
            break;
        }

        let length_size = (header & 0x0F) as usize;
        let offset_size = ((header >> 4) & 0x0F) as usize;
        pos += 1;

        if pos + length_size + offset_size > bytes.len() {
            break;
        }

        let length = read_le(&bytes[pos..pos + length_size]);
        pos += length_size;

        let delta = read_le_signed(&bytes[pos..pos + offset_size]);
        pos += offset_size;

        absolute_cluster += delta;
        if absolute_cluster < 0 {
            break;
        }

        runs.push(Run {
            length: length * bytes_per_cluster,
            offset: absolute_cluster as u64 * bytes_per_cluster,
        });
    }

    runs
}

fn read_le(bytes: &[u8]) -> u64 {
    let mut value = 0u64;
    for (i, &byte) in bytes.iter().enumerate() {
        value |= (byte as u64) << (i * 8);
    }
    value
}

/// Reads a little-endian signed integer of 0..=8 bytes, sign-extending from
/// the highest present bit.
fn read_le_signed(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }

    let mut value = 0i64;
    for (i, &byte) in bytes.iter().enumerate() {
        value |= (byte as i64) << (i * 8);
    }

    let bits = bytes.len() * 8;
    if bits < 64 && (value & (1 << (bits - 1))) != 0 {
        value |= !((1i64 << bits) - 1);
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encodes `(length_in_clusters, absolute_cluster)` extents back into the
    /// on-disk run-list format, for round-trip checks.
    fn encode_runs(extents: &[(u64, u64)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut previous = 0i64;
        for &(length, cluster) in extents {
            let delta = cluster as i64 - previous;
            previous = cluster as i64;

            let length_bytes = field_bytes(length as i64, false);
            let offset_bytes = field_bytes(delta, true);
            bytes.push(((offset_bytes.len() as u8) << 4) | length_bytes.len() as u8);
            bytes.extend_from_slice(&length_bytes);
            bytes.extend_from_slice(&offset_bytes);
        }
        bytes.push(0);
        bytes
    }

    fn field_bytes(value: i64, signed: bool) -> Vec<u8> {
        let mut out = value.to_le_bytes().to_vec();
        while out.len() > 1 {
            let last = out[out.len() - 1];
            let prev_top = out[out.len() - 2] & 0x80 != 0;
            let redundant = if signed {
                (last == 0 && !prev_top) || (last == 0xFF && prev_top)
            } else {
                last == 0
            };
            if redundant {
                out.pop();
            } else {
                break;
            }
        }
        out
    }

    #[test]
    fn decodes_single_run() {
        // 16 clusters at cluster 100: header 0x21, length 0x10, offset 100.
        let bytes = [0x21, 0x10, 0x64, 0x00, 0x00];
        let runs = decode_runs(&bytes, 4096);
        assert_eq!(
            runs,
            vec![Run {
                length: 16 * 4096,
                offset: 100 * 4096
            }]
        );
    }

    #[test]
    fn offsets_are_deltas() {
        // 10 clusters at 100, then 20 clusters at 200 (delta +100).
        let bytes = [0x21, 0x0A, 0x64, 0x00, 0x21, 0x14, 0x64, 0x00, 0x00];
        let runs = decode_runs(&bytes, 1);
        assert_eq!(runs[0], Run { length: 10, offset: 100 });
        assert_eq!(runs[1], Run { length: 20, offset: 200 });
    }

    #[test]
    fn negative_deltas_move_backwards() {
        // 4 clusters at 200, then 4 clusters at 50 (delta -150 = 0x6A,0xFF).
        let bytes = [0x21, 0x04, 0xC8, 0x00, 0x21, 0x04, 0x6A, 0xFF, 0x00];
        let runs = decode_runs(&bytes, 1);
        assert_eq!(runs[1], Run { length: 4, offset: 50 });
    }

    #[test]
    fn round_trips_fragmented_extents() {
        let extents = [(3u64, 1000u64), (7, 50), (1, 4000), (128, 3999)];
        let bytes = encode_runs(&extents);
        let runs = decode_runs(&bytes, 512);
        let decoded: Vec<(u64, u64)> =
            runs.iter().map(|r| (r.length / 512, r.offset / 512)).collect();
        assert_eq!(decoded, extents);
    }

    #[test]
    fn zero_header_terminates() {
        let bytes = [0x11, 0x02, 0x05, 0x00, 0x11, 0x01, 0x01];
        let runs = decode_runs(&bytes, 1);
        assert_eq!(runs.len(), 1);
    }

    #[test]
    fn truncated_run_is_dropped() {
        // Header promises 2 offset bytes but only 1 remains.
        let bytes = [0x21, 0x04, 0xC8];
        assert!(decode_runs(&bytes, 1).is_empty());
    }
}
