// Stateless byte transforms: syncsafe integers, unsynchronisation, slice integers

/// Decode a 4-byte syncsafe integer; the high bit of every byte is ignored
pub fn decode_syncsafe(bytes: [u8; 4]) -> u32 {
    ((bytes[0] as u32 & 0x7F) << 21)
        | ((bytes[1] as u32 & 0x7F) << 14)
        | ((bytes[2] as u32 & 0x7F) << 7)
        | (bytes[3] as u32 & 0x7F)
}

/// Encode the low 28 bits of `value` as a syncsafe integer
pub fn encode_syncsafe(value: u32) -> [u8; 4] {
    [
        ((value >> 21) & 0x7F) as u8,
        ((value >> 14) & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ]
}

/// Largest value a 4-byte syncsafe integer can hold
pub const SYNCSAFE_MAX: u32 = 0x0FFF_FFFF;

/// Undo ID3 unsynchronisation: every `FF 00` pair becomes `FF`
pub fn resynchronise(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        out.push(data[i]);
        if data[i] == 0xFF && data.get(i + 1) == Some(&0x00) {
            i += 1;
        }
        i += 1;
    }
    out
}

/// Apply ID3 unsynchronisation so no false frame sync survives
pub fn unsynchronise(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8);
    for (i, &byte) in data.iter().enumerate() {
        out.push(byte);
        if byte == 0xFF {
            match data.get(i + 1) {
                Some(&next) if next & 0xE0 == 0xE0 || next == 0x00 => out.push(0x00),
                None => out.push(0x00),
                _ => {}
            }
        }
    }
    out
}

/// Cut a fixed-length 8-bit string at its first NUL
pub fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// Cut a UTF-16 string at its first NUL code unit
pub fn trim_nul16(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .chunks_exact(2)
        .position(|unit| unit == [0, 0])
        .map(|units| units * 2)
        .unwrap_or(bytes.len() & !1);
    &bytes[..end]
}

pub fn be_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub fn be_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_syncsafe_all_bits_set() {
        assert_eq!(decode_syncsafe([0x7F, 0x7F, 0x7F, 0x7F]), 268_435_455);
        assert_eq!(decode_syncsafe([0xFF, 0xFF, 0xFF, 0xFF]), SYNCSAFE_MAX);
    }

    #[test]
    fn test_syncsafe_worked_example() {
        // 257 is stored as 00 00 02 01
        assert_eq!(encode_syncsafe(257), [0x00, 0x00, 0x02, 0x01]);
        assert_eq!(decode_syncsafe([0x00, 0x00, 0x02, 0x01]), 257);
    }

    #[quickcheck]
    fn prop_syncsafe_round_trip(value: u32) -> bool {
        let value = value & SYNCSAFE_MAX;
        let encoded = encode_syncsafe(value);
        encoded.iter().all(|b| b & 0x80 == 0) && decode_syncsafe(encoded) == value
    }

    #[quickcheck]
    fn prop_unsynchronise_round_trip(data: Vec<u8>) -> bool {
        resynchronise(&unsynchronise(&data)) == data
    }

    #[quickcheck]
    fn prop_unsynchronised_has_no_false_sync(data: Vec<u8>) -> bool {
        unsynchronise(&data)
            .windows(2)
            .all(|pair| !(pair[0] == 0xFF && pair[1] & 0xE0 == 0xE0))
    }

    #[test]
    fn test_unsynchronise_examples() {
        assert_eq!(unsynchronise(&[0xFF, 0xFB, 0x10]), vec![0xFF, 0x00, 0xFB, 0x10]);
        assert_eq!(unsynchronise(&[0xFF, 0x00]), vec![0xFF, 0x00, 0x00]);
        assert_eq!(resynchronise(&[0xFF, 0x00, 0xE0]), vec![0xFF, 0xE0]);
    }

    #[test]
    fn test_trim_nul() {
        assert_eq!(trim_nul(b"abc\0\0"), b"abc");
        assert_eq!(trim_nul(b"abc"), b"abc");
        assert_eq!(trim_nul16(&[b'a', 0, 0, 0, b'b', 0]), &[b'a', 0]);
        assert_eq!(trim_nul16(&[b'a', 0, b'b']), &[b'a', 0]);
    }

    #[test]
    fn test_slice_integers() {
        let data = [0x00, 0x00, 0x03, 0xE8, 0xFF];
        assert_eq!(be_u32(&data, 0), Some(1000));
        assert_eq!(be_u16(&data, 2), Some(1000));
        assert_eq!(be_u32(&data, 2), None);
    }
}
