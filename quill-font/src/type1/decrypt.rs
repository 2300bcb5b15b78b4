//! The two rolling-key XOR ciphers of the Type 1 format.

/// Key for the whole encrypted (`eexec`) section.
pub(crate) const EEXEC_KEY: u16 = 55665;
/// Key for individual charstrings and subroutines.
pub(crate) const CHARSTRING_KEY: u16 = 4330;

const C1: u32 = 52845;
const C2: u32 = 22719;

/// Decrypts `data` with the given key, discarding the first `skip`
/// plaintext bytes.
///
/// The output holds `data.len() - skip` bytes. A skip larger than the
/// input collapses to zero, mirroring the format's reference behavior.
pub(crate) fn decrypt(data: &[u8], key: u16, skip: usize) -> Vec<u8> {
    let skip = if skip > data.len() { 0 } else { skip };

    let mut out = Vec::with_capacity(data.len() - skip);
    let mut r = u32::from(key);

    for (i, b) in data.iter().enumerate() {
        let p = decrypt_byte(*b, &mut r);

        if i >= skip {
            out.push(p);
        }
    }

    out
}

#[inline]
pub(crate) fn decrypt_byte(cipher: u8, r: &mut u32) -> u8 {
    let cipher = u32::from(cipher);
    let plain = cipher ^ (*r >> 8);
    *r = ((cipher + *r).wrapping_mul(C1) + C2) & 0xFFFF;
    (plain & 0xFF) as u8
}

/// Whether an encrypted region is ASCII-armored.
///
/// If all of the first four bytes are hexadecimal digit characters the
/// region is hex text, otherwise it's raw binary.
pub(crate) fn is_hex_armored(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4].iter().all(|b| b.is_ascii_hexdigit())
}

/// Assembles one output byte from every two hex digits, skipping
/// non-hex bytes such as line breaks. A trailing odd nibble is dropped.
pub(crate) fn decode_hex(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut hi = None;

    for b in data {
        let Some(nibble) = hex_value(*b) else {
            continue;
        };

        match hi.take() {
            None => hi = Some(nibble),
            Some(h) => out.push((h << 4) | nibble),
        }
    }

    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// The inverse of [`decrypt`], prefixing `lead_in` filler bytes.
#[cfg(test)]
pub(crate) fn encrypt(plain: &[u8], key: u16, lead_in: usize) -> Vec<u8> {
    let mut r = u32::from(key);
    let mut out = Vec::new();

    for p in core::iter::repeat_n(0u8, lead_in).chain(plain.iter().copied()) {
        let c = (u32::from(p) ^ (r >> 8)) & 0xFF;
        r = ((c + r).wrapping_mul(C1) + C2) & 0xFFFF;
        out.push(c as u8);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let plain = b"dup 0 15 RD";
        let cipher = encrypt(plain, CHARSTRING_KEY, 4);

        assert_eq!(decrypt(&cipher, CHARSTRING_KEY, 4), plain);
    }

    #[test]
    fn output_length() {
        let data = [7u8; 10];
        assert_eq!(decrypt(&data, EEXEC_KEY, 4).len(), 6);
        assert_eq!(decrypt(&data, EEXEC_KEY, 0).len(), 10);
    }

    #[test]
    fn oversized_skip_collapses_to_zero() {
        let data = [7u8; 3];
        assert_eq!(decrypt(&data, EEXEC_KEY, 4).len(), 3);
    }

    #[test]
    fn deterministic() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(
            decrypt(&data, EEXEC_KEY, 4),
            decrypt(&data, EEXEC_KEY, 4)
        );
    }

    #[test]
    fn hex_armor_detection() {
        assert!(is_hex_armored(b"4f3a00ad"));
        assert!(is_hex_armored(b"ABCD"));
        assert!(!is_hex_armored(b"\x80\x01\x02\x03"));
        assert!(!is_hex_armored(b"4f3"));
    }

    #[test]
    fn hex_decoding_skips_whitespace() {
        assert_eq!(decode_hex(b"4F\n3a \r20"), vec![0x4F, 0x3A, 0x20]);
        // A trailing odd nibble is dropped.
        assert_eq!(decode_hex(b"4F3"), vec![0x4F]);
    }
}
