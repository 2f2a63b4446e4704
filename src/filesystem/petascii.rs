//! PETASCII conversion for disk and file names

use crate::format::PADDING_BYTE;

/// Convert one PETASCII byte to a printable ASCII character
///
/// Control codes and graphic characters become a space; shifted letters
/// (0xC1..=0xDA) fold down onto `A`..=`Z`.
pub fn decode_byte(b: u8) -> char {
    match b {
        0..=31 | 127..=192 | 219..=255 => ' ',
        193..=218 => (b - 128) as char,
        _ => b as char,
    }
}

/// Convert PETASCII bytes to a string
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| decode_byte(b)).collect()
}

/// Convert PETASCII bytes to a string without trailing padding
pub fn decode_name(bytes: &[u8]) -> String {
    decode(bytes).trim_end().to_string()
}

/// Convert one character to an unshifted PETASCII byte
fn encode_char(c: char) -> u8 {
    match c {
        'a'..='z' => c.to_ascii_uppercase() as u8,
        ' '..=']' => c as u8,
        _ => b' ',
    }
}

/// Encode a name into a fixed-length PETASCII field padded with 0xA0
///
/// Characters beyond `len` are dropped.
pub fn encode_name(name: &str, len: usize) -> Vec<u8> {
    let mut out: Vec<u8> = name.chars().take(len).map(encode_char).collect();
    out.resize(len, PADDING_BYTE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_shifted_letters() {
        assert_eq!(decode_byte(0xC1), 'A');
        assert_eq!(decode_byte(0xDA), 'Z');
    }

    #[test]
    fn test_control_and_graphics_become_space() {
        assert_eq!(decode_byte(0x00), ' ');
        assert_eq!(decode_byte(0x0D), ' ');
        assert_eq!(decode_byte(0x7F), ' ');
        assert_eq!(decode_byte(0xA0), ' ');
        assert_eq!(decode_byte(0xDB), ' ');
        assert_eq!(decode_byte(0xFF), ' ');
    }

    #[test]
    fn test_plain_ascii_passes_through() {
        assert_eq!(decode(b"HELLO 64!"), "HELLO 64!");
    }

    #[test]
    fn test_decode_name_trims_padding() {
        let mut raw = b"GAMES".to_vec();
        raw.resize(16, 0xA0);
        assert_eq!(decode_name(&raw), "GAMES");
    }

    #[test]
    fn test_encode_name() {
        let raw = encode_name("hello", 16);
        assert_eq!(raw.len(), 16);
        assert_eq!(&raw[..5], b"HELLO");
        assert!(raw[5..].iter().all(|&b| b == 0xA0));

        let long = encode_name("ABCDEFGHIJKLMNOPQRS", 16);
        assert_eq!(long, b"ABCDEFGHIJKLMNOP".to_vec());
    }

    proptest! {
        #[test]
        fn decode_always_printable(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let text = decode(&bytes);
            prop_assert_eq!(text.chars().count(), bytes.len());
            prop_assert!(text.chars().all(|c| (' '..='~').contains(&c)));
        }

        #[test]
        fn encoded_names_decode_uppercased(name in "[A-Za-z0-9 ]{0,16}") {
            let raw = encode_name(&name, 16);
            prop_assert_eq!(decode_name(&raw), name.to_ascii_uppercase().trim_end().to_string());
        }
    }
}
