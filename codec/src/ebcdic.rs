//! Translate textual headers between ASCII and EBCDIC (code page 037).
//!
//! Only printable ASCII and NUL are mapped. Unmapped EBCDIC bytes decode to a space and
//! unmapped ASCII bytes encode to an EBCDIC space (`0x40`).

use crate::TextEncoding;

/// `(ascii, ebcdic)` pairs.
const PAIRS: [(u8, u8); 96] = [
    (0x00, 0x00),
    (b' ', 0x40),
    (b'!', 0x5A),
    (b'"', 0x7F),
    (b'#', 0x7B),
    (b'$', 0x5B),
    (b'%', 0x6C),
    (b'&', 0x50),
    (b'\'', 0x7D),
    (b'(', 0x4D),
    (b')', 0x5D),
    (b'*', 0x5C),
    (b'+', 0x4E),
    (b',', 0x6B),
    (b'-', 0x60),
    (b'.', 0x4B),
    (b'/', 0x61),
    (b'0', 0xF0),
    (b'1', 0xF1),
    (b'2', 0xF2),
    (b'3', 0xF3),
    (b'4', 0xF4),
    (b'5', 0xF5),
    (b'6', 0xF6),
    (b'7', 0xF7),
    (b'8', 0xF8),
    (b'9', 0xF9),
    (b':', 0x7A),
    (b';', 0x5E),
    (b'<', 0x4C),
    (b'=', 0x7E),
    (b'>', 0x6E),
    (b'?', 0x6F),
    (b'@', 0x7C),
    (b'A', 0xC1),
    (b'B', 0xC2),
    (b'C', 0xC3),
    (b'D', 0xC4),
    (b'E', 0xC5),
    (b'F', 0xC6),
    (b'G', 0xC7),
    (b'H', 0xC8),
    (b'I', 0xC9),
    (b'J', 0xD1),
    (b'K', 0xD2),
    (b'L', 0xD3),
    (b'M', 0xD4),
    (b'N', 0xD5),
    (b'O', 0xD6),
    (b'P', 0xD7),
    (b'Q', 0xD8),
    (b'R', 0xD9),
    (b'S', 0xE2),
    (b'T', 0xE3),
    (b'U', 0xE4),
    (b'V', 0xE5),
    (b'W', 0xE6),
    (b'X', 0xE7),
    (b'Y', 0xE8),
    (b'Z', 0xE9),
    (b'[', 0xBA),
    (b'\\', 0xE0),
    (b']', 0xBB),
    (b'^', 0xB0),
    (b'_', 0x6D),
    (b'`', 0x79),
    (b'a', 0x81),
    (b'b', 0x82),
    (b'c', 0x83),
    (b'd', 0x84),
    (b'e', 0x85),
    (b'f', 0x86),
    (b'g', 0x87),
    (b'h', 0x88),
    (b'i', 0x89),
    (b'j', 0x91),
    (b'k', 0x92),
    (b'l', 0x93),
    (b'm', 0x94),
    (b'n', 0x95),
    (b'o', 0x96),
    (b'p', 0x97),
    (b'q', 0x98),
    (b'r', 0x99),
    (b's', 0xA2),
    (b't', 0xA3),
    (b'u', 0xA4),
    (b'v', 0xA5),
    (b'w', 0xA6),
    (b'x', 0xA7),
    (b'y', 0xA8),
    (b'z', 0xA9),
    (b'{', 0xC0),
    (b'|', 0x4F),
    (b'}', 0xD0),
    (b'~', 0xA1),
];

const fn build_to_ascii() -> [u8; 256] {
    let mut table = [b' '; 256];
    let mut i = 0;
    while i < PAIRS.len() {
        let (ascii, ebcdic) = PAIRS[i];
        table[ebcdic as usize] = ascii;
        i += 1;
    }
    table
}

const fn build_to_ebcdic() -> [u8; 256] {
    let mut table = [0x40; 256];
    let mut i = 0;
    while i < PAIRS.len() {
        let (ascii, ebcdic) = PAIRS[i];
        table[ascii as usize] = ebcdic;
        i += 1;
    }
    table
}

const TO_ASCII: [u8; 256] = build_to_ascii();
const TO_EBCDIC: [u8; 256] = build_to_ebcdic();

/// Decode one EBCDIC byte.
pub const fn to_ascii(byte: u8) -> u8 {
    TO_ASCII[byte as usize]
}

/// Encode one ASCII byte.
pub const fn to_ebcdic(byte: u8) -> u8 {
    TO_EBCDIC[byte as usize]
}

/// Decode a buffer in place.
pub fn decode_in_place(buf: &mut [u8]) {
    buf.iter_mut().for_each(|b| *b = to_ascii(*b));
}

/// Encode a buffer in place.
pub fn encode_in_place(buf: &mut [u8]) {
    buf.iter_mut().for_each(|b| *b = to_ebcdic(*b));
}

/// Guess the encoding of a textual header by counting ASCII spaces against EBCDIC spaces.
///
/// Ties resolve to ASCII.
pub fn detect(text: &[u8]) -> TextEncoding {
    let (ebcdic, ascii) = text.iter().fold((0usize, 0usize), |(e, a), b| match *b {
        0x40 => (e + 1, a),
        b' ' => (e, a + 1),
        _ => (e, a),
    });
    if ebcdic > ascii {
        TextEncoding::Ebcdic
    } else {
        TextEncoding::Ascii
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoseis_macros::test_traced;

    #[test_traced]
    fn test_printable_round_trip() {
        for ascii in 0x20u8..0x7f {
            let ebcdic = to_ebcdic(ascii);
            assert_eq!(to_ascii(ebcdic), ascii, "{}", ascii as char);
        }
    }

    #[test_traced]
    fn test_known_values() {
        let mut buf = b"C 1 CLIENT: ACME".to_vec();
        encode_in_place(&mut buf);
        assert_eq!(&buf[..4], &[0xC3, 0x40, 0xF1, 0x40]);
        decode_in_place(&mut buf);
        assert_eq!(buf, b"C 1 CLIENT: ACME");
    }

    #[test_traced]
    fn test_unmapped() {
        // Control characters encode to an EBCDIC space
        assert_eq!(to_ebcdic(b'\n'), 0x40);
        // Unassigned EBCDIC bytes decode to an ASCII space
        assert_eq!(to_ascii(0xFF), b' ');
    }

    #[test_traced]
    fn test_detect() {
        let mut text = vec![b' '; 3200];
        assert_eq!(detect(&text), TextEncoding::Ascii);
        encode_in_place(&mut text);
        assert_eq!(detect(&text), TextEncoding::Ebcdic);
        assert_eq!(detect(&[]), TextEncoding::Ascii);
    }
}
