/// Hex form of a byte string, as accepted back by the `bytea` input function.
pub fn encode_bytea(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(2 + 2 * bytes.len());
    out.push_str("\\x");
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

/// Renders raw record bytes for messages and logs without failing on
/// invalid sequences.
pub fn display_raw(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_bytea() {
        assert_eq!(encode_bytea(&[]), "\\x");
        assert_eq!(encode_bytea(&[0x00, 0x7f, 0xff]), "\\x007fff");
    }

    #[test]
    fn test_display_raw_strips_newline() {
        assert_eq!(display_raw(b"a,b\r\n"), "a,b");
    }
}
