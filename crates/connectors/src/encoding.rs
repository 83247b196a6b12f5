use encoding_rs::{Encoding, UTF_8};
use std::fmt;

/// Character encoding of the input or of the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharEncoding {
    /// No conversion is done. Bytes must still form valid text in
    /// whatever encoding they end up stored in.
    SqlAscii,
    Known(&'static Encoding),
}

impl CharEncoding {
    pub fn utf8() -> Self {
        CharEncoding::Known(UTF_8)
    }

    /// Resolves a label such as `UTF8`, `LATIN1`, `SJIS` or `EUC_JP`.
    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        if trimmed.eq_ignore_ascii_case("SQL_ASCII") {
            return Some(CharEncoding::SqlAscii);
        }
        Encoding::for_label(trimmed.as_bytes())
            .or_else(|| Encoding::for_label(trimmed.replace('_', "-").as_bytes()))
            .map(CharEncoding::Known)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CharEncoding::SqlAscii => "SQL_ASCII",
            CharEncoding::Known(encoding) => encoding.name(),
        }
    }

    /// Encodes text for writing to a file in this encoding. Fails on the
    /// first character the encoding cannot represent.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, char> {
        let encoding = match self {
            CharEncoding::SqlAscii => return Ok(text.as_bytes().to_vec()),
            CharEncoding::Known(encoding) => *encoding,
        };
        let (bytes, _, had_errors) = encoding.encode(text);
        if had_errors {
            let bad = text
                .chars()
                .find(|c| encoding.encode(c.encode_utf8(&mut [0; 4])).2)
                .unwrap_or(char::REPLACEMENT_CHARACTER);
            return Err(bad);
        }
        Ok(bytes.into_owned())
    }

    /// Decodes bytes, `None` on any malformed sequence.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            CharEncoding::SqlAscii => String::from_utf8(bytes.to_vec()).ok(),
            CharEncoding::Known(encoding) => encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned()),
        }
    }
}

impl Default for CharEncoding {
    fn default() -> Self {
        CharEncoding::utf8()
    }
}

impl fmt::Display for CharEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(CharEncoding::from_label("UTF8"), Some(CharEncoding::utf8()));
        assert_eq!(CharEncoding::from_label("sql_ascii"), Some(CharEncoding::SqlAscii));
        assert_eq!(
            CharEncoding::from_label("EUC_JP").map(|e| e.name()),
            Some("EUC-JP")
        );
        assert!(CharEncoding::from_label("klingon").is_none());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(CharEncoding::utf8().decode(b"ok"), Some("ok".to_string()));
        assert_eq!(CharEncoding::utf8().decode(&[0xff, 0xfe, 0x41]), None);
        let latin1 = CharEncoding::from_label("LATIN1").unwrap();
        assert_eq!(latin1.decode(&[0x63, 0x61, 0x66, 0xe9]), Some("café".to_string()));
        assert_eq!(CharEncoding::SqlAscii.decode(b"caf\xe9"), None);
    }

    #[test]
    fn test_encode_unrepresentable() {
        let latin1 = CharEncoding::from_label("LATIN1").unwrap();
        assert_eq!(latin1.encode("café"), Ok(vec![0x63, 0x61, 0x66, 0xe9]));
        assert_eq!(latin1.encode("漢"), Err('漢'));
    }
}
