//! Text decoding for log files.
//!
//! Log files are read as raw bytes and decoded with the configured charset.
//! A leading UTF-8 byte order mark always wins over the configured charset.

use std::fmt;
use std::str::FromStr;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Windows-1251 code points for bytes 0x80..=0xBF. Bytes 0xC0..=0xFF map
/// linearly onto U+0410..=U+044F.
const CP1251_HIGH: [char; 64] = [
    '\u{0402}', '\u{0403}', '\u{201A}', '\u{0453}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{20AC}', '\u{2030}', '\u{0409}', '\u{2039}', '\u{040A}', '\u{040C}', '\u{040B}', '\u{040F}',
    '\u{0452}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{0098}', '\u{2122}', '\u{0459}', '\u{203A}', '\u{045A}', '\u{045C}', '\u{045B}', '\u{045F}',
    '\u{00A0}', '\u{040E}', '\u{045E}', '\u{0408}', '\u{00A4}', '\u{0490}', '\u{00A6}', '\u{00A7}',
    '\u{0401}', '\u{00A9}', '\u{0404}', '\u{00AB}', '\u{00AC}', '\u{00AD}', '\u{00AE}', '\u{0407}',
    '\u{00B0}', '\u{00B1}', '\u{0406}', '\u{0456}', '\u{0491}', '\u{00B5}', '\u{00B6}', '\u{00B7}',
    '\u{0451}', '\u{2116}', '\u{0454}', '\u{00BB}', '\u{0458}', '\u{0405}', '\u{0455}', '\u{0457}',
];

/// Charset used to decode log file contents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Charset {
    /// UTF-8, invalid sequences replaced with U+FFFD
    Utf8,
    /// ISO-8859-1
    Latin1,
    /// Windows-1251 (Cyrillic)
    #[default]
    Windows1251,
}

impl Charset {
    /// Decode raw file bytes into text
    pub fn decode(&self, bytes: &[u8]) -> String {
        if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
            return String::from_utf8_lossy(rest).into_owned();
        }

        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Self::Windows1251 => bytes.iter().map(|&b| decode_cp1251(b)).collect(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "latin-1",
            Self::Windows1251 => "windows-1251",
        }
    }
}

fn decode_cp1251(b: u8) -> char {
    match b {
        0x00..=0x7F => char::from(b),
        0x80..=0xBF => CP1251_HIGH[usize::from(b - 0x80)],
        // 0xC0..=0xFF is the contiguous А..я block
        _ => char::from_u32(0x0410 + u32::from(b - 0xC0)).unwrap_or(char::REPLACEMENT_CHARACTER),
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unsupported charset '{0}'")]
pub struct UnknownCharset(pub String);

impl FromStr for Charset {
    type Err = UnknownCharset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            "windows-1251" | "cp1251" | "1251" => Ok(Self::Windows1251),
            _ => Err(UnknownCharset(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Charset::Utf8)]
    #[case(Charset::Latin1)]
    #[case(Charset::Windows1251)]
    fn test_ascii_is_identical(#[case] charset: Charset) {
        assert_eq!(charset.decode(b"12:00|INFO|ok"), "12:00|INFO|ok");
    }

    #[test]
    fn test_cp1251_cyrillic() {
        // "Привет" in Windows-1251
        let bytes = [0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2];
        assert_eq!(Charset::Windows1251.decode(&bytes), "Привет");
        assert_eq!(Charset::Windows1251.decode(&[0xA8, 0xB8, 0xB9]), "Ёё№");
    }

    #[test]
    fn test_bom_forces_utf8() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("ошибка".as_bytes());
        assert_eq!(Charset::Windows1251.decode(&bytes), "ошибка");
    }

    #[test]
    fn test_latin1() {
        assert_eq!(Charset::Latin1.decode(&[0x63, 0x61, 0x66, 0xE9]), "café");
    }

    #[rstest]
    #[case("UTF-8", Charset::Utf8)]
    #[case("cp1251", Charset::Windows1251)]
    #[case("iso-8859-1", Charset::Latin1)]
    fn test_parses_names(#[case] name: &str, #[case] expected: Charset) {
        assert_eq!(name.parse::<Charset>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_charset() {
        assert!("koi8-r".parse::<Charset>().is_err());
    }
}
