use serde::{Deserialize, Serialize};
use std::fmt;

/// Global record identifier as printed on the wire (`0x` + uppercase hex, no padding).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormId(pub u32);

impl FormId {
    /// Accepts `0x13E09`, `0X13e09` or bare `13E09`. Zero is not a valid record.
    pub fn parse_hex(raw: &str) -> Option<FormId> {
        let s = raw.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if s.is_empty() {
            return None;
        }
        match u32::from_str_radix(s, 16) {
            Ok(0) | Err(_) => None,
            Ok(v) => Some(FormId(v)),
        }
    }

    /// Plugin-relative part of the id, without the load slot byte.
    pub fn base(self) -> FormId {
        FormId(self.0 & 0x00FF_FFFF)
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_drops_leading_zeros() {
        assert_eq!(FormId(0x0001_3E09).to_string(), "0x13E09");
    }

    #[test]
    fn parse_accepts_prefixes_and_rejects_zero() {
        assert_eq!(FormId::parse_hex("0x00013E09"), Some(FormId(0x13E09)));
        assert_eq!(FormId::parse_hex("13e09"), Some(FormId(0x13E09)));
        assert_eq!(FormId::parse_hex("0x0"), None);
        assert_eq!(FormId::parse_hex("0xZZ"), None);
        assert_eq!(FormId::parse_hex(""), None);
    }
}
