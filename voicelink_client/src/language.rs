#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLanguage {
    pub raw: String,
    pub code: &'static str,
    pub label: &'static str,
}

const LANGUAGES: &[(&str, &str, &[&str])] = &[
    ("en", "english", &["en", "english"]),
    ("ru", "russian", &["ru", "russian"]),
    ("fr", "french", &["fr", "french"]),
    ("it", "italian", &["it", "italian"]),
    ("de", "german", &["de", "german", "deutsch"]),
    ("es", "spanish", &["es", "spanish", "espanol"]),
    ("pl", "polish", &["pl", "polish", "polski"]),
    ("ja", "japanese", &["ja", "japanese"]),
    (
        "cn",
        "traditional_chinese",
        &[
            "cn",
            "zh",
            "zhcn",
            "zhhant",
            "chinese",
            "chinesetraditional",
            "traditionalchinese",
        ],
    ),
];

/// Maps a raw `sLanguage` value to a server language code. Case, whitespace
/// and punctuation are ignored.
pub fn normalize_language(raw: &str) -> Option<GameLanguage> {
    let key: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    LANGUAGES
        .iter()
        .find(|(_, _, aliases)| aliases.contains(&key.as_str()))
        .map(|&(code, label, _)| GameLanguage {
            raw: raw.trim().to_string(),
            code,
            label,
        })
}

/// `sLanguage` from the `[General]` section of an INI document, if set.
pub fn read_ini_language(text: &str) -> Option<String> {
    let mut section = String::new();
    for line in text.lines() {
        let line = line.trim().to_ascii_lowercase();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            section = line[1..line.len() - 1].trim().to_string();
            continue;
        }
        if section != "general" {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() == "slanguage" {
            let value = value.trim();
            return (!value.is_empty()).then(|| value.to_string());
        }
    }
    None
}

/// The first INI document that defines the language wins (pass the custom
/// file before the base one); the host's own setting is the fallback.
pub fn detect_language(host_value: Option<&str>, ini_files: &[&str]) -> Option<GameLanguage> {
    let raw = ini_files
        .iter()
        .find_map(|text| read_ini_language(text))
        .or_else(|| host_value.map(str::to_string))
        .filter(|raw| !raw.trim().is_empty())?;
    normalize_language(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_normalize() {
        assert_eq!(normalize_language(" ENGLISH ").map(|l| l.code), Some("en"));
        assert_eq!(normalize_language("Deutsch").map(|l| l.code), Some("de"));
        assert_eq!(normalize_language("Español").map(|l| l.code), None);
        assert_eq!(normalize_language("espanol").map(|l| l.label), Some("spanish"));
        assert_eq!(
            normalize_language("zh-Hant").map(|l| l.label),
            Some("traditional_chinese")
        );
        assert_eq!(normalize_language("klingon"), None);
    }

    #[test]
    fn ini_language_only_from_general() {
        let ini = "\
[Display]
sLanguage=FRENCH
; sLanguage=RUSSIAN
[General]
# comment
sLanguage = POLISH
";
        assert_eq!(read_ini_language(ini).as_deref(), Some("polish"));
        assert_eq!(read_ini_language("[General]\nsLanguage=\n"), None);
    }

    #[test]
    fn custom_ini_beats_base_and_host() {
        let custom = "[General]\nsLanguage=ITALIAN\n";
        let base = "[General]\nsLanguage=RUSSIAN\n";
        let got = detect_language(Some("ENGLISH"), &[custom, base]);
        assert_eq!(got.map(|l| l.code), Some("it"));

        let got = detect_language(Some("ENGLISH"), &["[General]\n", base]);
        assert_eq!(got.map(|l| l.code), Some("ru"));

        let got = detect_language(Some("ENGLISH"), &[]);
        assert_eq!(got.map(|l| l.code), Some("en"));
    }
}
