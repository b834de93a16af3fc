//! Language code resolution and detection.
//!
//! Canonical codes are NLLB-style `lang_Script` identifiers such as
//! `eng_Latn`. Providers that want something else get it through
//! [`LanguageResolver::normalize`].

use crate::config::BackendKind;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Number of text lines fed into detection.
const DETECTION_SAMPLE_LINES: usize = 100;

/// Fallback when no default is configured.
pub const DEFAULT_LANGUAGE: &str = "eng_Latn";

/// Canonical script-qualified language code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading language subtag, `eng` for `eng_Latn`.
    pub fn primary_subtag(&self) -> &str {
        self.0.split(['_', '-']).next().unwrap_or(&self.0)
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source language: a fixed code or detected per document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceLanguage {
    #[default]
    Auto,
    Code(LanguageCode),
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLanguage::Auto => f.write_str("auto"),
            SourceLanguage::Code(code) => code.fmt(f),
        }
    }
}

/// Entry of the static code map.
#[derive(Debug, Clone, Copy)]
pub struct LanguageInfo {
    pub tag: &'static str,
    pub code: &'static str,
    pub name: &'static str,
}

macro_rules! code_map {
    ($(($tag:literal, $code:literal, $name:literal)),* $(,)?) => {
        &[$(LanguageInfo { tag: $tag, code: $code, name: $name }),*]
    };
}

/// Two-letter (or ISO 639-3 where no two-letter tag exists) tag to
/// canonical code.
pub static CODE_MAP: &[LanguageInfo] = code_map![
    ("en", "eng_Latn", "English"),
    ("es", "spa_Latn", "Spanish"),
    ("fr", "fra_Latn", "French"),
    ("de", "deu_Latn", "German"),
    ("it", "ita_Latn", "Italian"),
    ("pt", "por_Latn", "Portuguese"),
    ("ru", "rus_Cyrl", "Russian"),
    ("nl", "nld_Latn", "Dutch"),
    ("pl", "pol_Latn", "Polish"),
    ("uk", "ukr_Cyrl", "Ukrainian"),
    ("tr", "tur_Latn", "Turkish"),
    ("ar", "arb_Arab", "Arabic"),
    ("zh", "zho_Hans", "Chinese (Simplified)"),
    ("zh-tw", "zho_Hant", "Chinese (Traditional)"),
    ("ja", "jpn_Jpan", "Japanese"),
    ("ko", "kor_Hang", "Korean"),
    ("hi", "hin_Deva", "Hindi"),
    ("bn", "ben_Beng", "Bengali"),
    ("pa", "pan_Guru", "Punjabi"),
    ("ta", "tam_Taml", "Tamil"),
    ("te", "tel_Telu", "Telugu"),
    ("mr", "mar_Deva", "Marathi"),
    ("vi", "vie_Latn", "Vietnamese"),
    ("th", "tha_Thai", "Thai"),
    ("id", "ind_Latn", "Indonesian"),
    ("ms", "zsm_Latn", "Malay"),
    ("tl", "tgl_Latn", "Filipino"),
    ("sw", "swh_Latn", "Swahili"),
    ("ha", "hau_Latn", "Hausa"),
    ("yo", "yor_Latn", "Yoruba"),
    ("ig", "ibo_Latn", "Igbo"),
    ("am", "amh_Ethi", "Amharic"),
    ("zu", "zul_Latn", "Zulu"),
    ("xh", "xho_Latn", "Xhosa"),
    ("st", "sot_Latn", "Southern Sotho"),
    ("tn", "tsn_Latn", "Tswana"),
    ("sn", "sna_Latn", "Shona"),
    ("rw", "kin_Latn", "Kinyarwanda"),
    ("mg", "plt_Latn", "Malagasy"),
    ("so", "som_Latn", "Somali"),
    ("om", "gaz_Latn", "Oromo"),
    ("ti", "tir_Ethi", "Tigrinya"),
    ("he", "heb_Hebr", "Hebrew"),
    ("fa", "pes_Arab", "Persian"),
    ("ur", "urd_Arab", "Urdu"),
    ("ps", "pbt_Arab", "Pashto"),
    ("ku", "kmr_Latn", "Kurdish (Kurmanji)"),
    ("ckb", "ckb_Arab", "Central Kurdish"),
    ("ne", "npi_Deva", "Nepali"),
    ("si", "sin_Sinh", "Sinhala"),
    ("km", "khm_Khmr", "Khmer"),
    ("lo", "lao_Laoo", "Lao"),
    ("my", "mya_Mymr", "Burmese"),
    ("ka", "kat_Geor", "Georgian"),
    ("hy", "hye_Armn", "Armenian"),
    ("az", "azj_Latn", "Azerbaijani"),
    ("uz", "uzn_Latn", "Uzbek"),
    ("kk", "kaz_Cyrl", "Kazakh"),
    ("ky", "kir_Cyrl", "Kyrgyz"),
    ("tg", "tgk_Cyrl", "Tajik"),
    ("tk", "tuk_Latn", "Turkmen"),
    ("mn", "khk_Cyrl", "Mongolian"),
    ("bo", "bod_Tibt", "Tibetan"),
    ("dz", "dzo_Tibt", "Dzongkha"),
    ("ceb", "ceb_Latn", "Cebuano"),
    ("jv", "jav_Latn", "Javanese"),
    ("su", "sun_Latn", "Sundanese"),
    ("ml", "mal_Mlym", "Malayalam"),
    ("kn", "kan_Knda", "Kannada"),
    ("gu", "guj_Gujr", "Gujarati"),
    ("or", "ory_Orya", "Odia"),
    ("as", "asm_Beng", "Assamese"),
    ("mai", "mai_Deva", "Maithili"),
    ("sd", "snd_Arab", "Sindhi"),
];

pub fn lookup_tag(tag: &str) -> Option<&'static LanguageInfo> {
    CODE_MAP.iter().find(|info| info.tag.eq_ignore_ascii_case(tag))
}

pub fn lookup_code(code: &str) -> Option<&'static LanguageInfo> {
    CODE_MAP.iter().find(|info| info.code == code)
}

pub fn available_languages() -> &'static [LanguageInfo] {
    CODE_MAP
}

/// Outcome of language detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub code: LanguageCode,
    /// True when detection failed and the default was substituted.
    pub fallback: bool,
}

#[derive(Debug, Clone)]
pub struct LanguageResolver {
    default_code: LanguageCode,
}

impl Default for LanguageResolver {
    fn default() -> Self {
        Self::new(LanguageCode::new(DEFAULT_LANGUAGE))
    }
}

impl LanguageResolver {
    pub fn new(default_code: LanguageCode) -> Self {
        Self { default_code }
    }

    pub fn default_code(&self) -> &LanguageCode {
        &self.default_code
    }

    /// Accept a canonical code, a two-letter tag, or an English name.
    pub fn resolve(&self, input: &str) -> Option<LanguageCode> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        if let Some(info) = CODE_MAP
            .iter()
            .find(|info| info.code.eq_ignore_ascii_case(input))
        {
            return Some(LanguageCode::new(info.code));
        }
        if let Some(info) = lookup_tag(input) {
            return Some(LanguageCode::new(info.code));
        }
        if let Some(info) = CODE_MAP
            .iter()
            .find(|info| info.name.eq_ignore_ascii_case(input))
        {
            return Some(LanguageCode::new(info.code));
        }

        // Unlisted but well-formed canonical codes pass through untouched.
        if looks_canonical(input) {
            return Some(LanguageCode::new(input));
        }

        None
    }

    /// Guess the language of a subtitle sample. Never fails: unknown or
    /// unreliable results fall back to the default code.
    pub fn detect(&self, sample: &str) -> Detection {
        let cleaned = clean_sample(sample);

        let guessed = whatlang::detect(&cleaned).and_then(|info| {
            debug!(
                "Detected {} (confidence {:.2}, reliable: {})",
                info.lang().eng_name(),
                info.confidence(),
                info.is_reliable()
            );
            iso_639_3_to_tag(info.lang().code())
        });

        match guessed.as_deref().and_then(lookup_tag) {
            Some(info) => Detection {
                code: LanguageCode::new(info.code),
                fallback: false,
            },
            None => {
                warn!(
                    "Language detection failed ({}), falling back to {}",
                    guessed.as_deref().unwrap_or("no guess"),
                    self.default_code
                );
                Detection {
                    code: self.default_code.clone(),
                    fallback: true,
                }
            }
        }
    }

    /// Provider-specific spelling of a canonical code.
    pub fn normalize(code: &LanguageCode, backend: BackendKind) -> String {
        match backend {
            BackendKind::LocalServer | BackendKind::HostedInference => code.as_str().to_string(),
            BackendKind::CommercialMt => lookup_code(code.as_str())
                .map(|info| info.tag.split('-').next().unwrap_or(info.tag))
                .unwrap_or_else(|| code.primary_subtag())
                .to_uppercase(),
            BackendKind::Generative => lookup_code(code.as_str())
                .map(|info| info.name.to_string())
                .unwrap_or_else(|| code.as_str().to_string()),
        }
    }
}

fn looks_canonical(input: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-z]{3}_[A-Z][a-z]{3}$").expect("valid regex"))
        .is_match(input)
}

fn iso_639_3_to_tag(code: &str) -> Option<String> {
    match code {
        // whatlang reports Mandarin and Standard Persian by their own codes.
        "cmn" => Some("zh".to_string()),
        "pes" => Some("fa".to_string()),
        _ => {
            let language = isolang::Language::from_639_3(code)?;
            Some(
                language
                    .to_639_1()
                    .map(str::to_string)
                    .unwrap_or_else(|| code.to_string()),
            )
        }
    }
}

/// Strip indices, timing lines and markup, keeping the first
/// [`DETECTION_SAMPLE_LINES`] lines of text.
fn clean_sample(sample: &str) -> String {
    static MARKUP: OnceLock<Regex> = OnceLock::new();
    let markup =
        MARKUP.get_or_init(|| Regex::new(r"<[^>]+>|\{[^}]*\}").expect("valid regex"));

    sample
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| !l.chars().all(|c| c.is_ascii_digit()))
        .filter(|l| !l.contains("-->"))
        .take(DETECTION_SAMPLE_LINES)
        .map(|l| markup.replace_all(l, "").into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_variants() {
        let resolver = LanguageResolver::default();
        assert_eq!(resolver.resolve("nl").unwrap().as_str(), "nld_Latn");
        assert_eq!(resolver.resolve("FR").unwrap().as_str(), "fra_Latn");
        assert_eq!(resolver.resolve("eng_latn").unwrap().as_str(), "eng_Latn");
        assert_eq!(resolver.resolve("german").unwrap().as_str(), "deu_Latn");
        assert_eq!(resolver.resolve("fao_Latn").unwrap().as_str(), "fao_Latn");
        assert!(resolver.resolve("klingon").is_none());
        assert!(resolver.resolve("").is_none());
    }

    #[test]
    fn test_normalize_per_provider() {
        let spanish = LanguageCode::new("spa_Latn");
        assert_eq!(
            LanguageResolver::normalize(&spanish, BackendKind::LocalServer),
            "spa_Latn"
        );
        assert_eq!(
            LanguageResolver::normalize(&spanish, BackendKind::HostedInference),
            "spa_Latn"
        );
        assert_eq!(
            LanguageResolver::normalize(&spanish, BackendKind::CommercialMt),
            "ES"
        );
        assert_eq!(
            LanguageResolver::normalize(&spanish, BackendKind::Generative),
            "Spanish"
        );
    }

    #[test]
    fn test_normalize_unknown_code() {
        let faroese = LanguageCode::new("fao_Latn");
        assert_eq!(
            LanguageResolver::normalize(&faroese, BackendKind::CommercialMt),
            "FAO"
        );
        assert_eq!(
            LanguageResolver::normalize(&faroese, BackendKind::Generative),
            "fao_Latn"
        );
        let traditional = LanguageCode::new("zho_Hant");
        assert_eq!(
            LanguageResolver::normalize(&traditional, BackendKind::CommercialMt),
            "ZH"
        );
    }

    #[test]
    fn test_detect_english() {
        let resolver = LanguageResolver::new(LanguageCode::new("nld_Latn"));
        let sample = "1\n00:00:01,000 --> 00:00:02,000\n<i>Where are you going tonight?</i>\n\n\
                      2\n00:00:03,000 --> 00:00:04,000\nI think we should stay at home and watch the game with our friends.\n";
        let detection = resolver.detect(sample);
        assert_eq!(detection.code.as_str(), "eng_Latn");
        assert!(!detection.fallback);
    }

    #[test]
    fn test_detect_unmapped_language_falls_back() {
        let resolver = LanguageResolver::new(LanguageCode::new("nld_Latn"));
        let sample = "Η γρήγορη καφέ αλεπού πηδάει πάνω από τον τεμπέλη σκύλο και τρέχει στο δάσος.";
        let detection = resolver.detect(sample);
        assert_eq!(detection.code.as_str(), "nld_Latn");
        assert!(detection.fallback);
    }

    #[test]
    fn test_detect_empty_sample_falls_back() {
        let resolver = LanguageResolver::default();
        let detection = resolver.detect("1\n00:00:01,000 --> 00:00:02,000\n\n");
        assert_eq!(detection.code.as_str(), DEFAULT_LANGUAGE);
        assert!(detection.fallback);
    }

    #[test]
    fn test_clean_sample_strips_markup() {
        let cleaned = clean_sample("1\n00:00:01,000 --> 00:00:02,000\n{\\an8}<b>Hello</b> there\n");
        assert_eq!(cleaned, "Hello there");
    }

    #[test]
    fn test_primary_subtag() {
        assert_eq!(LanguageCode::new("eng_Latn").primary_subtag(), "eng");
        assert_eq!(LanguageCode::new("en").primary_subtag(), "en");
    }
}
