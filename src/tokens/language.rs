use rust_stemmers::Algorithm;
use whatlang::Lang;

/// Languages for which stop-words and a stemmer are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    French,
    German,
    Spanish,
    Italian,
    Portuguese,
    Dutch,
}

impl Language {
    /// Resolves a declared language tag such as `en`, `en-US` or `fr_FR`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag
            .trim()
            .split(|c| c == '-' || c == '_')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match primary.as_str() {
            "en" | "eng" => Some(Language::English),
            "fr" | "fra" | "fre" => Some(Language::French),
            "de" | "deu" | "ger" => Some(Language::German),
            "es" | "spa" => Some(Language::Spanish),
            "it" | "ita" => Some(Language::Italian),
            "pt" | "por" => Some(Language::Portuguese),
            "nl" | "nld" | "dut" => Some(Language::Dutch),
            _ => None,
        }
    }

    /// Detects the language of a text sample, only trusting reliable guesses.
    pub fn detect(sample: &str) -> Option<Self> {
        let info = whatlang::detect(sample)?;
        if !info.is_reliable() {
            return None;
        }
        match info.lang() {
            Lang::Eng => Some(Language::English),
            Lang::Fra => Some(Language::French),
            Lang::Deu => Some(Language::German),
            Lang::Spa => Some(Language::Spanish),
            Lang::Ita => Some(Language::Italian),
            Lang::Por => Some(Language::Portuguese),
            Lang::Nld => Some(Language::Dutch),
            _ => None,
        }
    }

    pub fn stemmer_algorithm(self) -> Algorithm {
        match self {
            Language::English => Algorithm::English,
            Language::French => Algorithm::French,
            Language::German => Algorithm::German,
            Language::Spanish => Algorithm::Spanish,
            Language::Italian => Algorithm::Italian,
            Language::Portuguese => Algorithm::Portuguese,
            Language::Dutch => Algorithm::Dutch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag() {
        assert_eq!(Language::from_tag("en"), Some(Language::English));
        assert_eq!(Language::from_tag("en-US"), Some(Language::English));
        assert_eq!(Language::from_tag("fr_FR"), Some(Language::French));
        assert_eq!(Language::from_tag(" DE "), Some(Language::German));
        assert_eq!(Language::from_tag("ja"), None);
        assert_eq!(Language::from_tag(""), None);
    }

    #[test]
    fn test_detect_reliable_english() {
        let sample = "The government announced on Tuesday that the new budget \
                      would include significant investment in public transport \
                      and renewable energy over the next five years.";
        assert_eq!(Language::detect(sample), Some(Language::English));
    }
}
