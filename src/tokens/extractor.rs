use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::Stemmer;
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use super::language::Language;
use super::stopwords::is_stop_word;

/// Order-irrelevant set of normalized terms.
pub type ValuableTokens = BTreeSet<String>;

const MIN_TOKEN_CHARS: usize = 2;

const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&rsquo;", "'"),
    ("&lsquo;", "'"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&amp;", "&"),
];

lazy_static! {
    static ref HTML_NOISE: Regex =
        Regex::new(r"(?is)<script.*?</script>|<style.*?</style>|<[^>]*>").unwrap();
}

/// The article fields the extractor reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSource<'a> {
    pub title: Option<&'a str>,
    pub content: Option<&'a str>,
    pub tags: &'a [String],
    pub lang: Option<&'a str>,
}

/// Decodes the common HTML entities, `&amp;` last.
pub fn decode_entities(text: &str) -> String {
    let mut decoded = text.to_string();
    for (entity, replacement) in HTML_ENTITIES {
        decoded = decoded.replace(entity, replacement);
    }
    decoded
}

/// Removes markup from an article body and decodes the common entities.
pub fn strip_html(text: &str) -> String {
    decode_entities(&HTML_NOISE.replace_all(text, " "))
}

/// Extracts the valuable tokens of an article.
///
/// Same input always yields the same set. Missing or empty text yields an
/// empty set; this never fails.
pub fn extract_valuable_tokens(source: &TokenSource<'_>) -> ValuableTokens {
    let title = source.title.unwrap_or_default();
    let body = source.content.map(strip_html).unwrap_or_default();

    let language = source
        .lang
        .and_then(Language::from_tag)
        .or_else(|| Language::detect(&format!("{} {}", title, body)));
    let stemmer = language.map(|lang| Stemmer::create(lang.stemmer_algorithm()));

    let mut tokens = ValuableTokens::new();
    let texts = std::iter::once(title)
        .chain(std::iter::once(body.as_str()))
        .chain(source.tags.iter().map(String::as_str));
    for text in texts {
        collect_tokens(text, language, stemmer.as_ref(), &mut tokens);
    }
    tokens
}

fn collect_tokens(
    text: &str,
    language: Option<Language>,
    stemmer: Option<&Stemmer>,
    tokens: &mut ValuableTokens,
) {
    if text.trim().is_empty() {
        return;
    }
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    for word in normalized.unicode_words() {
        // elisions such as "l'article" or "aujourd’hui" come out as one word
        for part in word.split(|c| c == '\'' || c == '’') {
            if part.chars().count() < MIN_TOKEN_CHARS || is_stop_word(language, part) {
                continue;
            }
            let token = match stemmer {
                Some(stemmer) => stemmer.stem(part).into_owned(),
                None => part.to_string(),
            };
            if token.chars().count() >= MIN_TOKEN_CHARS {
                tokens.insert(token);
            }
        }
    }
}
