use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

use super::language::Language;

const ENGLISH: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "said", "same", "says", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
    "yours", "yourself", "yourselves", "s", "t", "don", "ll", "re", "ve", "via",
];

const FRENCH: &[&str] = &[
    "au", "aux", "avec", "ce", "ces", "cet", "cette", "dans", "de", "des", "du", "elle", "elles",
    "en", "et", "eux", "il", "ils", "je", "la", "le", "les", "leur", "leurs", "lui", "ma", "mais",
    "me", "même", "mes", "moi", "mon", "ne", "nos", "notre", "nous", "on", "ou", "où", "par",
    "pas", "pour", "qu", "que", "qui", "sa", "se", "ses", "son", "sont", "sur", "ta", "te", "tes",
    "toi", "ton", "tu", "un", "une", "vos", "votre", "vous", "c", "d", "j", "l", "m", "n", "s",
    "t", "y", "été", "être", "est", "était", "ont", "a", "ai", "as", "avait", "avoir", "fait",
    "plus", "comme", "si", "sans", "sous", "entre", "après", "avant", "aussi", "tout", "tous",
    "toute", "toutes", "ça", "cela", "ceci", "dont", "quand", "très",
];

const GERMAN: &[&str] = &[
    "aber", "als", "am", "an", "auch", "auf", "aus", "bei", "bin", "bis", "bist", "da", "damit",
    "das", "dass", "dem", "den", "der", "des", "die", "dies", "diese", "dieser", "dieses", "doch",
    "du", "durch", "ein", "eine", "einem", "einen", "einer", "eines", "er", "es", "für", "hat",
    "hatte", "ich", "ihr", "ihre", "im", "in", "ist", "ja", "kann", "mit", "nach", "nicht",
    "noch", "nur", "oder", "sich", "sie", "sind", "so", "über", "um", "und", "uns", "unter",
    "vom", "von", "vor", "war", "waren", "was", "wie", "wir", "wird", "wurde", "zu", "zum", "zur",
];

const SPANISH: &[&str] = &[
    "a", "al", "algo", "como", "con", "de", "del", "el", "ella", "ellas", "ellos", "en", "entre",
    "era", "es", "esta", "este", "esto", "fue", "ha", "han", "hay", "la", "las", "le", "les",
    "lo", "los", "más", "me", "mi", "muy", "no", "nos", "o", "para", "pero", "por", "que", "se",
    "sin", "sobre", "son", "su", "sus", "también", "te", "tu", "un", "una", "uno", "y", "ya",
];

const ITALIAN: &[&str] = &[
    "a", "al", "alla", "anche", "che", "chi", "con", "da", "dal", "dalla", "dei", "del", "della",
    "di", "e", "è", "gli", "ha", "hanno", "i", "il", "in", "la", "le", "lo", "ma", "mi", "ne",
    "nel", "nella", "non", "per", "più", "si", "sono", "su", "sul", "tra", "un", "una", "uno",
];

const PORTUGUESE: &[&str] = &[
    "a", "ao", "as", "com", "como", "da", "das", "de", "do", "dos", "e", "é", "ela", "ele", "em",
    "entre", "era", "foi", "há", "isso", "já", "mais", "mas", "na", "nas", "no", "nos", "o", "os",
    "ou", "para", "pela", "pelo", "por", "que", "se", "sem", "seu", "sua", "também", "um", "uma",
];

const DUTCH: &[&str] = &[
    "aan", "al", "als", "bij", "dan", "dat", "de", "der", "deze", "die", "dit", "door", "een",
    "en", "er", "het", "hij", "hoe", "ik", "in", "is", "je", "maar", "met", "na", "naar", "niet",
    "nog", "of", "om", "ook", "op", "over", "te", "tot", "uit", "van", "voor", "was", "wat",
    "we", "werd", "wij", "worden", "ze", "zich", "zijn", "zo",
];

lazy_static! {
    static ref STOP_WORDS: HashMap<Language, HashSet<&'static str>> = {
        let mut map = HashMap::new();
        map.insert(Language::English, ENGLISH.iter().copied().collect());
        map.insert(Language::French, FRENCH.iter().copied().collect());
        map.insert(Language::German, GERMAN.iter().copied().collect());
        map.insert(Language::Spanish, SPANISH.iter().copied().collect());
        map.insert(Language::Italian, ITALIAN.iter().copied().collect());
        map.insert(Language::Portuguese, PORTUGUESE.iter().copied().collect());
        map.insert(Language::Dutch, DUTCH.iter().copied().collect());
        map
    };
}

/// Unknown languages fall back to the English list, feeds being mostly English.
pub fn is_stop_word(language: Option<Language>, word: &str) -> bool {
    let language = language.unwrap_or(Language::English);
    STOP_WORDS
        .get(&language)
        .map_or(false, |words| words.contains(word))
}
