use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub fn strip_nbsp(raw: &str) -> String {
    raw.replace('\u{a0}', " ").trim().to_string()
}

pub fn normalize_key(raw: &str) -> String {
    let lowered = strip_nbsp(raw).to_lowercase().replace('_', " ");
    let unaccented: String = lowered.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    unaccented.split_whitespace().collect::<Vec<_>>().join(" ")
}
