//! Derivation rules for upload metadata the caller did not supply.
//!
//! All functions here are pure; [`crate::request::UploadRequest::resolve`] applies them.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const NO_DESCRIPTION: &str = "< no description available >";

/// `<endpoint>/dataset/<package_id>/resource/<file_name>`
pub fn default_resource_url(endpoint: &str, package_id: &str, file_name: &str) -> String {
    format!(
        "{}/dataset/{}/resource/{}",
        endpoint.trim_end_matches('/'),
        package_id,
        file_name
    )
}

/// MIME type for an extension given without the dot; `None` when unknown.
pub fn mimetype_for_extension(extension: &str) -> Option<String> {
    mime_guess::from_ext(extension.trim_start_matches('.'))
        .first()
        .map(|mime| mime.essence_str().to_string())
}

pub fn file_name_from_path(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Extension of `file_name` without the dot, e.g. `png` for `photo.png`.
pub fn extension_from_file_name(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string)
}

pub fn format_from_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_uppercase()
}

fn whitespace() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Letters without a canonical decomposition and symbols spelled out as words.
const CHAR_MAP: &[(char, &str)] = &[
    ('$', "dollar"),
    ('%', "percent"),
    ('&', "and"),
    ('<', "less"),
    ('>', "greater"),
    ('|', "or"),
    ('¢', "cent"),
    ('£', "pound"),
    ('€', "euro"),
    ('©', "(c)"),
    ('®', "(r)"),
    ('Æ', "AE"),
    ('æ', "ae"),
    ('Ð', "D"),
    ('ð', "d"),
    ('Đ', "DJ"),
    ('đ', "dj"),
    ('Ł', "L"),
    ('ł', "l"),
    ('Œ', "OE"),
    ('œ', "oe"),
    ('Ø', "O"),
    ('ø', "o"),
    ('Þ', "TH"),
    ('þ', "th"),
    ('ß', "ss"),
];

fn is_slug_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || matches!(c, '_' | '*' | '+' | '~' | '.' | '(' | ')' | '\'' | '"' | '!' | ':' | '@')
}

/// Identifier-safe form of a file name, compatible with npm `slugify` defaults.
///
/// Accents are stripped (`é` becomes `e`) and the letters and symbols in
/// `CHAR_MAP` are spelled out. Anything left outside ASCII alphanumerics and
/// `_*+~.()'"!:@` is dropped. Runs of whitespace and `-` collapse into one `-`.
/// Case is preserved.
pub fn slugify(name: &str) -> String {
    let mut mapped = String::with_capacity(name.len());
    for c in name.nfd().filter(|c| !is_combining_mark(*c)) {
        if c == '-' {
            mapped.push(' ');
            continue;
        }
        match CHAR_MAP.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => mapped.push_str(to),
            None if is_slug_char(c) => mapped.push(c),
            None => {}
        }
    }
    whitespace().replace_all(mapped.trim(), "-").into_owned()
}

pub fn description_or_default(description: Option<&str>) -> String {
    match description.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => NO_DESCRIPTION.to_string(),
    }
}
