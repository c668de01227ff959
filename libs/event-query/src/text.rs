use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Normalize text for free-text matching:
/// - case-insensitive
/// - accent/diacritic-insensitive (strip combining marks)
/// - whitespace collapsed to single spaces
///
/// Decomposes with NFKD, removes combining marks and lowercases. Finnish and
/// Swedish letters (ä, ö, å) fold to their base letters as a result.
pub fn normalize_for_search(input: &str) -> String {
    let folded: String = input
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape `%`, `_` and `\` for use inside a SQL `LIKE` pattern.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
