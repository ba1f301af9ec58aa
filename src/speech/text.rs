//! Text cleanup before synthesis

/// Normalize text for TTS synthesis
///
/// Expands common abbreviations and symbols, strips markup the model may emit,
/// and collapses whitespace.
pub fn normalize_text_for_tts(text: &str) -> String {
    let mut result = text.to_string();

    let abbreviations = [
        ("Mr.", "Mister"),
        ("Mrs.", "Misses"),
        ("Ms.", "Miss"),
        ("Dr.", "Doctor"),
        ("vs.", "versus"),
        ("etc.", "etcetera"),
        ("e.g.", "for example"),
        ("i.e.", "that is"),
        ("approx.", "approximately"),
    ];

    for (abbrev, expansion) in abbreviations {
        result = result.replace(abbrev, expansion);
    }

    result = result.replace('&', " and ");
    result = result.replace('%', " percent");
    result = result.replace('+', " plus ");

    // Chat models like to answer with markdown
    result = result
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ".,!?;:'-\"".contains(*c))
        .collect();

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
