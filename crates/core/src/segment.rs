/// Delimiters applied in this exact order; each one re-splits every fragment produced so far.
pub const DELIMITERS: [&str; 5] = [" and ", " & ", ",", ";", " then "];

pub fn segment_utterance(utterance: &str) -> Vec<String> {
    let mut fragments = vec![utterance.to_string()];

    for delimiter in DELIMITERS {
        fragments = fragments
            .iter()
            .flat_map(|fragment| fragment.split(delimiter))
            .map(str::to_string)
            .collect();
    }

    fragments
        .iter()
        .map(|fragment| fragment.trim())
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect()
}
