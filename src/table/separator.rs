/// Field separators considered by [`detect_separator`], in tie-break order.
pub const CANDIDATE_SEPARATORS: [u8; 3] = [b',', b';', b'\t'];

/// Picks the candidate separator occurring most often in `first_line`.
///
/// Ties (including a line with none of them) go to the candidate listed
/// first, so comma is the fallback.
pub fn detect_separator(first_line: &str) -> u8 {
    let mut best = CANDIDATE_SEPARATORS[0];
    let mut best_count = 0;
    for &sep in &CANDIDATE_SEPARATORS {
        let count = first_line.bytes().filter(|&b| b == sep).count();
        if count > best_count {
            best = sep;
            best_count = count;
        }
    }
    best
}

/// First line of `text`, without its line terminator.
pub fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
