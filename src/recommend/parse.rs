use once_cell::sync::Lazy;
use regex::Regex;

/// At most this many candidate lines are taken from one response.
pub const MAX_CANDIDATES: usize = 5;

/// One numbered line of an assistant reply: ordinal prefix, title, optional
/// four-digit year in parentheses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub ordinal: u32,
    pub title: String,
    pub year: Option<i32>,
}

// Grammar, per line: optional markdown heading hashes, an integer ordinal,
// a period, the title, an optional "(YYYY)" suffix. Anything else on the
// line is narrative filler and not a candidate.
static LIST_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:#+\s*)?(\d+)\.\s*(.+?)(?:\s*\((\d{4})\))?\s*$")
        .expect("candidate-line pattern is valid")
});

/// Scans free-form text for candidate lines, in document order, capped at
/// [`MAX_CANDIDATES`]. Lines whose title is empty after markup stripping are
/// dropped.
pub fn extract_candidates(text: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    for caps in LIST_LINE.captures_iter(text) {
        if out.len() == MAX_CANDIDATES {
            break;
        }
        let Ok(ordinal) = caps[1].parse() else {
            continue;
        };
        let title = strip_markup(&caps[2]);
        if title.is_empty() {
            continue;
        }
        let year = caps.get(3).and_then(|m| m.as_str().parse().ok());
        out.push(Candidate {
            ordinal,
            title,
            year,
        });
    }
    out
}

// Bold/italic residue the provider emits despite being told not to.
fn strip_markup(raw: &str) -> String {
    raw.replace("**", "").replace('*', "").trim().to_string()
}
