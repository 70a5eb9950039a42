//! Text preprocessing: cleans raw resume text and enforces the analysis length window.
//!
//! Pure: no I/O, nothing to retry.

use crate::analysis::error::StageError;

pub const MIN_TEXT_CHARS: usize = 100;
pub const MAX_TEXT_CHARS: usize = 50_000;

/// Normalizes line endings, drops control and zero-width characters, collapses
/// whitespace, then checks the 100 – 50,000 character window.
///
/// Line structure survives: lines are trimmed and runs of blank lines become a
/// single blank line, since section breaks carry meaning for the structure stage.
pub fn preprocess(raw: &str) -> Result<String, StageError> {
    let clean = clean_text(raw);
    let length = clean.chars().count();

    if length < MIN_TEXT_CHARS {
        return Err(StageError::Validation(format!(
            "Resume text is too short for meaningful analysis ({length} characters, minimum {MIN_TEXT_CHARS})"
        )));
    }
    if length > MAX_TEXT_CHARS {
        return Err(StageError::Validation(format!(
            "Resume text exceeds maximum analysis length ({length} characters, maximum {MAX_TEXT_CHARS})"
        )));
    }
    Ok(clean)
}

fn clean_text(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<String> = Vec::new();
    let mut previous_blank = true; // suppresses leading blank lines

    for line in normalized.split('\n') {
        let collapsed = collapse_line(line);
        if collapsed.is_empty() {
            if !previous_blank {
                lines.push(String::new());
            }
            previous_blank = true;
        } else {
            lines.push(collapsed);
            previous_blank = false;
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Drops unprintable characters and squeezes horizontal whitespace to single spaces.
fn collapse_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pending_space = false;

    for c in line.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if is_unprintable(c) {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

fn is_unprintable(c: char) -> bool {
    c.is_control()
        || matches!(
            c,
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
        )
}
