//! Line-by-line INI tokenizer.
//!
//! Every line goes through the same steps: drop the comment, trim, skip if empty,
//! then either switch to a `[section]` or split a `key = value` pair into the current
//! section. Malformed lines are logged and skipped; only a failing stream aborts.

use tracing::{trace, warn};

use super::{Ini, ParseOptions};
use crate::error::Result;
use crate::io::{LineExt, Stream};

const QUOTE: char = '"';

fn is_comment_char(ch: char) -> bool {
    ch == ';' || ch == '#'
}

fn is_delimiter_char(ch: char) -> bool {
    ch == '=' || ch == ':'
}

/// A classified, non-empty line.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Line<'a> {
    Section(&'a str),
    Pair {
        key: &'a str,
        value: Option<&'a str>,
    },
}

pub(super) fn parse<S: Stream + ?Sized>(stream: &mut S, options: &ParseOptions) -> Result<Ini> {
    let mut ini = Ini::with_default_section(&options.default_section);
    let mut current = ini.default_section_name().to_string();
    let mut line_num = 0usize;

    while let Some(raw) = stream.read_line()? {
        line_num += 1;

        match classify(&raw) {
            Ok(None) => {}
            Ok(Some(Line::Section(name))) => {
                trace!(line = line_num, section = name, "Entering section");
                ini.section_mut_or_insert(name)?;
                current = name.to_string();
            }
            Ok(Some(Line::Pair { key, value })) => {
                trace!(line = line_num, section = %current, key, value, "Parsed pair");
                ini.section_mut_or_insert(&current)?.set(key, value)?;
            }
            Err(reason) => {
                warn!("Skipping malformed line {}: {} ({:?})", line_num, reason, raw);
            }
        }
    }

    tracing::debug!(
        lines = line_num,
        sections = ini.sections().count(),
        "Parsed INI"
    );
    Ok(ini)
}

/// Classifies a raw line. `Ok(None)` means the line is blank or a comment; `Err`
/// carries the reason a line had to be skipped.
pub(super) fn classify(raw: &str) -> Result<Option<Line<'_>>, &'static str> {
    let line = strip_comment(raw).trim();

    if line.is_empty() {
        return Ok(None);
    }

    if let Some(header) = line.strip_prefix('[') {
        let end = header.find(']').ok_or("missing closing bracket")?;
        let name = header[..end].trim();
        if name.is_empty() {
            return Err("empty section name");
        }
        return Ok(Some(Line::Section(name)));
    }

    let (key, value) = split_pair(line);
    if key.is_empty() {
        return Err("empty key");
    }

    Ok(Some(Line::Pair { key, value }))
}

/// Cuts `line` at the first `;` or `#` that is not inside double quotes.
pub(super) fn strip_comment(line: &str) -> &str {
    let mut quoted = false;

    for (i, ch) in line.char_indices() {
        if ch == QUOTE {
            quoted = !quoted;
        } else if !quoted && is_comment_char(ch) {
            return &line[..i];
        }
    }

    line
}

/// Splits a trimmed line at its first delimiter. Without a delimiter the whole line
/// is the key and there is no value.
fn split_pair(line: &str) -> (&str, Option<&str>) {
    match line.find(is_delimiter_char) {
        Some(pos) => {
            let key = line[..pos].trim();
            let value = unquote(line[pos + 1..].trim());
            (key, Some(value))
        }
        None => (line, None),
    }
}

/// Strips one pair of surrounding double quotes. The inside is kept verbatim.
pub(super) fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with(QUOTE) && value.ends_with(QUOTE) {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
