use super::{Ini, Section};
use crate::error::Result;
use crate::io::{LineExt, Stream};

/// Writes the default section without a header, followed by a blank line if it had
/// any entries, then every other section under a `[name]` header. Named sections are
/// separated by one blank line; nothing follows the last one.
pub(super) fn store<S: Stream + ?Sized>(ini: &Ini, stream: &mut S) -> Result<()> {
    if let Some(section) = ini.default_section() {
        if store_section(section, stream)? > 0 {
            stream.putc(b'\n')?;
        }
    }

    let mut count = 0usize;
    for (name, section) in ini.sections() {
        if name == ini.default_section_name() {
            continue;
        }

        if count > 0 {
            stream.putc(b'\n')?;
        }
        stream.write_line(&format!("[{name}]"))?;
        store_section(section, stream)?;
        count += 1;
    }

    tracing::debug!(sections = count, "Stored INI");
    Ok(())
}

/// Writes one `key = value` line per entry and returns how many were written.
fn store_section<S: Stream + ?Sized>(section: &Section, stream: &mut S) -> Result<usize> {
    let mut written = 0;

    for (key, value) in section.iter() {
        if key.is_empty() {
            continue;
        }
        stream.write_line(&format!("{key} = {}", value.unwrap_or_default()))?;
        written += 1;
    }

    Ok(written)
}
