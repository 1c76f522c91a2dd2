//! # INI configuration store
//!
//! An [`Ini`] maps section names to [`Section`]s, and each section maps keys to
//! optional string values. One section, the *default section*, always exists and
//! holds the keys that appear before any `[header]` in the text. Passing `None` as a
//! section name anywhere in the API refers to it.
//!
//! ```plaintext
//! version = 1.0
//!
//! [owner]
//! name = Alice
//! ; comment
//! # comment
//! bare_key_no_value
//! ```
//!
//! Both levels are [`IniMap`]s, so sections and keys are written back in the map's
//! bucket order rather than the order they were read in. Values are written without
//! re-quoting, which means a value that needed quotes to survive parsing (one holding
//! `;`, `#` or leading/trailing whitespace) does not round-trip.

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::io::{HandleReader, HandleWriter, StrStream, Stream};
use crate::map::IniMap;

mod parser;
mod writer;

/// Name of the section holding keys that precede any section header.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Settings applied when parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Section that keys before the first header are stored under.
    pub default_section: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_section: DEFAULT_SECTION.to_string(),
        }
    }
}

/// A named group of key/value pairs.
///
/// A key may be present without a value (a bare `key` line), which is distinct from
/// a key whose value is the empty string (`key =`).
#[derive(Debug, Default)]
pub struct Section {
    entries: IniMap<Option<String>>,
}

impl Section {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`. `None` if the key is missing or has no value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key)?.as_deref()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Stores `value` under `key`, replacing whatever was there.
    pub fn set(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        self.entries.put(key, value.map(str::to_string))?;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key/value pairs in map order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(key, value)| (key, value.as_deref()))
    }
}

/// In-memory INI document.
#[derive(Debug)]
pub struct Ini {
    sections: IniMap<Section>,
    default_section: String,
}

impl Ini {
    /// Creates an empty store holding only the default section.
    pub fn new() -> Self {
        Self::with_default_section(DEFAULT_SECTION)
    }

    /// Creates an empty store whose default section is called `name`.
    ///
    /// An empty `name` falls back to [`DEFAULT_SECTION`].
    pub fn with_default_section(name: &str) -> Self {
        let name = if name.is_empty() {
            DEFAULT_SECTION
        } else {
            name
        };

        let mut sections = IniMap::new();
        // non-empty key into a fresh map
        let _ = sections.put(name, Section::new());

        Self {
            sections,
            default_section: name.to_string(),
        }
    }

    /// Parses INI text held in memory.
    pub fn parse_str(text: &str) -> Result<Self> {
        Self::parse(&mut StrStream::new(text))
    }

    /// Parses INI text from any reader, such as an open file or stdin.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::parse(&mut HandleReader::new(reader))
    }

    /// Opens `path` and parses it.
    ///
    /// Fails with [`Error::Io`] if the file cannot be opened or read. Malformed lines
    /// never fail the parse; they are logged and skipped.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Failed to open INI file {:?}: {}", path.as_ref(), e);
                return Err(Error::Io(e));
            }
        };

        let ini = Self::from_reader(file)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            sections = ini.sections.len(),
            "Loaded INI file"
        );
        Ok(ini)
    }

    /// Parses everything `stream` yields using the default [`ParseOptions`].
    pub fn parse<S: Stream + ?Sized>(stream: &mut S) -> Result<Self> {
        Self::parse_with(stream, &ParseOptions::default())
    }

    pub fn parse_with<S: Stream + ?Sized>(stream: &mut S, options: &ParseOptions) -> Result<Self> {
        parser::parse(stream, options)
    }

    /// Name that `None` section arguments resolve to.
    pub fn default_section_name(&self) -> &str {
        &self.default_section
    }

    fn section_name<'a>(&'a self, section: Option<&'a str>) -> &'a str {
        section.unwrap_or(&self.default_section)
    }

    /// Looks up `key` in `section`, returning `fallback` if the section or key is
    /// missing or the key has no value.
    pub fn get<'a>(&'a self, section: Option<&str>, key: &str, fallback: &'a str) -> &'a str {
        self.value(section, key).unwrap_or(fallback)
    }

    /// Looks up `key` in `section` without a fallback.
    pub fn value(&self, section: Option<&str>, key: &str) -> Option<&str> {
        self.sections.get(self.section_name(section))?.get(key)
    }

    /// Whether `key` exists in `section`, with or without a value.
    pub fn contains(&self, section: Option<&str>, key: &str) -> bool {
        self.sections
            .get(self.section_name(section))
            .is_some_and(|s| s.contains_key(key))
    }

    /// Stores `value` under `key` in `section`, creating the section if needed.
    ///
    /// Fails with [`Error::InvalidArgument`] if `key` or the section name is empty;
    /// the store is left unchanged in that case.
    pub fn set(&mut self, section: Option<&str>, key: &str, value: Option<&str>) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidArgument("key must not be empty".to_string()));
        }

        let name = section.unwrap_or(&self.default_section).to_string();
        self.section_mut_or_insert(&name)?.set(key, value)
    }

    /// Removes `key` from `section`. Returns whether anything was removed.
    pub fn remove(&mut self, section: Option<&str>, key: &str) -> bool {
        let name = section.unwrap_or(&self.default_section).to_string();
        self.sections
            .get_mut(&name)
            .is_some_and(|s| s.remove(key))
    }

    /// Removes a whole named section. The default section cannot be removed.
    pub fn remove_section(&mut self, name: &str) -> Result<bool> {
        if name == self.default_section {
            return Err(Error::InvalidOperation(format!(
                "cannot remove the default section {name:?}"
            )));
        }
        Ok(self.sections.remove(name).is_some())
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn default_section(&self) -> Option<&Section> {
        self.sections.get(&self.default_section)
    }

    /// All sections, the default one included, in map order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections.iter()
    }

    pub(crate) fn section_mut_or_insert(&mut self, name: &str) -> Result<&mut Section> {
        self.sections.get_or_insert_with(name, Section::new)
    }

    /// Serializes the store into `stream`.
    pub fn store<S: Stream + ?Sized>(&self, stream: &mut S) -> Result<()> {
        writer::store(self, stream)?;
        stream.flush()
    }

    /// Serializes the store into any writer, such as stdout or an open file.
    pub fn store_to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut stream = HandleWriter::new(writer);
        self.store(&mut stream)?;
        stream.into_inner()?;
        Ok(())
    }

    /// Creates or truncates `path` and writes the store into it.
    pub fn store_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = match File::create(&path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Failed to create INI file {:?}: {}", path.as_ref(), e);
                return Err(Error::Io(e));
            }
        };

        self.store_to_writer(file)?;
        tracing::debug!(path = %path.as_ref().display(), "Stored INI file");
        Ok(())
    }
}

impl Default for Ini {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Ini {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

impl fmt::Display for Ini {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.store_to_writer(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}
