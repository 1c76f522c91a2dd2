//! In-memory INI configuration store.
//!
//! Text is read through a [`io::Stream`], split into `[section]` headers and
//! `key = value` pairs, and kept in a two-level [`map::IniMap`]. The store can be
//! queried, edited and written back out in the same format.
//!
//! ```
//! use inistore::Ini;
//!
//! let mut ini = Ini::parse_str("[owner]\nname = Alice\n[db]\nport = 5432\n")?;
//! assert_eq!(ini.get(Some("db"), "port", "?"), "5432");
//! assert_eq!(ini.get(Some("db"), "missing", "default"), "default");
//!
//! ini.set(None, "version", Some("1.0"))?;
//! assert!(ini.to_string().starts_with("version = 1.0\n\n"));
//! # Ok::<(), inistore::Error>(())
//! ```

pub mod error;
pub mod formats;
pub mod io;
pub mod map;

pub use error::{Error, Result};
pub use formats::ini::{DEFAULT_SECTION, Ini, ParseOptions, Section};
