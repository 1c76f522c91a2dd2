pub mod ini;

pub use ini::Ini;
