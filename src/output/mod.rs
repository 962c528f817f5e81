//! Device output processing.
//!
//! Raw session output carries terminal escapes, pager residue, and
//! CR/LF line ends. [`OutputSanitizer`] turns it into plain text:
//!
//! ```
//! use netdeck::output::OutputSanitizer;
//!
//! let raw = "\x1b[1mcore-sw#\x1b[0m show clock\r\n";
//! assert_eq!(OutputSanitizer::clean(raw), "core-sw# show clock\n");
//! ```

mod sanitizer;

pub use sanitizer::{AnsiStripper, OutputSanitizer};
