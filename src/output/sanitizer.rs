//! Escape stripping for device output.

use vte::{Params, Parser, Perform};

const PAGER_MARKER: &str = "--More--";

/// Strips terminal control sequences from device output.
pub struct OutputSanitizer;

impl OutputSanitizer {
    /// Strip escape sequences from raw bytes.
    ///
    /// Backspaces erase the preceding character, as a terminal would.
    pub fn strip_ansi(input: &[u8]) -> String {
        let mut extractor = PlainTextExtractor::default();
        let mut parser = Parser::new();

        parser.advance(&mut extractor, input);

        extractor.output
    }

    pub fn strip_ansi_str(input: &str) -> String {
        Self::strip_ansi(input.as_bytes())
    }

    /// Strip escapes, drop pager markers, and normalize line ends to `\n`.
    pub fn clean(input: &str) -> String {
        Self::strip_ansi_str(input)
            .replace(PAGER_MARKER, "")
            .chars()
            .filter(|&c| c != '\r')
            .collect()
    }
}

/// [`OutputSanitizer::strip_ansi`] for output that arrives in pieces.
///
/// An escape sequence split across chunks is held until it completes. A
/// backspace over text returned by an earlier call comes out as `\x08`,
/// so a terminal steps back over it.
pub struct AnsiStripper {
    parser: Parser,
    extractor: PlainTextExtractor,
}

impl AnsiStripper {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            extractor: PlainTextExtractor::default(),
        }
    }

    /// Feed the next chunk and take the plain text it completed.
    pub fn push(&mut self, input: &[u8]) -> String {
        self.parser.advance(&mut self.extractor, input);
        self.extractor.take()
    }
}

impl Default for AnsiStripper {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct PlainTextExtractor {
    output: String,
    /// Characters on the current line still held in `output`.
    held: usize,
    /// Characters on the current line, taken or not.
    column: usize,
}

impl PlainTextExtractor {
    fn push(&mut self, c: char) {
        self.output.push(c);
        self.held += 1;
        self.column += 1;
    }

    fn take(&mut self) -> String {
        self.held = 0;
        std::mem::take(&mut self.output)
    }
}

impl Perform for PlainTextExtractor {
    fn print(&mut self, c: char) {
        self.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => {
                self.output.push('\n');
                self.held = 0;
                self.column = 0;
            }
            b'\r' | b'\t' => self.push(byte as char),
            // Backspace, used by pagers to wipe their marker.
            0x08 if self.column > 0 => {
                self.column -= 1;
                if self.held > 0 {
                    self.held -= 1;
                    self.output.pop();
                } else {
                    self.output.push('\x08');
                }
            }
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(
        &mut self,
        _params: &Params,
        _intermediates: &[u8],
        _ignore: bool,
        _action: char,
    ) {
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        assert_eq!(OutputSanitizer::strip_ansi(b"core-sw#"), "core-sw#");
    }

    #[test]
    fn test_strip_color_codes() {
        assert_eq!(OutputSanitizer::strip_ansi(b"\x1b[31mdown\x1b[0m"), "down");
    }

    #[test]
    fn test_strip_cursor_movement() {
        assert_eq!(
            OutputSanitizer::strip_ansi(b"\x1b[2J\x1b[Hcore-sw>"),
            "core-sw>"
        );
    }

    #[test]
    fn test_osc_title() {
        assert_eq!(
            OutputSanitizer::strip_ansi(b"\x1b]0;core-sw\x07core-sw#"),
            "core-sw#"
        );
    }

    #[test]
    fn test_backspace_erases() {
        assert_eq!(
            OutputSanitizer::strip_ansi(b"--More--\x08\x08\x08\x08\x08\x08\x08\x08 vlan 10"),
            " vlan 10"
        );
    }

    #[test]
    fn test_backspace_stops_at_line_start() {
        assert_eq!(OutputSanitizer::strip_ansi(b"a\n\x08b"), "a\nb");
    }

    #[test]
    fn test_preserve_tabs_and_newlines() {
        assert_eq!(
            OutputSanitizer::strip_ansi(b"Gi1/0/1\tup\nGi1/0/2\tdown"),
            "Gi1/0/1\tup\nGi1/0/2\tdown"
        );
    }

    #[test]
    fn test_clean_normalizes_line_ends() {
        assert_eq!(
            OutputSanitizer::clean("line1\r\nline2\r\r\nline3\r"),
            "line1\nline2\nline3"
        );
    }

    #[test]
    fn test_clean_drops_pager_marker() {
        assert_eq!(
            OutputSanitizer::clean(" --More-- \r\ninterface Vlan1"),
            "  \ninterface Vlan1"
        );
    }

    #[test]
    fn test_stripper_holds_split_sequence() {
        let mut stripper = AnsiStripper::new();
        assert_eq!(stripper.push(b"up \x1b[3"), "up ");
        assert_eq!(stripper.push(b"1mdown\x1b[0m"), "down");
    }

    #[test]
    fn test_stripper_backspace_over_taken_text() {
        let mut stripper = AnsiStripper::new();
        assert_eq!(stripper.push(b"\n--More--\x08\x08"), "\n--More");
        assert_eq!(
            stripper.push(b"\x08\x08\x08\x08\x08\x08\x08 vlan"),
            "\x08\x08\x08\x08\x08\x08 vlan"
        );
    }

    #[test]
    fn test_only_escape_codes() {
        assert_eq!(OutputSanitizer::strip_ansi(b"\x1b[31m\x1b[0m\x1b[2J"), "");
    }
}
