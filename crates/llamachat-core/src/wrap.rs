//! Word wrapping for streamed output.

use unicode_width::UnicodeWidthChar;

/// Lays out text that arrives in arbitrary fragments.
///
/// Words are held back until they are complete so that a word never starts
/// on one line and continues on the next, unless it is wider than the
/// terminal, in which case it is split. Columns are display columns, so
/// CJK characters count as two and combining marks as none.
#[derive(Debug, Clone)]
pub struct WordWrapper {
    width: usize,
    line_ending: String,
    column: usize,
    word: String,
    word_len: usize,
    soft_wrapped: bool,
}

impl WordWrapper {
    /// A wrapper for `width` columns. Zero disables wrapping.
    pub fn new(width: usize) -> Self {
        Self {
            width,
            line_ending: "\n".to_string(),
            column: 0,
            word: String::new(),
            word_len: 0,
            soft_wrapped: false,
        }
    }

    /// Sized to the current terminal, emitting `\r\n` so output stays
    /// aligned while the terminal is in raw mode.
    pub fn for_terminal() -> Self {
        let width = crossterm::terminal::size()
            .map(|(cols, _)| cols as usize)
            .unwrap_or(0);
        Self::new(width).with_line_ending("\r\n")
    }

    pub fn with_line_ending(mut self, line_ending: impl Into<String>) -> Self {
        self.line_ending = line_ending.into();
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Feed a fragment; returns the text that can be printed now.
    pub fn push(&mut self, text: &str) -> String {
        let mut out = String::new();

        for c in text.chars() {
            match c {
                '\r' => {}
                '\n' => {
                    self.flush_word(&mut out);
                    self.newline(&mut out);
                    self.soft_wrapped = false;
                }
                ' ' | '\t' => {
                    self.flush_word(&mut out);
                    if self.width > 0 && self.column >= self.width {
                        self.newline(&mut out);
                        self.soft_wrapped = true;
                    } else if !(self.column == 0 && self.soft_wrapped) {
                        out.push(c);
                        self.column += 1;
                    }
                }
                _ => {
                    self.word.push(c);
                    self.word_len += c.width().unwrap_or(0);
                    if self.width > 0 && self.word_len >= self.width {
                        self.flush_word(&mut out);
                    }
                }
            }
        }

        out
    }

    /// Emit whatever is still buffered.
    pub fn finish(&mut self) -> String {
        let mut out = String::new();
        self.flush_word(&mut out);
        out
    }

    fn newline(&mut self, out: &mut String) {
        out.push_str(&self.line_ending);
        self.column = 0;
    }

    fn flush_word(&mut self, out: &mut String) {
        if self.word.is_empty() {
            return;
        }

        if self.width > 0 && self.column > 0 && self.column + self.word_len > self.width {
            self.newline(out);
        }

        let word = std::mem::take(&mut self.word);
        for c in word.chars() {
            let w = c.width().unwrap_or(0);
            if self.width > 0 && self.column > 0 && self.column + w > self.width {
                self.newline(out);
            }
            out.push(c);
            self.column += w;
        }

        self.word_len = 0;
        self.soft_wrapped = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap_all(wrapper: &mut WordWrapper, fragments: &[&str]) -> String {
        let mut out: String = fragments.iter().map(|f| wrapper.push(f)).collect();
        out.push_str(&wrapper.finish());
        out
    }

    #[test]
    fn test_wraps_at_word_boundary() {
        let mut wrapper = WordWrapper::new(10);
        assert_eq!(
            wrap_all(&mut wrapper, &["hello world foo"]),
            "hello \nworld foo"
        );
    }

    #[test]
    fn test_fragment_boundaries_do_not_matter() {
        let mut whole = WordWrapper::new(12);
        let mut pieces = WordWrapper::new(12);
        let text = "The quick brown fox jumps over the lazy dog";

        let expected = wrap_all(&mut whole, &[text]);
        let got = wrap_all(
            &mut pieces,
            &["The qu", "ick", " brown f", "ox jumps ov", "er the l", "azy dog"],
        );
        assert_eq!(got, expected);
    }

    #[test]
    fn test_words_are_held_until_complete() {
        let mut wrapper = WordWrapper::new(80);
        assert_eq!(wrapper.push("Hel"), "");
        assert_eq!(wrapper.push("lo wo"), "Hello ");
        assert_eq!(wrapper.finish(), "wo");
    }

    #[test]
    fn test_long_word_is_split() {
        let mut wrapper = WordWrapper::new(4);
        assert_eq!(wrap_all(&mut wrapper, &["abcdefghij"]), "abcd\nefgh\nij");
    }

    #[test]
    fn test_explicit_newline_resets_column() {
        let mut wrapper = WordWrapper::new(8);
        assert_eq!(
            wrap_all(&mut wrapper, &["one two\nthree four"]),
            "one two\nthree \nfour"
        );
    }

    #[test]
    fn test_no_leading_space_after_soft_wrap() {
        let mut wrapper = WordWrapper::new(5);
        assert_eq!(wrap_all(&mut wrapper, &["abcde  fg"]), "abcde\nfg");
    }

    #[test]
    fn test_indentation_after_hard_newline_is_kept() {
        let mut wrapper = WordWrapper::new(40);
        assert_eq!(wrap_all(&mut wrapper, &["fn x() {\n    y\n}"]), "fn x() {\n    y\n}");
    }

    #[test]
    fn test_zero_width_passes_through() {
        let mut wrapper = WordWrapper::new(0).with_line_ending("\r\n");
        assert_eq!(
            wrap_all(&mut wrapper, &["a very long line that never wraps\nnext"]),
            "a very long line that never wraps\r\nnext"
        );
    }

    #[test]
    fn test_wide_characters_take_two_columns() {
        let mut wrapper = WordWrapper::new(10);
        assert_eq!(
            wrap_all(&mut wrapper, &["日本語 日本語 日本"]),
            "日本語 \n日本語 \n日本"
        );
    }

    #[test]
    fn test_combining_marks_take_no_column() {
        // "e" followed by U+0301 renders as one column.
        let mut wrapper = WordWrapper::new(6);
        assert_eq!(
            wrap_all(&mut wrapper, &["cafe\u{301} ok"]),
            "cafe\u{301} ok"
        );
    }
}
