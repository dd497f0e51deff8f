// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Shared text utilities for line scanning, data lists and escapes.

/// Check if a character may start a symbol name (letter or underscore).
#[inline]
pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Check if a character may continue a symbol name.
#[inline]
pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// True when `name` is a well-formed symbol name.
pub fn is_symbol_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_ident_start(first) => chars.all(is_ident_char),
        _ => false,
    }
}

/// Split a line into code and comment parts at the first unquoted semicolon.
pub fn split_comment(line: &str) -> (&str, &str) {
    let bytes = line.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut escape = false;
    let mut idx = 0usize;
    while idx < bytes.len() {
        let c = bytes[idx];
        match c {
            _ if escape => {
                escape = false;
            }
            b'\\' if in_single || in_double => {
                escape = true;
            }
            b'\'' if !in_double => {
                in_single = !in_single;
            }
            b'"' if !in_single => {
                in_double = !in_double;
            }
            b';' if !in_single && !in_double => {
                return (&line[..idx], &line[idx..]);
            }
            _ => {}
        }
        idx += 1;
    }
    (line, "")
}

/// Strip a trailing `//` comment that sits outside any quoted text.
pub fn strip_line_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut idx = 0usize;
    while idx < bytes.len() {
        let c = bytes[idx];
        match quote {
            Some(_) if c == b'\\' => idx += 1,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == b'\'' || c == b'"' => quote = Some(c),
            None if c == b'/' && bytes.get(idx + 1) == Some(&b'/') => return &line[..idx],
            None => {}
        }
        idx += 1;
    }
    line
}

/// Decode backslash and caret escapes into their control characters.
///
/// Recognized: `\r \n \t \0 \\ \" \'`, `^G ^H ^I ^J ^L ^M ^[` and `ESC[`.
pub fn decode_escapes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match (c, next) {
            ('\\', Some(n)) => {
                let decoded = match n {
                    'r' => Some('\r'),
                    'n' => Some('\n'),
                    't' => Some('\t'),
                    '0' => Some('\0'),
                    '\\' => Some('\\'),
                    '"' => Some('"'),
                    '\'' => Some('\''),
                    _ => None,
                };
                match decoded {
                    Some(d) => {
                        out.push(d);
                        i += 2;
                    }
                    None => {
                        out.push(c);
                        i += 1;
                    }
                }
            }
            ('^', Some(n)) => {
                let decoded = match n {
                    'G' => Some('\x07'),
                    'H' => Some('\x08'),
                    'I' => Some('\t'),
                    'J' => Some('\n'),
                    'L' => Some('\x0c'),
                    'M' => Some('\r'),
                    '[' => Some('\x1b'),
                    _ => None,
                };
                match decoded {
                    Some(d) => {
                        out.push(d);
                        i += 2;
                    }
                    None => {
                        out.push(c);
                        i += 1;
                    }
                }
            }
            ('E', Some('S')) if chars.get(i + 2) == Some(&'C') && chars.get(i + 3) == Some(&'[') => {
                out.push('\x1b');
                i += 4;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Split a comma-separated data list, keeping commas inside quoted strings.
///
/// Items are trimmed and empty items are dropped.
pub fn split_data_list(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut items = Vec::new();
    let mut quote: Option<u8> = None;
    let mut start = 0usize;
    let mut idx = 0usize;
    while idx < bytes.len() {
        let c = bytes[idx];
        match quote {
            Some(_) if c == b'\\' => idx += 1,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == b'"' || c == b'\'' => quote = Some(c),
            None if c == b',' => {
                push_item(&mut items, &text[start..idx]);
                start = idx + 1;
            }
            None => {}
        }
        idx += 1;
    }
    push_item(&mut items, &text[start..]);
    items
}

fn push_item<'a>(items: &mut Vec<&'a str>, item: &'a str) {
    let item = item.trim();
    if !item.is_empty() {
        items.push(item);
    }
}

/// A simple cursor for scanning a line character by character.
pub struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Create a new cursor at the start of the input.
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    /// Text from the cursor to the end of the line.
    pub fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    /// Skip whitespace characters.
    pub fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    /// Peek at the current character without advancing.
    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Consume and return the current character.
    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume characters that are not part of a word (directive sigils).
    pub fn skip_sigils(&mut self) {
        while self
            .peek()
            .is_some_and(|c| matches!(c, '.' | '!' | '#'))
        {
            self.bump();
        }
    }

    /// Try to consume a symbol-like word, returning it if found.
    pub fn take_ident(&mut self) -> Option<&'a str> {
        let start = self.pos;
        let first = self.peek()?;
        if !is_ident_char(first) {
            return None;
        }
        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }
        Some(&self.text[start..self.pos])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_names() {
        assert!(is_symbol_name("loop_1"));
        assert!(is_symbol_name("_start"));
        assert!(!is_symbol_name("1abc"));
        assert!(!is_symbol_name("a-b"));
        assert!(!is_symbol_name(""));
    }

    #[test]
    fn test_split_comment() {
        assert_eq!(split_comment("code ; comment"), ("code ", "; comment"));
        assert_eq!(split_comment("no comment"), ("no comment", ""));
        assert_eq!(
            split_comment("\"str;ing\" ; comment"),
            ("\"str;ing\" ", "; comment")
        );
        assert_eq!(
            split_comment("'c;har' ; comment"),
            ("'c;har' ", "; comment")
        );
    }

    #[test]
    fn strips_slash_comments_outside_strings() {
        assert_eq!(strip_line_comment("lda #1 // load"), "lda #1 ");
        assert_eq!(strip_line_comment("byt \"a//b\""), "byt \"a//b\"");
    }

    #[test]
    fn decodes_escapes() {
        assert_eq!(decode_escapes("a\\nb"), "a\nb");
        assert_eq!(decode_escapes("^G"), "\x07");
        assert_eq!(decode_escapes("ESC[2J"), "\x1b2J");
        assert_eq!(decode_escapes("\\q"), "\\q");
        assert_eq!(decode_escapes("x^"), "x^");
    }

    #[test]
    fn splits_data_lists() {
        assert_eq!(split_data_list("1, 2 ,3"), vec!["1", "2", "3"]);
        assert_eq!(
            split_data_list("\"a,b\", $10"),
            vec!["\"a,b\"", "$10"]
        );
        assert_eq!(split_data_list("\"q\\\"x\", 1"), vec!["\"q\\\"x\"", "1"]);
        assert!(split_data_list("  ").is_empty());
    }

    #[test]
    fn cursor_takes_words_and_sigils() {
        let mut cursor = Cursor::new("  .org $8000");
        cursor.skip_ws();
        cursor.skip_sigils();
        assert_eq!(cursor.take_ident(), Some("org"));
        cursor.skip_ws();
        assert_eq!(cursor.rest(), "$8000");
    }
}
