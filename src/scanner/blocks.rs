// src/scanner/blocks.rs
//! Splits a module into independently parseable top-level blocks.
//!
//! A broken block must not poison its neighbours, so each block is handed to
//! the parser on its own.

/// A contiguous top-level region of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    pub text: &'a str,
    /// 0-based line index of the first line.
    pub start_line: usize,
    pub start_byte: usize,
    /// 0-based line index of the last line carrying code.
    pub last_code_line: usize,
}

/// Keywords that always open a fresh block at column 0, even when a previous
/// block left a bracket unbalanced.
const HARD_STARTS: &[&str] = &["def ", "class ", "async ", "@", "import ", "from "];

/// Column-0 keywords that continue the previous compound statement.
const CONTINUATIONS: &[&str] = &["else", "elif", "except", "finally"];

#[must_use]
pub fn split(source: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut state = LexState::default();
    let mut current: Option<Pending> = None;
    let mut offset = 0;

    for (idx, line) in source.split_inclusive('\n').enumerate() {
        let code = is_code_line(line);
        if code && state.triple.is_none() && opens_block(line, state.depth) {
            let glue_to_decorators = current.as_ref().is_some_and(|p| p.only_decorators);
            if !glue_to_decorators {
                if let Some(done) = current.take() {
                    blocks.push(done.finish(source, offset));
                }
                state.depth = 0;
            }
        }

        let pending = current.get_or_insert_with(|| Pending::new(idx, offset));
        if code {
            pending.last_code_line = idx;
            if !line.trim_start().starts_with('@') {
                pending.only_decorators = false;
            }
        }

        state.scan(line);
        offset += line.len();
    }

    if let Some(done) = current {
        blocks.push(done.finish(source, offset));
    }
    blocks.retain(|b| !b.text.trim().is_empty());
    blocks
}

struct Pending {
    start_line: usize,
    start_byte: usize,
    last_code_line: usize,
    only_decorators: bool,
}

impl Pending {
    fn new(start_line: usize, start_byte: usize) -> Self {
        Self {
            start_line,
            start_byte,
            last_code_line: start_line,
            only_decorators: true,
        }
    }

    fn finish(self, source: &str, end_byte: usize) -> Block<'_> {
        Block {
            text: &source[self.start_byte..end_byte],
            start_line: self.start_line,
            start_byte: self.start_byte,
            last_code_line: self.last_code_line,
        }
    }
}

fn is_code_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

fn opens_block(line: &str, depth: usize) -> bool {
    if line.starts_with(|c: char| c.is_whitespace()) {
        return false;
    }
    if HARD_STARTS.iter().any(|k| line.starts_with(k)) {
        return true;
    }
    if depth > 0 {
        return false;
    }
    !CONTINUATIONS.iter().any(|k| starts_with_keyword(line, k))
}

fn starts_with_keyword(line: &str, keyword: &str) -> bool {
    line.strip_prefix(keyword)
        .is_some_and(|rest| rest.starts_with(|c: char| c == ':' || c == '(' || c.is_whitespace()))
}

/// Minimal lexical state: bracket depth and open triple-quoted strings.
#[derive(Default)]
struct LexState {
    depth: usize,
    triple: Option<&'static str>,
}

impl LexState {
    fn scan(&mut self, line: &str) {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if let Some(delim) = self.triple {
                if bytes[i..].starts_with(delim.as_bytes()) {
                    self.triple = None;
                    i += 3;
                } else {
                    i += 1;
                }
                continue;
            }
            match bytes[i] {
                b'#' => return,
                b'"' | b'\'' => {
                    let delim = if bytes[i] == b'"' { "\"\"\"" } else { "'''" };
                    if bytes[i..].starts_with(delim.as_bytes()) {
                        self.triple = Some(delim);
                        i += 3;
                    } else {
                        i = skip_short_string(bytes, i);
                    }
                    continue;
                }
                b'(' | b'[' | b'{' => self.depth += 1,
                b')' | b']' | b'}' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
            i += 1;
        }
    }
}

fn skip_short_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heads(source: &str) -> Vec<usize> {
        split(source).iter().map(|b| b.start_line).collect()
    }

    #[test]
    fn splits_on_top_level_statements() {
        let src = "import os\n\ndef a():\n    return 1\n\nif x:\n    a()\nelse:\n    pass\n";
        assert_eq!(heads(src), vec![0, 2, 5]);
    }

    #[test]
    fn decorators_stay_with_their_definition() {
        let src = "@cache\n@trace\ndef a():\n    pass\n";
        assert_eq!(heads(src), vec![0]);
    }

    #[test]
    fn open_brackets_do_not_split_until_a_hard_start() {
        let src = "VALUES = [\n1,\n2]\ndef broken(:\n    x = 1\ndef fine():\n    pass\n";
        assert_eq!(heads(src), vec![0, 3, 5]);
    }

    #[test]
    fn triple_quoted_strings_are_opaque() {
        let src = "DOC = \"\"\"\ndef not_code():\n\"\"\"\nvalue = 1\n";
        assert_eq!(heads(src), vec![0, 3]);
    }

    #[test]
    fn non_ascii_docstrings_are_scanned_by_byte() {
        let src = "def f():\n    \"\"\"Café, résumé\"\"\"\n    return 1\n\ndef g():\n    \"\"\"\n    naïve ☃\n    \"\"\"\n\nx = 1\n";
        assert_eq!(heads(src), vec![0, 4, 9]);
    }

    #[test]
    fn last_code_line_skips_trailing_comments() {
        let src = "def a():\n    pass\n# trailing\n\ndef b():\n    pass\n";
        let blocks = split(src);
        assert_eq!(blocks[0].last_code_line, 1);
        assert_eq!(blocks[1].start_line, 4);
    }
}
