//! Query tokenizer.
//!
//! Tokens are barewords, quoted strings (`"`, `'` or backtick), one-char
//! punctuation and two-char comparators. The lexer tracks the raw source
//! text of each token, whether whitespace preceded it and whether it was
//! quoted; quoted tokens never act as keywords.

use logsql_result::{Error, Result};

const PUNCT: &[char] = &['(', ')', '{', '}', '[', ']', ',', ':', '|', '*'];

pub struct Lexer<'a> {
    input: &'a str,
    offset: usize,
    /// Decoded text of the current token; empty at end of input.
    pub token: String,
    /// Raw source text of the current token, including quotes.
    pub raw_token: String,
    /// Byte offset of the current token in the input.
    pub token_offset: usize,
    /// Whether whitespace separated this token from the previous one.
    pub is_skipped_space: bool,
    /// Whether the current token was quoted.
    pub is_quoted: bool,
    /// Timestamp the query is evaluated at; anchors `now` and relative
    /// durations.
    pub current_timestamp: i64,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, current_timestamp: i64) -> Self {
        Lexer {
            input,
            offset: 0,
            token: String::new(),
            raw_token: String::new(),
            token_offset: 0,
            is_skipped_space: false,
            is_quoted: false,
            current_timestamp,
        }
    }

    /// True once the input is exhausted. A quoted empty string is a real
    /// token, not the end sentinel.
    pub fn at_end(&self) -> bool {
        self.token.is_empty() && !self.is_quoted
    }

    /// Case-insensitive keyword check; never matches quoted tokens.
    pub fn is_keyword(&self, kw: &str) -> bool {
        !self.is_quoted && !self.at_end() && self.token.eq_ignore_ascii_case(kw)
    }

    pub fn is_any_keyword(&self, kws: &[&str]) -> bool {
        kws.iter().any(|kw| self.is_keyword(kw))
    }

    pub fn error(&self, message: impl std::fmt::Display) -> Error {
        Error::parse(self.token_offset, message)
    }

    /// Advance to the next token.
    pub fn next_token(&mut self) -> Result<()> {
        let rest = &self.input[self.offset..];
        let trimmed = rest.trim_start();
        self.is_skipped_space = trimmed.len() != rest.len();
        self.offset = self.input.len() - trimmed.len();
        self.token_offset = self.offset;
        self.is_quoted = false;

        let mut chars = trimmed.chars();
        let Some(c) = chars.next() else {
            self.token.clear();
            self.raw_token.clear();
            return Ok(());
        };

        match c {
            '"' | '\'' => self.scan_quoted(c),
            '`' => self.scan_backtick(),
            '=' => {
                if trimmed[1..].starts_with('~') {
                    self.take(2)
                } else {
                    self.take(1)
                }
            }
            '!' => {
                if trimmed[1..].starts_with('~') || trimmed[1..].starts_with('=') {
                    self.take(2)
                } else {
                    self.take(1)
                }
            }
            c if PUNCT.contains(&c) => self.take(c.len_utf8()),
            _ => {
                let end = trimmed
                    .find(|c: char| {
                        c.is_whitespace()
                            || PUNCT.contains(&c)
                            || matches!(c, '"' | '\'' | '`' | '=' | '!')
                    })
                    .unwrap_or(trimmed.len());
                self.take(end)
            }
        }
    }

    fn take(&mut self, len: usize) -> Result<()> {
        let text = &self.input[self.offset..self.offset + len];
        self.token.clear();
        self.token.push_str(text);
        self.raw_token.clear();
        self.raw_token.push_str(text);
        self.offset += len;
        Ok(())
    }

    fn scan_quoted(&mut self, quote: char) -> Result<()> {
        let start = self.offset;
        let rest = &self.input[start..];
        let mut decoded = String::new();
        let mut iter = rest.char_indices();
        iter.next(); // opening quote
        while let Some((i, c)) = iter.next() {
            match c {
                c if c == quote => {
                    let end = start + i + c.len_utf8();
                    self.token = decoded;
                    self.raw_token.clear();
                    self.raw_token.push_str(&self.input[start..end]);
                    self.is_quoted = true;
                    self.offset = end;
                    return Ok(());
                }
                '\\' => {
                    let Some((_, esc)) = iter.next() else { break };
                    match esc {
                        '\\' | '"' | '\'' | '`' | '/' => decoded.push(esc),
                        'n' => decoded.push('\n'),
                        't' => decoded.push('\t'),
                        'r' => decoded.push('\r'),
                        'x' | 'u' => {
                            let want = if esc == 'x' { 2 } else { 4 };
                            let mut code = 0u32;
                            for _ in 0..want {
                                let Some((_, h)) = iter.next() else {
                                    return Err(self.error("truncated escape sequence"));
                                };
                                let d = h
                                    .to_digit(16)
                                    .ok_or_else(|| self.error("invalid escape sequence"))?;
                                code = code * 16 + d;
                            }
                            let c = char::from_u32(code)
                                .ok_or_else(|| self.error("invalid escape sequence"))?;
                            decoded.push(c);
                        }
                        other => {
                            return Err(self.error(format!("unknown escape \\{other}")));
                        }
                    }
                }
                c => decoded.push(c),
            }
        }
        Err(self.error("missing closing quote"))
    }

    fn scan_backtick(&mut self) -> Result<()> {
        let start = self.offset;
        let rest = &self.input[start + 1..];
        match rest.find('`') {
            Some(i) => {
                let end = start + 1 + i + 1;
                self.token.clear();
                self.token.push_str(&rest[..i]);
                self.raw_token.clear();
                self.raw_token.push_str(&self.input[start..end]);
                self.is_quoted = true;
                self.offset = end;
                Ok(())
            }
            None => Err(self.error("missing closing backtick")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<String> {
        let mut lex = Lexer::new(s, 0);
        let mut out = Vec::new();
        loop {
            lex.next_token().unwrap();
            if lex.at_end() {
                return out;
            }
            out.push(lex.token.clone());
        }
    }

    #[test]
    fn basic_tokens() {
        assert!(tokens("").is_empty());
        assert!(tokens("  ").is_empty());
        assert_eq!(tokens("foo"), ["foo"]);
        assert_eq!(tokens("тест123"), ["тест123"]);
        assert_eq!(tokens("foo:bar"), ["foo", ":", "bar"]);
        assert_eq!(
            tokens(r#" re   (  "тест(\":"  )  "#),
            ["re", "(", "тест(\":", ")"]
        );
    }

    #[test]
    fn quotes_and_punct() {
        assert_eq!(
            tokens(" `foo, bar`* AND baz:(abc or 'd\\'\"ЙЦУК `'*)"),
            [
                "foo, bar",
                "*",
                "AND",
                "baz",
                ":",
                "(",
                "abc",
                "or",
                "d'\"ЙЦУК `",
                "*",
                ")"
            ]
        );
    }

    #[test]
    fn comparators() {
        assert_eq!(
            tokens(r#"_stream:{foo="bar",a=~"baz", b != 'cd',"d,}a"!~abc}"#),
            [
                "_stream", ":", "{", "foo", "=", "bar", ",", "a", "=~", "baz", ",", "b", "!=",
                "cd", ",", "d,}a", "!~", "abc", "}"
            ]
        );
    }

    #[test]
    fn space_tracking() {
        let mut lex = Lexer::new("foo* bar *", 0);
        lex.next_token().unwrap();
        assert_eq!(lex.token, "foo");
        lex.next_token().unwrap();
        assert_eq!(lex.token, "*");
        assert!(!lex.is_skipped_space);
        lex.next_token().unwrap();
        assert_eq!(lex.token, "bar");
        assert!(lex.is_skipped_space);
        lex.next_token().unwrap();
        assert_eq!(lex.token, "*");
        assert!(lex.is_skipped_space);
    }

    #[test]
    fn unterminated_quote() {
        let mut lex = Lexer::new("\"foo", 0);
        assert!(lex.next_token().is_err());
        let mut lex = Lexer::new("`foo", 0);
        assert!(lex.next_token().is_err());
    }

    #[test]
    fn quoted_tokens_are_not_keywords() {
        let mut lex = Lexer::new("'and' and", 0);
        lex.next_token().unwrap();
        assert_eq!(lex.token, "and");
        assert!(!lex.is_keyword("and"));
        lex.next_token().unwrap();
        assert!(lex.is_keyword("and"));
        assert!(lex.is_keyword("AND"));
    }
}
