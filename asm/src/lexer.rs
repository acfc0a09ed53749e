use crate::error::Error;
use crate::token::{Token, TokenKind};
use std::iter::Peekable;
use std::str::CharIndices;
use z80_arch::Keyword;

/// Tokenizes one line of source text.
pub fn tokenize(line: &str) -> Result<Vec<Token>, Error> {
    LineLexer::new(line).parse()
}

pub struct LineLexer<'a> {
    iter: Peekable<CharIndices<'a>>,
    tokens: Vec<Token>,
}

impl<'a> LineLexer<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            iter: line.char_indices().peekable(),
            tokens: Vec::new(),
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

impl<'a> LineLexer<'a> {
    fn peek_nth(&self, n: usize) -> Option<(usize, char)> {
        self.iter.clone().nth(n)
    }

    fn consume(&mut self) -> Option<(usize, char)> {
        self.iter.next()
    }

    fn push(&mut self, kind: TokenKind, col: usize) {
        self.tokens.push(Token::new(kind, col));
    }

    fn after_value(&self) -> bool {
        self.tokens
            .last()
            .map(|token| token.kind.ends_value())
            .unwrap_or(false)
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, first: char, cond: F) -> String {
        let mut lexeme = String::from(first);
        while let Some((_, ch)) = self.iter.next_if(|&(_, ch)| cond(ch)) {
            lexeme.push(ch);
        }
        lexeme
    }
}

// ----------------------------------------------------------------------------
// Lexer
// ----------------------------------------------------------------------------

impl<'a> LineLexer<'a> {
    pub fn parse(mut self) -> Result<Vec<Token>, Error> {
        while let Some((idx, ch0)) = self.peek_nth(0) {
            // 0. Skip whitespaces
            if ch0.is_whitespace() {
                self.consume();
                continue;
            }

            // 1. Comment
            if ch0 == ';' {
                self.consume();
                let comment = self.iter.by_ref().map(|(_, ch)| ch).collect::<String>();
                self.push(TokenKind::Comment(comment), idx);
                break;
            }

            // 2. Double character token
            if let Some((_, ch1)) = self.peek_nth(1) {
                if let Some(kind) = double_char_token(ch0, ch1) {
                    self.consume();
                    self.consume();
                    self.push(kind, idx);
                    continue;
                }
            }

            // 3. Prefixed numbers: $FF, %1010
            if ch0 == '$' {
                self.consume();
                match self.iter.peek() {
                    Some(&(_, ch)) if ch.is_ascii_hexdigit() => {
                        let digits = self.take_radix_digits();
                        let kind = number(format!("${digits}"), &digits, 16)?;
                        self.push(kind, idx);
                    }
                    _ => self.push(TokenKind::Dollar, idx),
                }
                continue;
            }
            if ch0 == '%' && !self.after_value() {
                if let Some((_, '0' | '1')) = self.peek_nth(1) {
                    self.consume();
                    let digits = self.take_radix_digits();
                    let kind = number(format!("%{digits}"), &digits, 2)?;
                    self.push(kind, idx);
                    continue;
                }
            }

            // 4. Single character token
            if let Some(kind) = single_char_token(ch0) {
                self.consume();
                self.push(kind, idx);
                continue;
            }

            // 5. Number literal
            if ch0.is_ascii_digit() {
                let digits = self.take_radix_digits();
                let kind = parse_number(&digits)?;
                self.push(kind, idx);
                continue;
            }

            // 6. Char or string literal
            if ch0 == '\'' || ch0 == '"' {
                let kind = self.parse_quoted(ch0)?;
                self.push(kind, idx);
                continue;
            }

            // 7. Identifier or keyword
            if ch0.is_ascii_alphabetic() || ch0 == '_' || ch0 == '.' {
                let kind = self.parse_word();
                self.push(kind, idx);
                continue;
            }

            return Err(Error::LexError(format!(
                "unexpected character `{ch0}` at column {}",
                idx + 1
            )));
        }
        Ok(self.tokens)
    }

    fn take_radix_digits(&mut self) -> String {
        let mut lexeme = String::new();
        while let Some((_, ch)) = self.iter.next_if(|(_, ch)| ch.is_ascii_alphanumeric()) {
            lexeme.push(ch);
        }
        lexeme
    }

    fn parse_word(&mut self) -> TokenKind {
        let (_, ch) = self.consume().unwrap_or_default();
        let lexeme = self.take_while(ch, |ch| {
            matches!(ch, '_' | '.' | '0'..='9' | 'a'..='z' | 'A'..='Z')
        });

        // af' is a single register name
        if lexeme.eq_ignore_ascii_case("af") {
            if let Some(&(_, '\'')) = self.iter.peek() {
                self.consume();
                return TokenKind::Keyword(Keyword::AfShadow);
            }
        }

        match Keyword::parse(&lexeme) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident(lexeme),
        }
    }

    // Text: "hoge\n" or 'hoge'; a single quoted char is a Char
    fn parse_quoted(&mut self, quote: char) -> Result<TokenKind, Error> {
        self.consume();

        let mut lexeme = String::new();
        loop {
            match self.consume() {
                None => {
                    return Err(Error::LexError(format!(
                        "unterminated literal, expected closing {quote}"
                    )))
                }
                Some((_, '\\')) => match self.consume() {
                    Some((_, ch)) => lexeme.push(escape(ch)?),
                    None => return Err(Error::LexError("unterminated escape".to_string())),
                },
                Some((_, ch)) if ch == quote => break,
                Some((_, ch)) => lexeme.push(ch),
            }
        }

        let mut chars = lexeme.chars();
        match (quote, chars.next(), chars.next()) {
            ('\'', Some(ch), None) => Ok(TokenKind::Char(ch)),
            _ => Ok(TokenKind::Text(lexeme)),
        }
    }
}

fn escape(ch: char) -> Result<char, Error> {
    Ok(match ch {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        '\\' => '\\',
        '\'' => '\'',
        '"' => '"',
        ch => return Err(Error::LexError(format!("invalid escape `\\{ch}`"))),
    })
}

/// Interprets an alphanumeric run that starts with a digit:
/// `0FFH`, `0x1F`, `1010B`, `0b1010`, `123`.
fn parse_number(lexeme: &str) -> Result<TokenKind, Error> {
    let lower = lexeme.to_ascii_lowercase();
    let all = |s: &str, radix: u32| !s.is_empty() && s.chars().all(|c| c.is_digit(radix));

    if let Some(digits) = lower.strip_suffix('h').filter(|d| all(d, 16)) {
        return number(lexeme.to_string(), digits, 16);
    }
    if let Some(digits) = lower.strip_prefix("0x").filter(|d| all(d, 16)) {
        return number(lexeme.to_string(), digits, 16);
    }
    if let Some(digits) = lower.strip_suffix('b').filter(|d| all(d, 2)) {
        return number(lexeme.to_string(), digits, 2);
    }
    if let Some(digits) = lower.strip_prefix("0b").filter(|d| all(d, 2)) {
        return number(lexeme.to_string(), digits, 2);
    }
    if all(&lower, 10) {
        return number(lexeme.to_string(), &lower, 10);
    }
    Err(Error::LexError(format!("malformed number `{lexeme}`")))
}

/// Values up to 32 bits are accepted; the upper half wraps into the sign.
fn number(lexeme: String, digits: &str, radix: u32) -> Result<TokenKind, Error> {
    match u32::from_str_radix(digits, radix) {
        Ok(value) => Ok(TokenKind::Number(lexeme, value as i32)),
        Err(_) => Err(Error::LexError(format!("malformed number `{lexeme}`"))),
    }
}

fn double_char_token(ch0: char, ch1: char) -> Option<TokenKind> {
    match (ch0, ch1) {
        ('<', '<') => Some(TokenKind::LAngleLAngle),
        ('>', '>') => Some(TokenKind::RAngleRAngle),
        _ => None,
    }
}

fn single_char_token(ch: char) -> Option<TokenKind> {
    match ch {
        '+' => Some(TokenKind::Plus),
        '-' => Some(TokenKind::Minus),
        '*' => Some(TokenKind::Star),
        '/' => Some(TokenKind::Slash),
        '%' => Some(TokenKind::Percent),
        '&' => Some(TokenKind::Ampasand),
        '|' => Some(TokenKind::Pipe),
        '^' => Some(TokenKind::Caret),
        '~' => Some(TokenKind::Tilde),
        ':' => Some(TokenKind::Colon),
        ',' => Some(TokenKind::Comma),
        '(' => Some(TokenKind::LParen),
        ')' => Some(TokenKind::RParen),
        '#' => Some(TokenKind::Hash),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn kinds(line: &str) -> Vec<TokenKind> {
        tokenize(line).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn value(line: &str) -> i32 {
        match kinds(line).as_slice() {
            [Number(_, v)] => *v,
            other => panic!("not a single number: {other:?}"),
        }
    }

    #[test]
    fn radixes() {
        assert_eq!(value("0ABH"), 0xAB);
        assert_eq!(value("0B1H"), 0xB1);
        assert_eq!(value("1010B"), 10);
        assert_eq!(value("0b1010"), 10);
        assert_eq!(value("0x1F"), 0x1F);
        assert_eq!(value("$1f"), 0x1F);
        assert_eq!(value("%101"), 5);
        assert_eq!(value("1234"), 1234);
        assert_eq!(value("0FFFFFFFFh"), -1);
    }

    #[test]
    fn registers_are_normalized() {
        assert_eq!(
            kinds("LD A,(IX+5)"),
            vec![
                Ident("LD".to_string()),
                Keyword(z80_arch::Keyword::A),
                Comma,
                LParen,
                Keyword(z80_arch::Keyword::Ix),
                Plus,
                Number("5".to_string(), 5),
                RParen,
            ]
        );
        assert_eq!(
            kinds("ex af,AF'"),
            vec![
                Ident("ex".to_string()),
                Keyword(z80_arch::Keyword::Af),
                Comma,
                Keyword(z80_arch::Keyword::AfShadow),
            ]
        );
    }

    #[test]
    fn dollar_and_percent() {
        assert_eq!(
            kinds("$+1"),
            vec![Dollar, Plus, Number("1".to_string(), 1)]
        );
        assert_eq!(
            kinds("10 % 3"),
            vec![
                Number("10".to_string(), 10),
                Percent,
                Number("3".to_string(), 3)
            ]
        );
    }

    #[test]
    fn literals_and_comments() {
        assert_eq!(
            kinds(r#"db "hi\n",'a' ; done"#),
            vec![
                Ident("db".to_string()),
                Text("hi\n".to_string()),
                Comma,
                Char('a'),
                Comment(" done".to_string()),
            ]
        );
    }

    #[test]
    fn errors() {
        assert!(matches!(tokenize("ld a,\"abc"), Err(Error::LexError(_))));
        assert!(matches!(tokenize("ld a,@"), Err(Error::LexError(_))));
        assert!(matches!(tokenize("12ab"), Err(Error::LexError(_))));
        assert!(matches!(tokenize("'\\q'"), Err(Error::LexError(_))));
    }
}
