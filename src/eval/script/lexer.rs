//! Tokenizer for the snippet language.

use crate::eval::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    /// A line break separates this token from the previous one.
    pub newline_before: bool,
}

// Longest first so that `===` wins over `==` and `=`.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "**", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=",
    "%=", "=>", "+", "-", "*", "/", "%", "<", ">", "=", "!", "(", ")", "{", "}", "[", "]", ",",
    ";", ".", "?", ":",
];

pub fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut newline_before = false;

    while i < chars.len() {
        let c = chars[i];

        if c == '\n' {
            line += 1;
            newline_before = true;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Comments
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let start_line = line;
            i += 2;
            loop {
                match chars.get(i) {
                    None => return Err(EvalError::syntax("unterminated comment", start_line)),
                    Some('*') if chars.get(i + 1) == Some(&'/') => {
                        i += 2;
                        break;
                    }
                    Some('\n') => {
                        line += 1;
                        newline_before = true;
                        i += 1;
                    }
                    Some(_) => i += 1,
                }
            }
            continue;
        }

        let token_line = line;
        let kind = if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            let (n, next) = read_number(&chars, i, line)?;
            i = next;
            TokenKind::Number(n)
        } else if c == '"' || c == '\'' {
            let (s, next) = read_string(&chars, i, line)?;
            i = next;
            TokenKind::Str(s)
        } else if c == '_' || c == '$' || c.is_alphabetic() {
            let start = i;
            while i < chars.len() && (chars[i] == '_' || chars[i] == '$' || chars[i].is_alphanumeric()) {
                i += 1;
            }
            TokenKind::Ident(chars[start..i].iter().collect())
        } else if c == '`' {
            return Err(EvalError::syntax("template literals are not supported", line));
        } else {
            let punct = PUNCTUATORS
                .iter()
                .find(|p| p.chars().enumerate().all(|(k, pc)| chars.get(i + k) == Some(&pc)))
                .ok_or_else(|| EvalError::syntax(format!("unexpected character '{c}'"), line))?;
            i += punct.chars().count();
            TokenKind::Punct(punct)
        };

        tokens.push(Token { kind, line: token_line, newline_before });
        newline_before = false;
    }

    tokens.push(Token { kind: TokenKind::Eof, line, newline_before });
    Ok(tokens)
}

fn read_number(chars: &[char], start: usize, line: usize) -> Result<(f64, usize), EvalError> {
    let mut i = start;
    if chars[i] == '0' && matches!(chars.get(i + 1), Some('x' | 'X')) {
        i += 2;
        let digits_start = i;
        while i < chars.len() && chars[i].is_ascii_hexdigit() {
            i += 1;
        }
        let digits: String = chars[digits_start..i].iter().collect();
        let n = u64::from_str_radix(&digits, 16)
            .map_err(|_| EvalError::syntax("invalid hexadecimal literal", line))?;
        return Ok((n as f64, i));
    }

    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if matches!(chars.get(i), Some('e' | 'E')) {
        let mut j = i + 1;
        if matches!(chars.get(j), Some('+' | '-')) {
            j += 1;
        }
        if chars.get(j).is_some_and(|d| d.is_ascii_digit()) {
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    if chars.get(i).is_some_and(|c| c.is_alphabetic() || *c == '_') {
        return Err(EvalError::syntax("invalid or unexpected token", line));
    }

    let text: String = chars[start..i].iter().collect();
    let n = text
        .parse::<f64>()
        .map_err(|_| EvalError::syntax(format!("invalid number '{text}'"), line))?;
    Ok((n, i))
}

fn read_string(chars: &[char], start: usize, line: usize) -> Result<(String, usize), EvalError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    loop {
        match chars.get(i) {
            None | Some('\n') => return Err(EvalError::syntax("unterminated string literal", line)),
            Some(c) if *c == quote => return Ok((out, i + 1)),
            Some('\\') => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| EvalError::syntax("unterminated string literal", line))?;
                i += 2;
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    'u' => {
                        let hex: String = chars.iter().skip(i).take(4).collect();
                        let code = u32::from_str_radix(&hex, 16)
                            .ok()
                            .filter(|_| hex.len() == 4)
                            .and_then(char::from_u32)
                            .ok_or_else(|| EvalError::syntax("invalid unicode escape", line))?;
                        out.push(code);
                        i += 4;
                    }
                    other => out.push(*other),
                }
            }
            Some(c) => {
                out.push(*c);
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_punctuators_longest_match() {
        assert_eq!(
            kinds("a === b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct("==="),
                TokenKind::Ident("b".into()),
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("x**=2")[1], TokenKind::Punct("**"));
    }

    #[test]
    fn test_strings_and_numbers() {
        assert_eq!(kinds(r#"'it\'s' "a\nb""#)[..2], [TokenKind::Str("it's".into()), TokenKind::Str("a\nb".into())]);
        assert_eq!(kinds("1.5e2 0xff .5")[..3], [TokenKind::Number(150.0), TokenKind::Number(255.0), TokenKind::Number(0.5)]);
    }

    #[test]
    fn test_newline_tracking_and_comments() {
        let tokens = tokenize("a // one\n/* two\n */ b").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Ident("b".into()));
        assert!(tokens[1].newline_before);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(tokenize("'open"), Err(EvalError::Syntax { .. })));
        assert!(matches!(tokenize("a # b"), Err(EvalError::Syntax { .. })));
        assert!(matches!(tokenize("3abc"), Err(EvalError::Syntax { .. })));
    }
}
