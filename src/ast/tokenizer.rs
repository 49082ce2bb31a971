use crate::error::ParseError;
use std::iter::Peekable;
use std::str::CharIndices;

/// A lexical token with its byte position and length in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Integer(i64),
    FloatingPoint(f64),
    Symbol(String),
    LeftBracket,
    RightBracket,
    ArgumentSeparator,
    Operator(Operator),
}

impl TokenKind {
    /// Short textual form used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Integer(value) => value.to_string(),
            TokenKind::FloatingPoint(value) => format!("{:?}", value),
            TokenKind::Symbol(name) => name.clone(),
            TokenKind::LeftBracket => "(".to_string(),
            TokenKind::RightBracket => ")".to_string(),
            TokenKind::ArgumentSeparator => ",".to_string(),
            TokenKind::Operator(op) => op.symbol().to_string(),
        }
    }
}

/// Binary operators recognised by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    /// A lone `=`. Lexes, but the grammar has no use for it; the parser
    /// rejects it as an unexpected token.
    Assign,
}

impl Operator {
    /// Operators with higher precedence bind tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Or => 1,
            Operator::And => 2,
            Operator::Equal | Operator::NotEqual => 3,
            Operator::LessThan
            | Operator::LessOrEqual
            | Operator::GreaterThan
            | Operator::GreaterOrEqual => 4,
            Operator::Add | Operator::Subtract => 5,
            Operator::Multiply | Operator::Divide | Operator::Modulo => 6,
            Operator::Power => 7,
            Operator::Assign => 0,
        }
    }

    pub fn is_left_associative(self) -> bool {
        !matches!(self, Operator::Power)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Or => "||",
            Operator::And => "&&",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Modulo => "%",
            Operator::Power => "^",
            Operator::Assign => "=",
        }
    }
}

/// Splits raw expression text into an ordered token list.
///
/// The decimal and argument separator characters are configurable so that
/// `1,5` can be a number in one locale and two arguments in another. The two
/// characters are guaranteed distinct by the evaluator configuration.
pub struct Tokenizer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    decimal_separator: char,
    argument_separator: char,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str, decimal_separator: char, argument_separator: char) -> Self {
        Tokenizer {
            source,
            chars: source.char_indices().peekable(),
            decimal_separator,
            argument_separator,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }

        let (start, c) = match self.chars.next() {
            Some(pair) => pair,
            None => return Ok(None),
        };

        if c.is_ascii_digit() {
            return self.scan_number(start, c).map(Some);
        }
        if c.is_alphabetic() || c == '_' {
            return Ok(Some(self.scan_symbol(start, c)));
        }
        if c == '(' {
            return Ok(Some(Token {
                kind: TokenKind::LeftBracket,
                start,
                len: 1,
            }));
        }
        if c == ')' {
            return Ok(Some(Token {
                kind: TokenKind::RightBracket,
                start,
                len: 1,
            }));
        }
        if c == self.argument_separator {
            return Ok(Some(Token {
                kind: TokenKind::ArgumentSeparator,
                start,
                len: 1,
            }));
        }
        self.scan_operator(start, c).map(Some)
    }

    /// Maximal-munch numeric literal: digits, at most one decimal separator,
    /// and an optional trailing exponent. A literal without separator or
    /// exponent is an integer; it is promoted to floating point when it does
    /// not fit in an `i64`.
    fn scan_number(&mut self, start: usize, first: char) -> Result<Token, ParseError> {
        let mut text = String::new();
        text.push(first);
        let mut is_floating_point = false;

        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.chars.next();
            } else if c == self.decimal_separator && !is_floating_point {
                is_floating_point = true;
                text.push('.');
                self.chars.next();
            } else {
                break;
            }
        }

        // An exponent is only consumed when a complete `e[+-]?digits` run
        // follows; otherwise the literal ends here and the `e` lexes as the
        // start of a symbol.
        if let Some(&(_, c)) = self.chars.peek() {
            if c == 'e' || c == 'E' {
                let mut lookahead = self.chars.clone();
                lookahead.next();
                let mut exponent = String::new();
                exponent.push('e');
                if let Some(&(_, sign)) = lookahead.peek() {
                    if sign == '+' || sign == '-' {
                        exponent.push(sign);
                        lookahead.next();
                    }
                }
                let mut has_digits = false;
                while let Some(&(_, d)) = lookahead.peek() {
                    if d.is_ascii_digit() {
                        exponent.push(d);
                        has_digits = true;
                        lookahead.next();
                    } else {
                        break;
                    }
                }
                if has_digits {
                    is_floating_point = true;
                    text.push_str(&exponent);
                    self.chars = lookahead;
                }
            }
        }

        let len = text.len();
        if !is_floating_point {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(Token {
                    kind: TokenKind::Integer(value),
                    start,
                    len,
                });
            }
        }
        let value = text
            .parse::<f64>()
            .map_err(|_| ParseError::MalformedNumber {
                literal: text.clone(),
                position: start,
            })?;
        Ok(Token {
            kind: TokenKind::FloatingPoint(value),
            start,
            len,
        })
    }

    fn scan_symbol(&mut self, start: usize, first: char) -> Token {
        let mut end = start + first.len_utf8();
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        Token {
            kind: TokenKind::Symbol(self.source[start..end].to_string()),
            start,
            len: end - start,
        }
    }

    fn scan_operator(&mut self, start: usize, c: char) -> Result<Token, ParseError> {
        let mut len = 1;
        let op = match c {
            '+' => Operator::Add,
            '-' => Operator::Subtract,
            '*' => Operator::Multiply,
            '/' => Operator::Divide,
            '%' => Operator::Modulo,
            '^' => Operator::Power,
            '<' => match self.chars.peek() {
                Some(&(_, '=')) => {
                    self.chars.next();
                    len = 2;
                    Operator::LessOrEqual
                }
                Some(&(_, '>')) => {
                    self.chars.next();
                    len = 2;
                    Operator::NotEqual
                }
                _ => Operator::LessThan,
            },
            '>' => match self.chars.peek() {
                Some(&(_, '=')) => {
                    self.chars.next();
                    len = 2;
                    Operator::GreaterOrEqual
                }
                _ => Operator::GreaterThan,
            },
            '=' => match self.chars.peek() {
                Some(&(_, '=')) => {
                    self.chars.next();
                    len = 2;
                    Operator::Equal
                }
                _ => Operator::Assign,
            },
            '!' => match self.chars.peek() {
                Some(&(_, '=')) => {
                    self.chars.next();
                    len = 2;
                    Operator::NotEqual
                }
                _ => {
                    return Err(ParseError::UnexpectedCharacter {
                        character: '!',
                        position: start,
                    })
                }
            },
            '&' => match self.chars.peek() {
                Some(&(_, '&')) => {
                    self.chars.next();
                    len = 2;
                    Operator::And
                }
                _ => {
                    return Err(ParseError::UnexpectedCharacter {
                        character: '&',
                        position: start,
                    })
                }
            },
            '|' => match self.chars.peek() {
                Some(&(_, '|')) => {
                    self.chars.next();
                    len = 2;
                    Operator::Or
                }
                _ => {
                    return Err(ParseError::UnexpectedCharacter {
                        character: '|',
                        position: start,
                    })
                }
            },
            other => {
                return Err(ParseError::UnexpectedCharacter {
                    character: other,
                    position: start,
                })
            }
        };
        Ok(Token {
            kind: TokenKind::Operator(op),
            start,
            len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Result<Vec<TokenKind>, ParseError> {
        Tokenizer::new(source, '.', ',')
            .tokenize()
            .map(|tokens| tokens.into_iter().map(|t| t.kind).collect())
    }

    #[test]
    fn test_integer_and_float_literals() {
        assert_eq!(
            tokenize("42 3.25 7."),
            Ok(vec![
                TokenKind::Integer(42),
                TokenKind::FloatingPoint(3.25),
                TokenKind::FloatingPoint(7.0),
            ])
        );
    }

    #[test]
    fn test_exponent_literals() {
        assert_eq!(
            tokenize("2e3 1.5E-2 3e+1"),
            Ok(vec![
                TokenKind::FloatingPoint(2000.0),
                TokenKind::FloatingPoint(0.015),
                TokenKind::FloatingPoint(30.0),
            ])
        );
    }

    #[test]
    fn test_dangling_exponent_is_a_symbol_boundary() {
        // `2e` is the integer 2 followed by the symbol `e`; the adjacency is
        // rejected later, by the validator and parser.
        assert_eq!(
            tokenize("2e"),
            Ok(vec![
                TokenKind::Integer(2),
                TokenKind::Symbol("e".to_string()),
            ])
        );
    }

    #[test]
    fn test_integer_overflow_promotes_to_float() {
        assert_eq!(
            tokenize("9223372036854775808"),
            Ok(vec![TokenKind::FloatingPoint(9.223372036854776e18)])
        );
    }

    #[test]
    fn test_comma_decimal_separator() {
        let tokens = Tokenizer::new("1,5; 2,25", ',', ';')
            .tokenize()
            .map(|tokens| tokens.into_iter().map(|t| t.kind).collect::<Vec<_>>());
        assert_eq!(
            tokens,
            Ok(vec![
                TokenKind::FloatingPoint(1.5),
                TokenKind::ArgumentSeparator,
                TokenKind::FloatingPoint(2.25),
            ])
        );
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            tokenize("<= >= != <> == && || < > ="),
            Ok(vec![
                TokenKind::Operator(Operator::LessOrEqual),
                TokenKind::Operator(Operator::GreaterOrEqual),
                TokenKind::Operator(Operator::NotEqual),
                TokenKind::Operator(Operator::NotEqual),
                TokenKind::Operator(Operator::Equal),
                TokenKind::Operator(Operator::And),
                TokenKind::Operator(Operator::Or),
                TokenKind::Operator(Operator::LessThan),
                TokenKind::Operator(Operator::GreaterThan),
                TokenKind::Operator(Operator::Assign),
            ])
        );
    }

    #[test]
    fn test_symbols() {
        assert_eq!(
            tokenize("var1 _tmp sin"),
            Ok(vec![
                TokenKind::Symbol("var1".to_string()),
                TokenKind::Symbol("_tmp".to_string()),
                TokenKind::Symbol("sin".to_string()),
            ])
        );
    }

    #[test]
    fn test_positions_and_lengths() {
        let tokens = Tokenizer::new("12 + abc", '.', ',').tokenize().unwrap();
        assert_eq!((tokens[0].start, tokens[0].len), (0, 2));
        assert_eq!((tokens[1].start, tokens[1].len), (3, 1));
        assert_eq!((tokens[2].start, tokens[2].len), (5, 3));
    }

    #[test]
    fn test_unknown_characters_are_rejected() {
        for (source, character, position) in [("2 # 3", '#', 2), ("a ? b", '?', 2), ("@x", '@', 0)]
        {
            assert_eq!(
                tokenize(source),
                Err(ParseError::UnexpectedCharacter {
                    character,
                    position
                })
            );
        }
    }

    #[test]
    fn test_single_ampersand_and_pipe_are_rejected() {
        assert_eq!(
            tokenize("1 & 2"),
            Err(ParseError::UnexpectedCharacter {
                character: '&',
                position: 2
            })
        );
        assert_eq!(
            tokenize("1 | 2"),
            Err(ParseError::UnexpectedCharacter {
                character: '|',
                position: 2
            })
        );
    }

    #[test]
    fn test_second_decimal_separator_ends_the_literal() {
        assert_eq!(
            tokenize("1.2.3"),
            Err(ParseError::UnexpectedCharacter {
                character: '.',
                position: 3
            })
        );
    }
}
