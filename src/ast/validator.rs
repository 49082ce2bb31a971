use crate::ast::tokenizer::{Operator, Token, TokenKind};
use crate::error::ParseError;
use crate::functions::FunctionRegistry;

/// A cheap pre-pass over the token stream that reports placement problems
/// before the parser runs: bracket balance, operand/operator adjacency, and
/// function argument counts. It can be switched off in the evaluator
/// configuration, in which case the parser still catches everything, with
/// slightly blunter positions.
pub struct Validator<'a> {
    functions: &'a FunctionRegistry,
}

enum Frame {
    Plain,
    Call {
        name: String,
        expected: Option<usize>,
        position: usize,
        separators: usize,
        empty: bool,
    },
}

impl<'a> Validator<'a> {
    pub fn new(functions: &'a FunctionRegistry) -> Self {
        Validator { functions }
    }

    pub fn validate(&self, tokens: &[Token]) -> Result<(), ParseError> {
        if tokens.is_empty() {
            return Err(ParseError::EmptyExpression);
        }

        let mut frames: Vec<Frame> = Vec::new();
        let mut prev: Option<&TokenKind> = None;

        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match &token.kind {
                TokenKind::Integer(_) | TokenKind::FloatingPoint(_) => {
                    self.reject_after_operand(token, prev)?;
                }
                TokenKind::Symbol(name) => {
                    self.reject_after_operand(token, prev)?;
                    let followed_by_bracket =
                        matches!(tokens.get(i + 1).map(|t| &t.kind), Some(TokenKind::LeftBracket));
                    if followed_by_bracket {
                        let info = self.functions.get(name).ok_or_else(|| {
                            ParseError::UnknownFunction {
                                name: name.clone(),
                                position: token.start,
                            }
                        })?;
                        frames.push(Frame::Call {
                            name: info.name().to_string(),
                            expected: info.number_of_parameters(),
                            position: token.start,
                            separators: 0,
                            empty: true,
                        });
                        i += 2;
                        prev = Some(&tokens[i - 1].kind);
                        continue;
                    } else if self.functions.contains(name) {
                        // A function name used as an operand.
                        return Err(ParseError::UnexpectedToken {
                            token: name.clone(),
                            position: token.start,
                        });
                    }
                }
                TokenKind::LeftBracket => {
                    self.reject_after_operand(token, prev)?;
                    frames.push(Frame::Plain);
                }
                TokenKind::RightBracket => {
                    if matches!(prev, Some(TokenKind::Operator(_)))
                        || matches!(prev, Some(TokenKind::ArgumentSeparator))
                    {
                        return Err(ParseError::MissingOperand {
                            position: token.start,
                        });
                    }
                    match frames.pop() {
                        None => {
                            return Err(ParseError::MismatchedBrackets {
                                position: token.start,
                            });
                        }
                        Some(Frame::Plain) => {
                            if matches!(prev, Some(TokenKind::LeftBracket)) {
                                return Err(ParseError::MissingOperand {
                                    position: token.start,
                                });
                            }
                        }
                        Some(Frame::Call {
                            name,
                            expected,
                            position,
                            separators,
                            empty,
                        }) => {
                            let count = if empty { 0 } else { separators + 1 };
                            match expected {
                                Some(expected) if expected != count => {
                                    return Err(ParseError::ArityMismatch {
                                        name,
                                        expected: expected.to_string(),
                                        actual: count,
                                        position,
                                    });
                                }
                                None if count == 0 => {
                                    return Err(ParseError::ArityMismatch {
                                        name,
                                        expected: "at least 1".to_string(),
                                        actual: count,
                                        position,
                                    });
                                }
                                _ => {}
                            }
                        }
                    }
                    // The closed bracket pair is an operand of the
                    // enclosing call, if any.
                    if let Some(Frame::Call { empty, .. }) = frames.last_mut() {
                        *empty = false;
                    }
                }
                TokenKind::ArgumentSeparator => {
                    if !matches!(
                        prev,
                        Some(TokenKind::Integer(_))
                            | Some(TokenKind::FloatingPoint(_))
                            | Some(TokenKind::Symbol(_))
                            | Some(TokenKind::RightBracket)
                    ) {
                        return Err(ParseError::MissingOperand {
                            position: token.start,
                        });
                    }
                    match frames.last_mut() {
                        Some(Frame::Call { separators, .. }) => *separators += 1,
                        _ => {
                            return Err(ParseError::UnexpectedToken {
                                token: token.kind.describe(),
                                position: token.start,
                            });
                        }
                    }
                }
                TokenKind::Operator(op) => {
                    if *op == Operator::Assign {
                        return Err(ParseError::UnexpectedToken {
                            token: token.kind.describe(),
                            position: token.start,
                        });
                    }
                    let prefix_position = matches!(
                        prev,
                        None | Some(TokenKind::Operator(_))
                            | Some(TokenKind::LeftBracket)
                            | Some(TokenKind::ArgumentSeparator)
                    );
                    if prefix_position && *op != Operator::Subtract {
                        return Err(ParseError::MissingOperand {
                            position: token.start,
                        });
                    }
                }
            }
            if !matches!(token.kind, TokenKind::LeftBracket | TokenKind::RightBracket) {
                if let Some(Frame::Call { empty, .. }) = frames.last_mut() {
                    *empty = false;
                }
            }
            prev = Some(&token.kind);
            i += 1;
        }

        if let Some(token) = tokens.last() {
            if matches!(token.kind, TokenKind::Operator(_)) {
                return Err(ParseError::MissingOperand {
                    position: token.start,
                });
            }
        }
        if !frames.is_empty() {
            let position = tokens.last().map(|t| t.start + t.len).unwrap_or(0);
            return Err(ParseError::MismatchedBrackets { position });
        }
        Ok(())
    }

    fn reject_after_operand(&self, token: &Token, prev: Option<&TokenKind>) -> Result<(), ParseError> {
        if matches!(
            prev,
            Some(TokenKind::Integer(_))
                | Some(TokenKind::FloatingPoint(_))
                | Some(TokenKind::Symbol(_))
                | Some(TokenKind::RightBracket)
        ) {
            return Err(ParseError::UnexpectedToken {
                token: token.kind.describe(),
                position: token.start,
            });
        }
        Ok(())
    }
}
