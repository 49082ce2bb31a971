use crate::ast::tokenizer::{Operator, Token, TokenKind};
use crate::ast::Expr;
use crate::constants::ConstantRegistry;
use crate::error::ParseError;
use crate::functions::{canonical_name, FunctionInfo, FunctionRegistry};
use log::debug;
use std::sync::Arc;

/// Shunting-yard parser producing an [`Expr`] tree directly from a token
/// list.
///
/// Identifiers are resolved during the scan: a registered constant is
/// inlined as a floating-point node, a symbol followed by `(` must be a
/// registered function, and anything else becomes a variable. Fixed-arity
/// functions are checked against their declared parameter count; dynamic
/// functions accept one or more arguments.
pub struct AstBuilder<'a> {
    functions: &'a FunctionRegistry,
    constants: &'a ConstantRegistry,
    case_sensitive: bool,
}

/// Operator-stack entries. Function calls double as their own opening
/// bracket and remember how many operands were on the stack when the call
/// opened, which is how the argument count is recovered at `)`.
enum StackEntry {
    Binary {
        op: Operator,
        position: usize,
    },
    UnaryMinus {
        position: usize,
    },
    LeftBracket {
        position: usize,
        base: usize,
    },
    FunctionCall {
        info: Arc<FunctionInfo>,
        name: String,
        position: usize,
        base: usize,
        separators: usize,
    },
}

impl StackEntry {
    fn precedence(&self) -> Option<u8> {
        match self {
            StackEntry::Binary { op, .. } => Some(op.precedence()),
            StackEntry::UnaryMinus { .. } => Some(8),
            _ => None,
        }
    }
}

/// What the previous token contributed, for operand/operator placement
/// checks and unary-minus detection.
#[derive(Clone, Copy, PartialEq)]
enum Prev {
    None,
    Operand,
    Operator,
    LeftBracket,
    RightBracket,
    Separator,
}

impl<'a> AstBuilder<'a> {
    pub fn new(
        functions: &'a FunctionRegistry,
        constants: &'a ConstantRegistry,
        case_sensitive: bool,
    ) -> Self {
        AstBuilder {
            functions,
            constants,
            case_sensitive,
        }
    }

    pub fn build(&self, tokens: &[Token]) -> Result<Expr, ParseError> {
        if tokens.is_empty() {
            return Err(ParseError::EmptyExpression);
        }

        let mut operands: Vec<Expr> = Vec::new();
        let mut operators: Vec<StackEntry> = Vec::new();
        let mut prev = Prev::None;

        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match &token.kind {
                TokenKind::Integer(value) => {
                    self.check_operand_position(token, prev)?;
                    operands.push(Expr::IntegerConstant(*value));
                    prev = Prev::Operand;
                }
                TokenKind::FloatingPoint(value) => {
                    self.check_operand_position(token, prev)?;
                    operands.push(Expr::FloatingPointConstant(*value));
                    prev = Prev::Operand;
                }
                TokenKind::Symbol(name) => {
                    self.check_operand_position(token, prev)?;
                    let followed_by_bracket =
                        matches!(tokens.get(i + 1).map(|t| &t.kind), Some(TokenKind::LeftBracket));
                    if followed_by_bracket {
                        let info = self.functions.get(name).cloned().ok_or_else(|| {
                            ParseError::UnknownFunction {
                                name: name.clone(),
                                position: token.start,
                            }
                        })?;
                        let canonical = info.name().to_string();
                        operators.push(StackEntry::FunctionCall {
                            info,
                            name: canonical,
                            position: token.start,
                            base: operands.len(),
                            separators: 0,
                        });
                        i += 1; // consume the opening bracket with the call
                        prev = Prev::LeftBracket;
                    } else {
                        let canonical = canonical_name(name, self.case_sensitive);
                        if let Some(constant) = self.constants.get(&canonical) {
                            operands.push(Expr::FloatingPointConstant(constant.value));
                        } else {
                            operands.push(Expr::Variable(canonical));
                        }
                        prev = Prev::Operand;
                    }
                }
                TokenKind::LeftBracket => {
                    self.check_operand_position(token, prev)?;
                    operators.push(StackEntry::LeftBracket {
                        position: token.start,
                        base: operands.len(),
                    });
                    prev = Prev::LeftBracket;
                }
                TokenKind::RightBracket => {
                    self.close_bracket(token, prev, &mut operands, &mut operators)?;
                    prev = Prev::RightBracket;
                }
                TokenKind::ArgumentSeparator => {
                    self.close_argument(token, prev, &mut operands, &mut operators)?;
                    prev = Prev::Separator;
                }
                TokenKind::Operator(op) => {
                    self.push_operator(token, *op, prev, &mut operands, &mut operators)?;
                    prev = Prev::Operator;
                }
            }
            i += 1;
        }

        let end = tokens
            .last()
            .map(|t| t.start + t.len)
            .unwrap_or(0);
        while let Some(entry) = operators.pop() {
            match entry {
                StackEntry::LeftBracket { position, .. }
                | StackEntry::FunctionCall { position, .. } => {
                    return Err(ParseError::MismatchedBrackets { position });
                }
                other => apply(other, &mut operands)?,
            }
        }

        match operands.len() {
            1 => {
                let ast = operands.remove(0);
                debug!("parsed expression: {}", ast);
                Ok(ast)
            }
            _ => Err(ParseError::MissingOperand { position: end }),
        }
    }

    /// An operand (or an opening bracket) may not directly follow another
    /// operand or a closing bracket; implicit multiplication is not a thing.
    fn check_operand_position(&self, token: &Token, prev: Prev) -> Result<(), ParseError> {
        if prev == Prev::Operand || prev == Prev::RightBracket {
            return Err(ParseError::UnexpectedToken {
                token: token.kind.describe(),
                position: token.start,
            });
        }
        Ok(())
    }

    fn push_operator(
        &self,
        token: &Token,
        op: Operator,
        prev: Prev,
        operands: &mut Vec<Expr>,
        operators: &mut Vec<StackEntry>,
    ) -> Result<(), ParseError> {
        if op == Operator::Assign {
            return Err(ParseError::UnexpectedToken {
                token: token.kind.describe(),
                position: token.start,
            });
        }

        let prefix_position = matches!(
            prev,
            Prev::None | Prev::Operator | Prev::LeftBracket | Prev::Separator
        );
        if prefix_position {
            if op == Operator::Subtract {
                operators.push(StackEntry::UnaryMinus {
                    position: token.start,
                });
                return Ok(());
            }
            return Err(ParseError::MissingOperand {
                position: token.start,
            });
        }

        while let Some(top) = operators.last() {
            let pop = match top.precedence() {
                Some(top_precedence) => {
                    top_precedence > op.precedence()
                        || (top_precedence == op.precedence() && op.is_left_associative())
                }
                None => false,
            };
            if !pop {
                break;
            }
            let entry = operators.pop().ok_or(ParseError::MissingOperand {
                position: token.start,
            })?;
            apply(entry, operands)?;
        }
        operators.push(StackEntry::Binary {
            op,
            position: token.start,
        });
        Ok(())
    }

    /// Argument separator: reduce the current argument, then record the
    /// boundary on the enclosing function call.
    fn close_argument(
        &self,
        token: &Token,
        prev: Prev,
        operands: &mut Vec<Expr>,
        operators: &mut Vec<StackEntry>,
    ) -> Result<(), ParseError> {
        if prev != Prev::Operand && prev != Prev::RightBracket {
            return Err(ParseError::MissingOperand {
                position: token.start,
            });
        }
        while let Some(top) = operators.last() {
            if top.precedence().is_none() {
                break;
            }
            let entry = operators.pop().ok_or(ParseError::MissingOperand {
                position: token.start,
            })?;
            apply(entry, operands)?;
        }
        match operators.last_mut() {
            Some(StackEntry::FunctionCall {
                base, separators, ..
            }) => {
                *separators += 1;
                if operands.len() != *base + *separators {
                    return Err(ParseError::MissingOperand {
                        position: token.start,
                    });
                }
                Ok(())
            }
            _ => Err(ParseError::UnexpectedToken {
                token: token.kind.describe(),
                position: token.start,
            }),
        }
    }

    fn close_bracket(
        &self,
        token: &Token,
        prev: Prev,
        operands: &mut Vec<Expr>,
        operators: &mut Vec<StackEntry>,
    ) -> Result<(), ParseError> {
        if prev == Prev::Operator || prev == Prev::Separator {
            return Err(ParseError::MissingOperand {
                position: token.start,
            });
        }
        while let Some(top) = operators.last() {
            if top.precedence().is_none() {
                break;
            }
            let entry = operators.pop().ok_or(ParseError::MissingOperand {
                position: token.start,
            })?;
            apply(entry, operands)?;
        }
        match operators.pop() {
            Some(StackEntry::LeftBracket { base, .. }) => {
                if operands.len() == base {
                    return Err(ParseError::MissingOperand {
                        position: token.start,
                    });
                }
                Ok(())
            }
            Some(StackEntry::FunctionCall {
                info,
                name,
                position,
                base,
                separators,
            }) => {
                let count = operands.len() - base;
                if separators > 0 && count != separators + 1 {
                    return Err(ParseError::MissingOperand {
                        position: token.start,
                    });
                }
                match info.number_of_parameters() {
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
                let args = operands.split_off(base);
                operands.push(Expr::Function { name, args });
                Ok(())
            }
            None => Err(ParseError::MismatchedBrackets {
                position: token.start,
            }),
            Some(_) => Err(ParseError::MismatchedBrackets {
                position: token.start,
            }),
        }
    }
}

fn apply(entry: StackEntry, operands: &mut Vec<Expr>) -> Result<(), ParseError> {
    match entry {
        StackEntry::Binary { op, position } => {
            let right = operands
                .pop()
                .ok_or(ParseError::MissingOperand { position })?;
            let left = operands
                .pop()
                .ok_or(ParseError::MissingOperand { position })?;
            operands.push(make_binary(op, left, right, position)?);
        }
        StackEntry::UnaryMinus { position } => {
            let arg = operands
                .pop()
                .ok_or(ParseError::MissingOperand { position })?;
            operands.push(Expr::UnaryMinus(Box::new(arg)));
        }
        StackEntry::LeftBracket { position, .. } | StackEntry::FunctionCall { position, .. } => {
            return Err(ParseError::MismatchedBrackets { position });
        }
    }
    Ok(())
}

fn make_binary(op: Operator, left: Expr, right: Expr, position: usize) -> Result<Expr, ParseError> {
    let left = Box::new(left);
    let right = Box::new(right);
    Ok(match op {
        Operator::Add => Expr::Addition { left, right },
        Operator::Subtract => Expr::Subtraction { left, right },
        Operator::Multiply => Expr::Multiplication { left, right },
        Operator::Divide => Expr::Division {
            dividend: left,
            divisor: right,
        },
        Operator::Modulo => Expr::Modulo {
            dividend: left,
            divisor: right,
        },
        Operator::Power => Expr::Exponentiation {
            base: left,
            exponent: right,
        },
        Operator::And => Expr::And { left, right },
        Operator::Or => Expr::Or { left, right },
        Operator::LessThan => Expr::LessThan { left, right },
        Operator::LessOrEqual => Expr::LessOrEqualThan { left, right },
        Operator::GreaterThan => Expr::GreaterThan { left, right },
        Operator::GreaterOrEqual => Expr::GreaterOrEqualThan { left, right },
        Operator::Equal => Expr::Equal { left, right },
        Operator::NotEqual => Expr::NotEqual { left, right },
        Operator::Assign => {
            return Err(ParseError::UnexpectedToken {
                token: "=".to_string(),
                position,
            })
        }
    })
}
