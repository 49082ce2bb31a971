use std::fmt;

mod compiler;
mod evaluator;
mod optimizer;
mod parser;
mod tokenizer;
mod validator;

pub use compiler::{CompiledFormula, Compiler, Instruction};
pub use evaluator::Interpreter;
pub use optimizer::Optimizer;
pub use parser::AstBuilder;
pub use tokenizer::{Operator, Token, TokenKind, Tokenizer};
pub use validator::Validator;

/// A parsed expression tree.
///
/// Every node exclusively owns its children; the tree is acyclic. Comparison
/// and logical nodes evaluate to `1.0`/`0.0` with the convention that any
/// nonzero value is true.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntegerConstant(i64),
    FloatingPointConstant(f64),
    Variable(String),
    Addition {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Subtraction {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Multiplication {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Division {
        dividend: Box<Expr>,
        divisor: Box<Expr>,
    },
    Modulo {
        dividend: Box<Expr>,
        divisor: Box<Expr>,
    },
    Exponentiation {
        base: Box<Expr>,
        exponent: Box<Expr>,
    },
    UnaryMinus(Box<Expr>),
    And {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Or {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    LessThan {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    LessOrEqualThan {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    GreaterThan {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    GreaterOrEqualThan {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Equal {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    NotEqual {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// If this node is a numeric constant, return its value as a double.
    pub fn constant_value(&self) -> Option<f64> {
        match *self {
            Expr::IntegerConstant(value) => Some(value as f64),
            Expr::FloatingPointConstant(value) => Some(value),
            _ => None,
        }
    }

    /// The distinct variable names referenced by this tree, sorted.
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names.sort_unstable();
        names.dedup();
        names
    }

    fn collect_variables(&self, names: &mut Vec<String>) {
        match self {
            Expr::IntegerConstant(_) | Expr::FloatingPointConstant(_) => {}
            Expr::Variable(name) => names.push(name.clone()),
            Expr::UnaryMinus(arg) => arg.collect_variables(names),
            Expr::Addition { left, right }
            | Expr::Subtraction { left, right }
            | Expr::Multiplication { left, right }
            | Expr::And { left, right }
            | Expr::Or { left, right }
            | Expr::LessThan { left, right }
            | Expr::LessOrEqualThan { left, right }
            | Expr::GreaterThan { left, right }
            | Expr::GreaterOrEqualThan { left, right }
            | Expr::Equal { left, right }
            | Expr::NotEqual { left, right } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expr::Division { dividend, divisor } | Expr::Modulo { dividend, divisor } => {
                dividend.collect_variables(names);
                divisor.collect_variables(names);
            }
            Expr::Exponentiation { base, exponent } => {
                base.collect_variables(names);
                exponent.collect_variables(names);
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
        }
    }
}

/// Renders the tree as a fully parenthesised expression that parses back to
/// a structurally equal tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::IntegerConstant(value) => write!(f, "{}", value),
            Expr::FloatingPointConstant(value) => write!(f, "{:?}", value),
            Expr::Variable(name) => write!(f, "{}", name),
            Expr::Addition { left, right } => write!(f, "({} + {})", left, right),
            Expr::Subtraction { left, right } => write!(f, "({} - {})", left, right),
            Expr::Multiplication { left, right } => write!(f, "({} * {})", left, right),
            Expr::Division { dividend, divisor } => write!(f, "({} / {})", dividend, divisor),
            Expr::Modulo { dividend, divisor } => write!(f, "({} % {})", dividend, divisor),
            Expr::Exponentiation { base, exponent } => write!(f, "({} ^ {})", base, exponent),
            Expr::UnaryMinus(arg) => write!(f, "(-{})", arg),
            Expr::And { left, right } => write!(f, "({} && {})", left, right),
            Expr::Or { left, right } => write!(f, "({} || {})", left, right),
            Expr::LessThan { left, right } => write!(f, "({} < {})", left, right),
            Expr::LessOrEqualThan { left, right } => write!(f, "({} <= {})", left, right),
            Expr::GreaterThan { left, right } => write!(f, "({} > {})", left, right),
            Expr::GreaterOrEqualThan { left, right } => write!(f, "({} >= {})", left, right),
            Expr::Equal { left, right } => write!(f, "({} == {})", left, right),
            Expr::NotEqual { left, right } => write!(f, "({} != {})", left, right),
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
