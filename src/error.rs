use thiserror::Error;

/// Errors produced while turning source text into an executable formula.
///
/// Every variant that can be tied to a location carries the byte position of
/// the offending character or token in the original expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },

    #[error("malformed number '{literal}' at position {position}")]
    MalformedNumber { literal: String, position: usize },

    #[error("mismatched brackets at position {position}")]
    MismatchedBrackets { position: usize },

    #[error("missing operand at position {position}")]
    MissingOperand { position: usize },

    #[error("unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("unknown function '{name}' at position {position}")]
    UnknownFunction { name: String, position: usize },

    #[error("function '{name}' expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        name: String,
        expected: String,
        actual: usize,
        position: usize,
    },

    #[error("expression is empty")]
    EmptyExpression,
}

/// Errors produced while evaluating a built formula.
///
/// Formulas built through [`crate::Evaluator`] can only fail with
/// `VariableNotDefined`; the remaining variants guard the public executor
/// APIs against hand-built trees and programs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("variable '{0}' is not defined")]
    VariableNotDefined(String),

    #[error("function '{0}' is not defined")]
    FunctionNotDefined(String),

    #[error("formula program ended with an unbalanced stack")]
    StackUnderflow,
}

/// Errors produced while registering functions or constants, or when the
/// evaluator configuration itself is inconsistent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    #[error("name '{0}' is already registered")]
    DuplicateName(String),

    #[error("name '{name}' is already registered as a {existing}")]
    NameCollision { name: String, existing: &'static str },

    #[error("cannot change the arity of the registered function '{name}'")]
    ArityChange { name: String },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Umbrella error for the evaluator facade.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}
