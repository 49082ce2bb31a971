//! formulix — runtime evaluation of mathematical and logical expressions.
//!
//! Expressions such as `sin(x * 2) + if(a > b, c, d)` are parsed once into a
//! reusable formula and evaluated against any binding of variable names to
//! `f64` values. The engine supports user-defined constants and functions
//! (fixed- and variable-arity), algebraic simplification, an interpreted and
//! a compiled execution backend sharing one syntax tree, and a bounded
//! formula cache.
//!
//! ```
//! use formulix::Evaluator;
//! use std::collections::HashMap;
//!
//! let evaluator = Evaluator::new();
//! let mut vars = HashMap::new();
//! vars.insert("x".to_string(), 3.0);
//! assert_eq!(evaluator.evaluate("x * 2 + 1", &vars), Ok(7.0));
//! ```
//!
//! Constants and functions are registered up front through the builder; the
//! resulting evaluator is immutable and safe to share between threads.
//!
//! ```
//! use formulix::Evaluator;
//! use std::collections::HashMap;
//!
//! let evaluator = Evaluator::builder()
//!     .constant("answer", 42.0)
//!     .function("double", 1, true, |args| args[0] * 2.0)
//!     .build()
//!     .unwrap();
//! assert_eq!(
//!     evaluator.evaluate("double(answer)", &HashMap::new()),
//!     Ok(84.0)
//! );
//! ```
//!
//! Parsing is the expensive step; [`Evaluator::create_delegate`] returns the
//! built [`Formula`] so it can be evaluated many times with different
//! variables.

pub mod ast;
pub mod cache;
pub mod constants;
pub mod context;
pub mod error;
pub mod functions;

use ast::{AstBuilder, CompiledFormula, Compiler, Expr, Interpreter, Optimizer, Tokenizer, Validator};
use cache::FormulaCache;
use constants::{register_default_constants, ConstantRegistry};
use context::FormulaContext;
use functions::{register_default_functions, FunctionRegistry};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

pub use constants::ConstantInfo;
pub use error::{Error, EvalError, ParseError, RegistrationError};
pub use functions::FunctionInfo;

/// How built formulas execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Walk the syntax tree on every evaluation.
    Interpreted,
    /// Lower the tree once into a stack-machine program.
    Compiled,
}

#[derive(Debug, Clone, Copy)]
struct EngineOptions {
    case_sensitive: bool,
    decimal_separator: char,
    argument_separator: char,
    execution_mode: ExecutionMode,
    optimizer_enabled: bool,
    validation_enabled: bool,
    guarded_mode_enabled: bool,
}

/// The expression engine facade: holds the registries, the configuration and
/// the formula cache, and builds executable formulas from source text.
pub struct Evaluator {
    options: EngineOptions,
    functions: Arc<FunctionRegistry>,
    constants: Arc<ConstantRegistry>,
    cache: Option<FormulaCache>,
}

impl Evaluator {
    /// An evaluator with the default configuration: case-insensitive, `.`
    /// and `,` separators, compiled execution, optimizer, validation and
    /// cache enabled, and the default constant and function tables
    /// registered.
    pub fn new() -> Self {
        EvaluatorBuilder::new()
            .build()
            .expect("default evaluator configuration is valid")
    }

    pub fn builder() -> EvaluatorBuilder {
        EvaluatorBuilder::new()
    }

    /// Parses (or fetches from the cache) and evaluates `expression` against
    /// `variables`.
    pub fn evaluate(
        &self,
        expression: &str,
        variables: &HashMap<String, f64>,
    ) -> Result<f64, Error> {
        let formula = self.formula_for(expression)?;
        formula.evaluate(variables).map_err(Error::from)
    }

    /// Builds a reusable formula for `expression`. The formula can be
    /// evaluated any number of times, concurrently, with different variable
    /// maps.
    pub fn create_delegate(&self, expression: &str) -> Result<Formula, Error> {
        self.formula_for(expression)
    }

    /// Checks `expression` for syntax errors without building an executor.
    pub fn validate(&self, expression: &str) -> Result<(), ParseError> {
        let tokens = Tokenizer::new(
            expression,
            self.options.decimal_separator,
            self.options.argument_separator,
        )
        .tokenize()?;
        Validator::new(&self.functions).validate(&tokens)?;
        AstBuilder::new(&self.functions, &self.constants, self.options.case_sensitive)
            .build(&tokens)
            .map(|_| ())
    }

    /// The registered functions, in no particular order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionInfo> {
        self.functions.iter()
    }

    /// The registered constants, in no particular order.
    pub fn constants(&self) -> impl Iterator<Item = &ConstantInfo> {
        self.constants.iter()
    }

    fn formula_for(&self, expression: &str) -> Result<Formula, Error> {
        match &self.cache {
            Some(cache) => cache.get_or_build(expression, || self.build_formula(expression)),
            None => self.build_formula(expression),
        }
    }

    fn build_formula(&self, expression: &str) -> Result<Formula, Error> {
        debug!("building formula for: {}", expression);
        let tokens = Tokenizer::new(
            expression,
            self.options.decimal_separator,
            self.options.argument_separator,
        )
        .tokenize()?;
        if self.options.validation_enabled {
            Validator::new(&self.functions).validate(&tokens)?;
        }
        let ast = AstBuilder::new(&self.functions, &self.constants, self.options.case_sensitive)
            .build(&tokens)?;
        let ast = if self.options.optimizer_enabled {
            Optimizer::new(&self.functions, &self.constants).optimize(ast)
        } else {
            ast
        };
        let variable_names = Arc::new(ast.variables());
        let executor = match self.options.execution_mode {
            ExecutionMode::Interpreted => FormulaExecutor::Interpreted(Arc::new(ast)),
            ExecutionMode::Compiled => {
                let compiled = Compiler::compile(&ast, &self.functions)?;
                FormulaExecutor::Compiled(Arc::new(compiled))
            }
        };
        Ok(Formula {
            executor,
            variable_names,
            functions: Arc::clone(&self.functions),
            constants: Arc::clone(&self.constants),
            case_sensitive: self.options.case_sensitive,
            guarded: self.options.guarded_mode_enabled,
        })
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new()
    }
}

#[derive(Clone)]
enum FormulaExecutor {
    Interpreted(Arc<Expr>),
    Compiled(Arc<CompiledFormula>),
}

/// A built, reusable formula bound to its registries.
///
/// Cloning is cheap — the executor and registries are shared — and a formula
/// may be evaluated from multiple threads at once; each evaluation works on
/// its own context.
#[derive(Clone)]
pub struct Formula {
    executor: FormulaExecutor,
    variable_names: Arc<Vec<String>>,
    functions: Arc<FunctionRegistry>,
    constants: Arc<ConstantRegistry>,
    case_sensitive: bool,
    guarded: bool,
}

impl Formula {
    pub fn evaluate(&self, variables: &HashMap<String, f64>) -> Result<f64, EvalError> {
        let ctx = FormulaContext::new(
            variables,
            &self.functions,
            &self.constants,
            self.case_sensitive,
        );
        if self.guarded {
            for name in self.variable_names.iter() {
                if ctx.variable(name).is_none() {
                    return Err(EvalError::VariableNotDefined(name.clone()));
                }
            }
        }
        match &self.executor {
            FormulaExecutor::Interpreted(ast) => Interpreter::evaluate(ast, &ctx),
            FormulaExecutor::Compiled(compiled) => compiled.evaluate(&ctx),
        }
    }

    /// The distinct variable names this formula references, sorted.
    pub fn variable_names(&self) -> &[String] {
        self.variable_names.as_slice()
    }
}

/// Configuration record consumed at evaluator construction.
pub struct EvaluatorBuilder {
    case_sensitive: bool,
    decimal_separator: char,
    argument_separator: char,
    execution_mode: ExecutionMode,
    optimizer_enabled: bool,
    validation_enabled: bool,
    guarded_mode_enabled: bool,
    cache_enabled: bool,
    cache_maximum_size: usize,
    cache_reduction_size: usize,
    default_constants: bool,
    default_functions: bool,
    constants: Vec<ConstantInfo>,
    functions: Vec<FunctionInfo>,
}

impl EvaluatorBuilder {
    pub fn new() -> Self {
        EvaluatorBuilder {
            case_sensitive: false,
            decimal_separator: '.',
            argument_separator: ',',
            execution_mode: ExecutionMode::Compiled,
            optimizer_enabled: true,
            validation_enabled: true,
            guarded_mode_enabled: false,
            cache_enabled: true,
            cache_maximum_size: 500,
            cache_reduction_size: 50,
            default_constants: true,
            default_functions: true,
            constants: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Whether identifier lookup distinguishes case. Off by default.
    pub fn case_sensitive(mut self, enabled: bool) -> Self {
        self.case_sensitive = enabled;
        self
    }

    /// The character accepted inside numeric literals, `.` or `,`.
    pub fn decimal_separator(mut self, separator: char) -> Self {
        self.decimal_separator = separator;
        self
    }

    /// The character separating function arguments; must differ from the
    /// decimal separator.
    pub fn argument_separator(mut self, separator: char) -> Self {
        self.argument_separator = separator;
        self
    }

    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn optimizer_enabled(mut self, enabled: bool) -> Self {
        self.optimizer_enabled = enabled;
        self
    }

    pub fn validation_enabled(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    /// Guarded mode forbids redefinitions and constant/function name
    /// collisions, and verifies the variable map covers every referenced
    /// variable before each evaluation.
    pub fn guarded_mode_enabled(mut self, enabled: bool) -> Self {
        self.guarded_mode_enabled = enabled;
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn cache_maximum_size(mut self, size: usize) -> Self {
        self.cache_maximum_size = size;
        self
    }

    pub fn cache_reduction_size(mut self, size: usize) -> Self {
        self.cache_reduction_size = size;
        self
    }

    /// Whether `e` and `pi` are pre-registered. On by default.
    pub fn default_constants(mut self, enabled: bool) -> Self {
        self.default_constants = enabled;
        self
    }

    /// Whether the default function table is pre-registered. On by default.
    pub fn default_functions(mut self, enabled: bool) -> Self {
        self.default_functions = enabled;
        self
    }

    pub fn constant(mut self, name: &str, value: f64) -> Self {
        self.constants.push(ConstantInfo::new(name, value));
        self
    }

    /// Registers a fixed-arity function of `arity` doubles.
    pub fn function<F>(mut self, name: &str, arity: usize, is_idempotent: bool, func: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        self.functions
            .push(FunctionInfo::fixed(name, arity, is_idempotent, func));
        self
    }

    /// Registers a variable-arity function; it receives all arguments as one
    /// slice and requires at least one.
    pub fn dynamic_function<F>(mut self, name: &str, is_idempotent: bool, func: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        self.functions
            .push(FunctionInfo::dynamic(name, is_idempotent, func));
        self
    }

    pub fn build(self) -> Result<Evaluator, Error> {
        if self.decimal_separator != '.' && self.decimal_separator != ',' {
            return Err(RegistrationError::InvalidConfiguration(format!(
                "decimal separator must be '.' or ',', got '{}'",
                self.decimal_separator
            ))
            .into());
        }
        if self.argument_separator == self.decimal_separator {
            return Err(RegistrationError::InvalidConfiguration(
                "argument separator must differ from the decimal separator".to_string(),
            )
            .into());
        }
        const RESERVED: &str = "+-*/%^<>=!&|()_";
        if self.argument_separator.is_alphanumeric()
            || self.argument_separator.is_whitespace()
            || RESERVED.contains(self.argument_separator)
        {
            return Err(RegistrationError::InvalidConfiguration(format!(
                "'{}' cannot be used as the argument separator",
                self.argument_separator
            ))
            .into());
        }
        if self.cache_maximum_size == 0 || self.cache_reduction_size == 0 {
            return Err(RegistrationError::InvalidConfiguration(
                "cache sizes must be positive".to_string(),
            )
            .into());
        }
        if self.cache_reduction_size > self.cache_maximum_size {
            return Err(RegistrationError::InvalidConfiguration(
                "cache reduction size cannot exceed the maximum size".to_string(),
            )
            .into());
        }

        let mut functions =
            FunctionRegistry::new(self.case_sensitive, self.guarded_mode_enabled);
        let mut constants =
            ConstantRegistry::new(self.case_sensitive, self.guarded_mode_enabled);

        if self.default_constants {
            register_default_constants(&mut constants)?;
        }
        if self.default_functions {
            register_default_functions(&mut functions)?;
        }
        for info in self.constants {
            if self.guarded_mode_enabled && functions.contains(&info.name) {
                return Err(RegistrationError::NameCollision {
                    name: info.name,
                    existing: "function",
                }
                .into());
            }
            constants.register(info)?;
        }
        for info in self.functions {
            if self.guarded_mode_enabled && constants.contains(info.name()) {
                return Err(RegistrationError::NameCollision {
                    name: info.name().to_string(),
                    existing: "constant",
                }
                .into());
            }
            functions.register(info)?;
        }

        let cache = if self.cache_enabled {
            Some(FormulaCache::new(
                self.cache_maximum_size,
                self.cache_reduction_size,
            ))
        } else {
            None
        };

        Ok(Evaluator {
            options: EngineOptions {
                case_sensitive: self.case_sensitive,
                decimal_separator: self.decimal_separator,
                argument_separator: self.argument_separator,
                execution_mode: self.execution_mode,
                optimizer_enabled: self.optimizer_enabled,
                validation_enabled: self.validation_enabled,
                guarded_mode_enabled: self.guarded_mode_enabled,
            },
            functions: Arc::new(functions),
            constants: Arc::new(constants),
            cache,
        })
    }
}

impl Default for EvaluatorBuilder {
    fn default() -> Self {
        EvaluatorBuilder::new()
    }
}
