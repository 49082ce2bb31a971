use crate::ast::{Expr, Interpreter};
use crate::constants::ConstantRegistry;
use crate::context::FormulaContext;
use crate::error::EvalError;
use crate::functions::FunctionRegistry;
use log::debug;
use std::collections::HashMap;

/// Bottom-up rewriting of an expression tree: constant folding plus a small
/// set of algebraic identities. The rewrite is pure — it consumes the input
/// tree and returns a new one — and a single pass reaches a fixpoint, so
/// optimizing twice changes nothing.
///
/// Folding only happens for built-in operators and for functions flagged
/// idempotent; `random()` and friends always survive. The `0 / x → 0`
/// identity is applied even though IEEE would give `NaN` for `x = 0`; that
/// deviation is part of the engine's contract.
pub struct Optimizer<'a> {
    functions: &'a FunctionRegistry,
    constants: &'a ConstantRegistry,
}

impl<'a> Optimizer<'a> {
    pub fn new(functions: &'a FunctionRegistry, constants: &'a ConstantRegistry) -> Self {
        Optimizer {
            functions,
            constants,
        }
    }

    pub fn optimize(&self, expr: Expr) -> Expr {
        match expr {
            Expr::IntegerConstant(_) | Expr::FloatingPointConstant(_) | Expr::Variable(_) => expr,
            Expr::UnaryMinus(arg) => {
                let arg = self.optimize(*arg);
                self.fold(Expr::UnaryMinus(Box::new(arg)))
            }
            Expr::Addition { left, right } => {
                let left = self.optimize(*left);
                let right = self.optimize(*right);
                self.fold(Expr::Addition {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::Subtraction { left, right } => {
                let left = self.optimize(*left);
                let right = self.optimize(*right);
                self.fold(Expr::Subtraction {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::Multiplication { left, right } => {
                let left = self.optimize(*left);
                let right = self.optimize(*right);
                if is_zero(&left) || is_zero(&right) {
                    debug!("rewrote multiplication by zero to 0.0");
                    return Expr::FloatingPointConstant(0.0);
                }
                self.fold(Expr::Multiplication {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::Division { dividend, divisor } => {
                let dividend = self.optimize(*dividend);
                let divisor = self.optimize(*divisor);
                if is_zero(&dividend) {
                    debug!("rewrote zero dividend to 0.0");
                    return Expr::FloatingPointConstant(0.0);
                }
                self.fold(Expr::Division {
                    dividend: Box::new(dividend),
                    divisor: Box::new(divisor),
                })
            }
            Expr::Modulo { dividend, divisor } => {
                let dividend = self.optimize(*dividend);
                let divisor = self.optimize(*divisor);
                self.fold(Expr::Modulo {
                    dividend: Box::new(dividend),
                    divisor: Box::new(divisor),
                })
            }
            Expr::Exponentiation { base, exponent } => {
                let base = self.optimize(*base);
                let exponent = self.optimize(*exponent);
                if is_zero(&exponent) {
                    debug!("rewrote zero exponent to 1.0");
                    return Expr::FloatingPointConstant(1.0);
                }
                self.fold(Expr::Exponentiation {
                    base: Box::new(base),
                    exponent: Box::new(exponent),
                })
            }
            Expr::And { left, right } => {
                let left = self.optimize(*left);
                let right = self.optimize(*right);
                self.fold(Expr::And {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::Or { left, right } => {
                let left = self.optimize(*left);
                let right = self.optimize(*right);
                self.fold(Expr::Or {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::LessThan { left, right } => {
                let left = self.optimize(*left);
                let right = self.optimize(*right);
                self.fold(Expr::LessThan {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::LessOrEqualThan { left, right } => {
                let left = self.optimize(*left);
                let right = self.optimize(*right);
                self.fold(Expr::LessOrEqualThan {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::GreaterThan { left, right } => {
                let left = self.optimize(*left);
                let right = self.optimize(*right);
                self.fold(Expr::GreaterThan {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::GreaterOrEqualThan { left, right } => {
                let left = self.optimize(*left);
                let right = self.optimize(*right);
                self.fold(Expr::GreaterOrEqualThan {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::Equal { left, right } => {
                let left = self.optimize(*left);
                let right = self.optimize(*right);
                self.fold(Expr::Equal {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::NotEqual { left, right } => {
                let left = self.optimize(*left);
                let right = self.optimize(*right);
                self.fold(Expr::NotEqual {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::Function { name, args } => {
                let args: Vec<Expr> = args.into_iter().map(|arg| self.optimize(arg)).collect();
                self.fold(Expr::Function { name, args })
            }
        }
    }

    /// Replaces a node whose children are all numeric constants with the
    /// constant it evaluates to — but only when re-evaluating it later could
    /// never give a different answer.
    fn fold(&self, expr: Expr) -> Expr {
        if !self.is_foldable(&expr) {
            return expr;
        }
        match self.evaluate_constant(&expr) {
            Ok(value) => {
                debug!("folded {} to {:?}", expr, value);
                Expr::FloatingPointConstant(value)
            }
            Err(_) => expr,
        }
    }

    fn is_foldable(&self, expr: &Expr) -> bool {
        match expr {
            Expr::UnaryMinus(arg) => is_constant(arg),
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
            | Expr::NotEqual { left, right } => is_constant(left) && is_constant(right),
            Expr::Division { dividend, divisor } | Expr::Modulo { dividend, divisor } => {
                is_constant(dividend) && is_constant(divisor)
            }
            Expr::Exponentiation { base, exponent } => is_constant(base) && is_constant(exponent),
            Expr::Function { name, args } => {
                args.iter().all(is_constant)
                    && self
                        .functions
                        .get(name)
                        .map(|info| info.is_idempotent())
                        .unwrap_or(false)
            }
            _ => false,
        }
    }

    fn evaluate_constant(&self, expr: &Expr) -> Result<f64, EvalError> {
        let no_variables = HashMap::new();
        let ctx = FormulaContext::new(&no_variables, self.functions, self.constants, true);
        Interpreter::evaluate(expr, &ctx)
    }
}

fn is_constant(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::IntegerConstant(_) | Expr::FloatingPointConstant(_)
    )
}

fn is_zero(expr: &Expr) -> bool {
    expr.constant_value() == Some(0.0)
}
