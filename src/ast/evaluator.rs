use crate::ast::Expr;
use crate::context::FormulaContext;
use crate::error::EvalError;

/// Tree-walking executor: evaluates an [`Expr`] directly against a
/// [`FormulaContext`].
///
/// Logical and comparison operators evaluate both sides — there is no
/// short-circuiting — and yield `1.0`/`0.0`. IEEE exceptional values
/// (`NaN`, `±∞`) propagate as ordinary results; the only failure is a
/// reference to a name that neither the variable map nor the constant
/// registry can resolve.
pub struct Interpreter;

impl Interpreter {
    pub fn evaluate(expr: &Expr, ctx: &FormulaContext) -> Result<f64, EvalError> {
        match expr {
            Expr::IntegerConstant(value) => Ok(*value as f64),
            Expr::FloatingPointConstant(value) => Ok(*value),
            Expr::Variable(name) => ctx
                .variable(name)
                .ok_or_else(|| EvalError::VariableNotDefined(name.clone())),
            Expr::Addition { left, right } => {
                Ok(Self::evaluate(left, ctx)? + Self::evaluate(right, ctx)?)
            }
            Expr::Subtraction { left, right } => {
                Ok(Self::evaluate(left, ctx)? - Self::evaluate(right, ctx)?)
            }
            Expr::Multiplication { left, right } => {
                Ok(Self::evaluate(left, ctx)? * Self::evaluate(right, ctx)?)
            }
            Expr::Division { dividend, divisor } => {
                Ok(Self::evaluate(dividend, ctx)? / Self::evaluate(divisor, ctx)?)
            }
            Expr::Modulo { dividend, divisor } => {
                Ok(Self::evaluate(dividend, ctx)? % Self::evaluate(divisor, ctx)?)
            }
            Expr::Exponentiation { base, exponent } => {
                Ok(Self::evaluate(base, ctx)?.powf(Self::evaluate(exponent, ctx)?))
            }
            Expr::UnaryMinus(arg) => Ok(-Self::evaluate(arg, ctx)?),
            Expr::And { left, right } => {
                let left = Self::evaluate(left, ctx)?;
                let right = Self::evaluate(right, ctx)?;
                Ok(bool_value(left != 0.0 && right != 0.0))
            }
            Expr::Or { left, right } => {
                let left = Self::evaluate(left, ctx)?;
                let right = Self::evaluate(right, ctx)?;
                Ok(bool_value(left != 0.0 || right != 0.0))
            }
            Expr::LessThan { left, right } => {
                Ok(bool_value(Self::evaluate(left, ctx)? < Self::evaluate(right, ctx)?))
            }
            Expr::LessOrEqualThan { left, right } => {
                Ok(bool_value(Self::evaluate(left, ctx)? <= Self::evaluate(right, ctx)?))
            }
            Expr::GreaterThan { left, right } => {
                Ok(bool_value(Self::evaluate(left, ctx)? > Self::evaluate(right, ctx)?))
            }
            Expr::GreaterOrEqualThan { left, right } => {
                Ok(bool_value(Self::evaluate(left, ctx)? >= Self::evaluate(right, ctx)?))
            }
            Expr::Equal { left, right } => {
                Ok(bool_value(Self::evaluate(left, ctx)? == Self::evaluate(right, ctx)?))
            }
            Expr::NotEqual { left, right } => {
                Ok(bool_value(Self::evaluate(left, ctx)? != Self::evaluate(right, ctx)?))
            }
            Expr::Function { name, args } => {
                let info = ctx
                    .function(name)
                    .cloned()
                    .ok_or_else(|| EvalError::FunctionNotDefined(name.clone()))?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(Self::evaluate(arg, ctx)?);
                }
                Ok(info.call(&values))
            }
        }
    }
}

fn bool_value(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, Tokenizer};
    use crate::constants::{ConstantInfo, ConstantRegistry};
    use crate::functions::{FunctionInfo, FunctionRegistry};
    use std::collections::HashMap;

    fn registries() -> (FunctionRegistry, ConstantRegistry) {
        let mut functions = FunctionRegistry::new(false, false);
        functions
            .register(FunctionInfo::fixed("sqrt", 1, true, |args| args[0].sqrt()))
            .unwrap();
        functions
            .register(FunctionInfo::dynamic("sum", true, |args| args.iter().sum()))
            .unwrap();

        let mut constants = ConstantRegistry::new(false, false);
        constants.register(ConstantInfo::new("two", 2.0)).unwrap();
        (functions, constants)
    }

    fn eval_with(source: &str, variables: &HashMap<String, f64>) -> Result<f64, EvalError> {
        let (functions, constants) = registries();
        let tokens = Tokenizer::new(source, '.', ',')
            .tokenize()
            .expect("tokenize");
        let ast = AstBuilder::new(&functions, &constants, false)
            .build(&tokens)
            .expect("parse");
        let ctx = FormulaContext::new(variables, &functions, &constants, false);
        Interpreter::evaluate(&ast, &ctx)
    }

    fn eval(source: &str) -> Result<f64, EvalError> {
        eval_with(source, &HashMap::new())
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("3 + 5 * 2"), Ok(13.0));
        assert_eq!(eval("10 / 4"), Ok(2.5));
        assert_eq!(eval("10 % 3"), Ok(1.0));
        assert_eq!(eval("2 ^ 10"), Ok(1024.0));
        assert_eq!(eval("-3 + 5"), Ok(2.0));
        assert_eq!(eval("(2+3)*500"), Ok(2500.0));
    }

    #[test]
    fn test_comparisons_yield_zero_or_one() {
        assert_eq!(eval("2 < 3"), Ok(1.0));
        assert_eq!(eval("2 > 3"), Ok(0.0));
        assert_eq!(eval("2 <= 2"), Ok(1.0));
        assert_eq!(eval("2 >= 3"), Ok(0.0));
        assert_eq!(eval("2 == 2"), Ok(1.0));
        assert_eq!(eval("2 != 2"), Ok(0.0));
        assert_eq!(eval("2 <> 3"), Ok(1.0));
    }

    #[test]
    fn test_logical_operators_treat_nonzero_as_true() {
        assert_eq!(eval("1 && 2"), Ok(1.0));
        assert_eq!(eval("1 && 0"), Ok(0.0));
        assert_eq!(eval("0 || 0"), Ok(0.0));
        assert_eq!(eval("0 || 0.5"), Ok(1.0));
    }

    #[test]
    fn test_variables_and_constants() {
        let mut variables = HashMap::new();
        variables.insert("a".to_string(), 7.0);
        assert_eq!(eval_with("a * two", &variables), Ok(14.0));
    }

    #[test]
    fn test_variable_shadows_constant() {
        let mut variables = HashMap::new();
        variables.insert("two".to_string(), 5.0);
        // The parser inlines registered constants, so `two` in the source is
        // already 2.0; only a raw Variable node consults the map first.
        let ctx_expr = Expr::Variable("two".to_string());
        let (functions, constants) = registries();
        let ctx = FormulaContext::new(&variables, &functions, &constants, false);
        assert_eq!(Interpreter::evaluate(&ctx_expr, &ctx), Ok(5.0));
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("sqrt(16)"), Ok(4.0));
        assert_eq!(eval("sum(1, 2, 3, 4)"), Ok(10.0));
        assert_eq!(eval("sqrt(sum(9, 16))"), Ok(5.0));
    }

    #[test]
    fn test_ieee_values_propagate() {
        assert_eq!(eval("1 / 0"), Ok(f64::INFINITY));
        assert_eq!(eval("-1 / 0"), Ok(f64::NEG_INFINITY));
        assert!(eval("0 / 0").unwrap().is_nan());
        assert!(eval("sqrt(-1)").unwrap().is_nan());
    }

    #[test]
    fn test_undefined_variable() {
        assert_eq!(
            eval("unknownVar + 1"),
            Err(EvalError::VariableNotDefined("unknownvar".to_string()))
        );
    }

    #[test]
    fn test_unary_minus_of_expression() {
        let mut variables = HashMap::new();
        variables.insert("x".to_string(), 3.0);
        assert_eq!(eval_with("-(x * 2)", &variables), Ok(-6.0));
    }
}
