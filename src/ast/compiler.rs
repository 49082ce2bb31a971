use crate::ast::Expr;
use crate::context::FormulaContext;
use crate::error::EvalError;
use crate::functions::{FunctionInfo, FunctionRegistry};
use log::debug;
use std::sync::Arc;

/// One step of a compiled formula program. Arithmetic and comparison
/// instructions pop their operands and push the result; `Call` pops
/// `arg_count` values as one contiguous argument slice.
#[derive(Clone)]
pub enum Instruction {
    PushConstant(f64),
    LoadVariable(String),
    Negate,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    And,
    Or,
    LessThan,
    LessOrEqualThan,
    GreaterThan,
    GreaterOrEqualThan,
    Equal,
    NotEqual,
    Call {
        function: Arc<FunctionInfo>,
        arg_count: usize,
    },
}

/// Lowers an expression tree into a flat instruction program.
///
/// The tree is walked exactly once, here; function callables are resolved
/// against the registry at compile time and embedded into the program, so
/// executing it involves no tree traversal and no registry lookups.
pub struct Compiler;

impl Compiler {
    pub fn compile(
        expr: &Expr,
        functions: &FunctionRegistry,
    ) -> Result<CompiledFormula, EvalError> {
        let mut instructions = Vec::new();
        Self::compile_node(expr, functions, &mut instructions)?;
        debug!("compiled formula program with {} instructions", instructions.len());
        Ok(CompiledFormula { instructions })
    }

    fn compile_node(
        expr: &Expr,
        functions: &FunctionRegistry,
        instructions: &mut Vec<Instruction>,
    ) -> Result<(), EvalError> {
        match expr {
            Expr::IntegerConstant(value) => {
                instructions.push(Instruction::PushConstant(*value as f64));
            }
            Expr::FloatingPointConstant(value) => {
                instructions.push(Instruction::PushConstant(*value));
            }
            Expr::Variable(name) => {
                instructions.push(Instruction::LoadVariable(name.clone()));
            }
            Expr::UnaryMinus(arg) => {
                Self::compile_node(arg, functions, instructions)?;
                instructions.push(Instruction::Negate);
            }
            Expr::Addition { left, right } => {
                Self::compile_binary(left, right, functions, instructions, Instruction::Add)?;
            }
            Expr::Subtraction { left, right } => {
                Self::compile_binary(left, right, functions, instructions, Instruction::Subtract)?;
            }
            Expr::Multiplication { left, right } => {
                Self::compile_binary(left, right, functions, instructions, Instruction::Multiply)?;
            }
            Expr::Division { dividend, divisor } => {
                Self::compile_binary(dividend, divisor, functions, instructions, Instruction::Divide)?;
            }
            Expr::Modulo { dividend, divisor } => {
                Self::compile_binary(dividend, divisor, functions, instructions, Instruction::Modulo)?;
            }
            Expr::Exponentiation { base, exponent } => {
                Self::compile_binary(base, exponent, functions, instructions, Instruction::Power)?;
            }
            Expr::And { left, right } => {
                Self::compile_binary(left, right, functions, instructions, Instruction::And)?;
            }
            Expr::Or { left, right } => {
                Self::compile_binary(left, right, functions, instructions, Instruction::Or)?;
            }
            Expr::LessThan { left, right } => {
                Self::compile_binary(left, right, functions, instructions, Instruction::LessThan)?;
            }
            Expr::LessOrEqualThan { left, right } => {
                Self::compile_binary(
                    left,
                    right,
                    functions,
                    instructions,
                    Instruction::LessOrEqualThan,
                )?;
            }
            Expr::GreaterThan { left, right } => {
                Self::compile_binary(left, right, functions, instructions, Instruction::GreaterThan)?;
            }
            Expr::GreaterOrEqualThan { left, right } => {
                Self::compile_binary(
                    left,
                    right,
                    functions,
                    instructions,
                    Instruction::GreaterOrEqualThan,
                )?;
            }
            Expr::Equal { left, right } => {
                Self::compile_binary(left, right, functions, instructions, Instruction::Equal)?;
            }
            Expr::NotEqual { left, right } => {
                Self::compile_binary(left, right, functions, instructions, Instruction::NotEqual)?;
            }
            Expr::Function { name, args } => {
                for arg in args {
                    Self::compile_node(arg, functions, instructions)?;
                }
                let function = functions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvalError::FunctionNotDefined(name.clone()))?;
                instructions.push(Instruction::Call {
                    function,
                    arg_count: args.len(),
                });
            }
        }
        Ok(())
    }

    fn compile_binary(
        left: &Expr,
        right: &Expr,
        functions: &FunctionRegistry,
        instructions: &mut Vec<Instruction>,
        op: Instruction,
    ) -> Result<(), EvalError> {
        Self::compile_node(left, functions, instructions)?;
        Self::compile_node(right, functions, instructions)?;
        instructions.push(op);
        Ok(())
    }
}

/// A formula lowered to a stack-machine program, reusable across
/// evaluations and safe to share between threads.
pub struct CompiledFormula {
    instructions: Vec<Instruction>,
}

impl CompiledFormula {
    pub fn evaluate(&self, ctx: &FormulaContext) -> Result<f64, EvalError> {
        let mut stack: Vec<f64> = Vec::with_capacity(16);
        for instruction in &self.instructions {
            match instruction {
                Instruction::PushConstant(value) => stack.push(*value),
                Instruction::LoadVariable(name) => {
                    let value = ctx
                        .variable(name)
                        .ok_or_else(|| EvalError::VariableNotDefined(name.clone()))?;
                    stack.push(value);
                }
                Instruction::Negate => {
                    let value = pop(&mut stack)?;
                    stack.push(-value);
                }
                Instruction::Add => binary_op(&mut stack, |a, b| a + b)?,
                Instruction::Subtract => binary_op(&mut stack, |a, b| a - b)?,
                Instruction::Multiply => binary_op(&mut stack, |a, b| a * b)?,
                Instruction::Divide => binary_op(&mut stack, |a, b| a / b)?,
                Instruction::Modulo => binary_op(&mut stack, |a, b| a % b)?,
                Instruction::Power => binary_op(&mut stack, f64::powf)?,
                Instruction::And => {
                    binary_op(&mut stack, |a, b| bool_value(a != 0.0 && b != 0.0))?
                }
                Instruction::Or => {
                    binary_op(&mut stack, |a, b| bool_value(a != 0.0 || b != 0.0))?
                }
                Instruction::LessThan => binary_op(&mut stack, |a, b| bool_value(a < b))?,
                Instruction::LessOrEqualThan => binary_op(&mut stack, |a, b| bool_value(a <= b))?,
                Instruction::GreaterThan => binary_op(&mut stack, |a, b| bool_value(a > b))?,
                Instruction::GreaterOrEqualThan => {
                    binary_op(&mut stack, |a, b| bool_value(a >= b))?
                }
                Instruction::Equal => binary_op(&mut stack, |a, b| bool_value(a == b))?,
                Instruction::NotEqual => binary_op(&mut stack, |a, b| bool_value(a != b))?,
                Instruction::Call {
                    function,
                    arg_count,
                } => {
                    if stack.len() < *arg_count {
                        return Err(EvalError::StackUnderflow);
                    }
                    let base = stack.len() - arg_count;
                    let result = function.call(&stack[base..]);
                    stack.truncate(base);
                    stack.push(result);
                }
            }
        }
        let result = pop(&mut stack)?;
        if stack.is_empty() {
            Ok(result)
        } else {
            Err(EvalError::StackUnderflow)
        }
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }
}

fn pop(stack: &mut Vec<f64>) -> Result<f64, EvalError> {
    stack.pop().ok_or(EvalError::StackUnderflow)
}

fn binary_op<F>(stack: &mut Vec<f64>, op: F) -> Result<(), EvalError>
where
    F: Fn(f64, f64) -> f64,
{
    let right = pop(stack)?;
    let left = pop(stack)?;
    stack.push(op(left, right));
    Ok(())
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
    use crate::ast::{AstBuilder, Interpreter, Tokenizer};
    use crate::constants::ConstantRegistry;
    use crate::functions::FunctionInfo;
    use std::collections::HashMap;

    fn registries() -> (FunctionRegistry, ConstantRegistry) {
        let mut functions = FunctionRegistry::new(false, false);
        functions
            .register(FunctionInfo::fixed("sqrt", 1, true, |args| args[0].sqrt()))
            .unwrap();
        functions
            .register(FunctionInfo::fixed("logn", 2, true, |args| {
                args[0].log(args[1])
            }))
            .unwrap();
        functions
            .register(FunctionInfo::dynamic("avg", true, |args| {
                args.iter().sum::<f64>() / args.len() as f64
            }))
            .unwrap();
        (functions, ConstantRegistry::new(false, false))
    }

    fn parse(source: &str) -> (Expr, FunctionRegistry, ConstantRegistry) {
        let (functions, constants) = registries();
        let tokens = Tokenizer::new(source, '.', ',')
            .tokenize()
            .expect("tokenize");
        let ast = AstBuilder::new(&functions, &constants, false)
            .build(&tokens)
            .expect("parse");
        (ast, functions, constants)
    }

    fn run(source: &str, variables: &HashMap<String, f64>) -> Result<f64, EvalError> {
        let (ast, functions, constants) = parse(source);
        let compiled = Compiler::compile(&ast, &functions).expect("compile");
        let ctx = FormulaContext::new(variables, &functions, &constants, false);
        compiled.evaluate(&ctx)
    }

    #[test]
    fn test_arithmetic() {
        let vars = HashMap::new();
        assert_eq!(run("3 + 5 * 2", &vars), Ok(13.0));
        assert_eq!(run("2 ^ 3 ^ 2", &vars), Ok(512.0));
        assert_eq!(run("-(2 + 3) * 4", &vars), Ok(-20.0));
        assert_eq!(run("10 % 4", &vars), Ok(2.0));
    }

    #[test]
    fn test_variables() {
        let mut vars = HashMap::new();
        vars.insert("a".to_string(), 2.0);
        vars.insert("b".to_string(), 10.0);
        assert_eq!(run("a * b + 1", &vars), Ok(21.0));
        assert_eq!(
            run("missing + 1", &vars),
            Err(EvalError::VariableNotDefined("missing".to_string()))
        );
    }

    #[test]
    fn test_fixed_and_dynamic_calls() {
        let vars = HashMap::new();
        assert_eq!(run("sqrt(25)", &vars), Ok(5.0));
        assert_eq!(run("logn(8, 2)", &vars), Ok(3.0));
        assert_eq!(run("avg(1, 2, 3, 4)", &vars), Ok(2.5));
        assert_eq!(run("avg(sqrt(16), logn(8, 2), 5)", &vars), Ok(4.0));
    }

    #[test]
    fn test_call_argument_order_is_left_to_right() {
        let mut functions = FunctionRegistry::new(false, false);
        functions
            .register(FunctionInfo::fixed("first_minus_second", 2, true, |args| {
                args[0] - args[1]
            }))
            .unwrap();
        let constants = ConstantRegistry::new(false, false);
        let tokens = Tokenizer::new("first_minus_second(10, 4)", '.', ',')
            .tokenize()
            .unwrap();
        let ast = AstBuilder::new(&functions, &constants, false)
            .build(&tokens)
            .unwrap();
        let compiled = Compiler::compile(&ast, &functions).unwrap();
        let vars = HashMap::new();
        let ctx = FormulaContext::new(&vars, &functions, &constants, false);
        assert_eq!(compiled.evaluate(&ctx), Ok(6.0));
    }

    #[test]
    fn test_agreement_with_interpreter() {
        let mut vars = HashMap::new();
        vars.insert("x".to_string(), 3.5);
        vars.insert("y".to_string(), -2.0);
        for source in [
            "x + y * 2",
            "x / y",
            "x % y",
            "x ^ y",
            "-x",
            "x > y && y < 0",
            "x == 3.5 || y == 0",
            "sqrt(x * x)",
            "avg(x, y, 1)",
            "x != y",
            "x <= y",
            "0 / 0",
            "1 / 0",
        ] {
            let (ast, functions, constants) = parse(source);
            let compiled = Compiler::compile(&ast, &functions).expect("compile");
            let ctx = FormulaContext::new(&vars, &functions, &constants, false);
            let interpreted = Interpreter::evaluate(&ast, &ctx).expect("interpret");
            let executed = compiled.evaluate(&ctx).expect("execute");
            if interpreted.is_nan() {
                assert!(executed.is_nan(), "source: {source}");
            } else {
                assert_eq!(
                    interpreted.to_bits(),
                    executed.to_bits(),
                    "source: {source}"
                );
            }
        }
    }
}
