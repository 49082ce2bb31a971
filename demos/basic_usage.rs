use formulix::{Evaluator, ExecutionMode};
use std::collections::HashMap;

fn main() {
    pretty_env_logger::init();

    let evaluator = Evaluator::builder()
        .execution_mode(ExecutionMode::Compiled)
        .constant("gravity", 9.81)
        .function("double", 1, true, |args| args[0] * 2.0)
        .dynamic_function("spread", true, |args| {
            let max = args.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let min = args.iter().cloned().fold(f64::INFINITY, f64::min);
            max - min
        })
        .build()
        .expect("configuration is valid");

    let variables = HashMap::from([
        ("mass".to_string(), 70.0),
        ("height".to_string(), 2.5),
    ]);

    let result = evaluator
        .evaluate("mass * gravity * height", &variables)
        .expect("evaluates");
    println!("potential energy: {result}");

    // A delegate is parsed once and can be evaluated with different
    // variable bindings.
    let formula = evaluator
        .create_delegate("if(mass > 50, double(height), spread(1, 2, mass))")
        .expect("parses");
    println!("referenced variables: {:?}", formula.variable_names());
    for mass in [30.0, 70.0] {
        let mut variables = variables.clone();
        variables.insert("mass".to_string(), mass);
        println!(
            "mass = {mass}: {}",
            formula.evaluate(&variables).expect("evaluates")
        );
    }

    match evaluator.validate("2 + * 3") {
        Ok(()) => println!("expression is valid"),
        Err(error) => println!("validation failed: {error}"),
    }
}
