use crate::error::RegistrationError;
use crate::functions::{FunctionInfo, FunctionRegistry};
use rand::Rng;

/// Registers the default function table: fixed-arity trigonometry, logs,
/// rounding and conditionals, the dynamic-arity aggregates, and `random`.
///
/// Everything except `random` is idempotent and therefore eligible for
/// constant folding.
pub fn register_default_functions(
    registry: &mut FunctionRegistry,
) -> Result<(), RegistrationError> {
    registry.register(FunctionInfo::fixed("sin", 1, true, |a| a[0].sin()))?;
    registry.register(FunctionInfo::fixed("cos", 1, true, |a| a[0].cos()))?;
    registry.register(FunctionInfo::fixed("tan", 1, true, |a| a[0].tan()))?;
    registry.register(FunctionInfo::fixed("asin", 1, true, |a| a[0].asin()))?;
    registry.register(FunctionInfo::fixed("acos", 1, true, |a| a[0].acos()))?;
    registry.register(FunctionInfo::fixed("atan", 1, true, |a| a[0].atan()))?;
    registry.register(FunctionInfo::fixed("csc", 1, true, |a| 1.0 / a[0].sin()))?;
    registry.register(FunctionInfo::fixed("sec", 1, true, |a| 1.0 / a[0].cos()))?;
    registry.register(FunctionInfo::fixed("cot", 1, true, |a| {
        a[0].cos() / a[0].sin()
    }))?;
    registry.register(FunctionInfo::fixed("acot", 1, true, |a| (1.0 / a[0]).atan()))?;
    registry.register(FunctionInfo::fixed("loge", 1, true, |a| a[0].ln()))?;
    registry.register(FunctionInfo::fixed("log10", 1, true, |a| a[0].log10()))?;
    registry.register(FunctionInfo::fixed("logn", 2, true, |a| a[0].log(a[1])))?;
    registry.register(FunctionInfo::fixed("sqrt", 1, true, |a| a[0].sqrt()))?;
    registry.register(FunctionInfo::fixed("abs", 1, true, |a| a[0].abs()))?;
    registry.register(FunctionInfo::fixed("ceiling", 1, true, |a| a[0].ceil()))?;
    registry.register(FunctionInfo::fixed("floor", 1, true, |a| a[0].floor()))?;
    registry.register(FunctionInfo::fixed("truncate", 1, true, |a| a[0].trunc()))?;
    registry.register(FunctionInfo::fixed("round", 1, true, |a| a[0].round()))?;
    registry.register(FunctionInfo::fixed("if", 3, true, |a| {
        if a[0] != 0.0 {
            a[1]
        } else {
            a[2]
        }
    }))?;
    registry.register(FunctionInfo::fixed("ifless", 4, true, |a| {
        if a[0] < a[1] {
            a[2]
        } else {
            a[3]
        }
    }))?;
    registry.register(FunctionInfo::fixed("ifmore", 4, true, |a| {
        if a[0] > a[1] {
            a[2]
        } else {
            a[3]
        }
    }))?;
    registry.register(FunctionInfo::fixed("ifequal", 4, true, |a| {
        if a[0] == a[1] {
            a[2]
        } else {
            a[3]
        }
    }))?;
    registry.register(FunctionInfo::dynamic("max", true, |a| {
        a.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }))?;
    registry.register(FunctionInfo::dynamic("min", true, |a| {
        a.iter().cloned().fold(f64::INFINITY, f64::min)
    }))?;
    registry.register(FunctionInfo::dynamic("avg", true, |a| {
        a.iter().sum::<f64>() / a.len() as f64
    }))?;
    registry.register(FunctionInfo::dynamic("median", true, median))?;
    registry.register(FunctionInfo::dynamic("sum", true, |a| a.iter().sum()))?;
    registry.register(FunctionInfo::fixed("random", 0, false, |_| {
        rand::thread_rng().gen::<f64>()
    }))?;
    Ok(())
}

/// Middle value of the sorted arguments; the mean of the two middle values
/// for an even count.
fn median(args: &[f64]) -> f64 {
    let mut sorted = args.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new(false, false);
        register_default_functions(&mut registry).unwrap();
        registry
    }

    fn call(registry: &FunctionRegistry, name: &str, args: &[f64]) -> f64 {
        registry.get(name).unwrap().call(args)
    }

    #[test]
    fn test_trigonometry() {
        let registry = registry();
        assert_eq!(call(&registry, "sin", &[0.0]), 0.0);
        assert_eq!(call(&registry, "cos", &[0.0]), 1.0);
        assert!((call(&registry, "tan", &[std::f64::consts::FRAC_PI_4]) - 1.0).abs() < 1e-12);
        assert!((call(&registry, "csc", &[std::f64::consts::FRAC_PI_2]) - 1.0).abs() < 1e-12);
        assert_eq!(call(&registry, "sec", &[0.0]), 1.0);
        assert!(
            (call(&registry, "cot", &[std::f64::consts::FRAC_PI_4]) - 1.0).abs() < 1e-12
        );
        assert!(
            (call(&registry, "acot", &[1.0]) - std::f64::consts::FRAC_PI_4).abs() < 1e-12
        );
    }

    #[test]
    fn test_logarithms_and_roots() {
        let registry = registry();
        assert_eq!(call(&registry, "loge", &[std::f64::consts::E]), 1.0);
        assert_eq!(call(&registry, "log10", &[1000.0]), 3.0);
        assert_eq!(call(&registry, "logn", &[32.0, 2.0]), 5.0);
        assert_eq!(call(&registry, "sqrt", &[81.0]), 9.0);
    }

    #[test]
    fn test_rounding() {
        let registry = registry();
        assert_eq!(call(&registry, "abs", &[-4.5]), 4.5);
        assert_eq!(call(&registry, "ceiling", &[1.2]), 2.0);
        assert_eq!(call(&registry, "floor", &[1.8]), 1.0);
        assert_eq!(call(&registry, "truncate", &[-1.8]), -1.0);
        assert_eq!(call(&registry, "round", &[2.5]), 3.0);
    }

    #[test]
    fn test_conditionals() {
        let registry = registry();
        assert_eq!(call(&registry, "if", &[1.0, 7.0, 9.0]), 7.0);
        assert_eq!(call(&registry, "if", &[0.0, 7.0, 9.0]), 9.0);
        assert_eq!(call(&registry, "if", &[-0.5, 7.0, 9.0]), 7.0);
        assert_eq!(call(&registry, "ifless", &[1.0, 2.0, 10.0, 20.0]), 10.0);
        assert_eq!(call(&registry, "ifmore", &[1.0, 2.0, 10.0, 20.0]), 20.0);
        assert_eq!(call(&registry, "ifequal", &[2.0, 2.0, 10.0, 20.0]), 10.0);
    }

    #[test]
    fn test_aggregates() {
        let registry = registry();
        assert_eq!(call(&registry, "max", &[1.0, 2.0, 3.0, -4.0]), 3.0);
        assert_eq!(call(&registry, "min", &[1.0, 2.0, 3.0, -4.0]), -4.0);
        assert_eq!(call(&registry, "avg", &[1.0, 2.0, 3.0, 4.0]), 2.5);
        assert_eq!(call(&registry, "sum", &[1.0, 2.0, 3.0, 4.0]), 10.0);
        assert_eq!(call(&registry, "median", &[5.0, 1.0, 3.0]), 3.0);
        assert_eq!(call(&registry, "median", &[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_random_is_registered_as_non_idempotent() {
        let registry = registry();
        let info = registry.get("random").unwrap();
        assert!(!info.is_idempotent());
        assert_eq!(info.number_of_parameters(), Some(0));
        for _ in 0..100 {
            let value = info.call(&[]);
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn test_all_defaults_present() {
        let registry = registry();
        for name in [
            "sin", "cos", "tan", "asin", "acos", "atan", "csc", "sec", "cot", "acot", "loge",
            "log10", "logn", "sqrt", "abs", "ceiling", "floor", "truncate", "round", "if",
            "ifless", "ifmore", "ifequal", "max", "min", "avg", "median", "sum", "random",
        ] {
            assert!(registry.contains(name), "missing builtin: {name}");
        }
    }
}
