use crate::constants::ConstantRegistry;
use crate::functions::{canonical_name, FunctionInfo, FunctionRegistry};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-evaluation bundle of variables and registries handed to an executor.
///
/// Created at the start of each evaluation and discarded afterwards. When the
/// engine is case-insensitive the variable map is canonicalised to
/// lowercased keys for the duration of the call; the caller's map is never
/// mutated.
pub struct FormulaContext<'a> {
    variables: Cow<'a, HashMap<String, f64>>,
    functions: &'a FunctionRegistry,
    constants: &'a ConstantRegistry,
}

impl<'a> FormulaContext<'a> {
    pub fn new(
        variables: &'a HashMap<String, f64>,
        functions: &'a FunctionRegistry,
        constants: &'a ConstantRegistry,
        case_sensitive: bool,
    ) -> Self {
        let variables = if case_sensitive {
            Cow::Borrowed(variables)
        } else {
            Cow::Owned(
                variables
                    .iter()
                    .map(|(name, value)| (canonical_name(name, false), *value))
                    .collect(),
            )
        };
        FormulaContext {
            variables,
            functions,
            constants,
        }
    }

    /// Resolves a name to a value: the variable map first, then the constant
    /// registry. Names inside built formulas are already canonical.
    pub fn variable(&self, name: &str) -> Option<f64> {
        self.variables
            .get(name)
            .copied()
            .or_else(|| self.constants.get(name).map(|c| c.value))
    }

    pub fn function(&self, name: &str) -> Option<&Arc<FunctionInfo>> {
        self.functions.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_lookup_falls_back_to_constants() {
        let functions = FunctionRegistry::new(false, false);
        let mut constants = ConstantRegistry::new(false, false);
        crate::constants::register_default_constants(&mut constants).unwrap();

        let mut variables = HashMap::new();
        variables.insert("x".to_string(), 3.0);

        let ctx = FormulaContext::new(&variables, &functions, &constants, false);
        assert_eq!(ctx.variable("x"), Some(3.0));
        assert_eq!(ctx.variable("pi"), Some(std::f64::consts::PI));
        assert_eq!(ctx.variable("y"), None);
    }

    #[test]
    fn test_case_insensitive_variables_are_canonicalised() {
        let functions = FunctionRegistry::new(false, false);
        let constants = ConstantRegistry::new(false, false);

        let mut variables = HashMap::new();
        variables.insert("Rate".to_string(), 0.25);

        let ctx = FormulaContext::new(&variables, &functions, &constants, false);
        assert_eq!(ctx.variable("rate"), Some(0.25));

        let ctx = FormulaContext::new(&variables, &functions, &constants, true);
        assert_eq!(ctx.variable("rate"), None);
        assert_eq!(ctx.variable("Rate"), Some(0.25));
    }
}
