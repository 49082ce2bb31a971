use crate::error::RegistrationError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

mod builtin;

pub use builtin::register_default_functions;

/// Type-erased callable backing a registered function. Every parameter and
/// the return value are doubles; arguments arrive as one contiguous slice.
pub type NativeFunction = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// The calling shape of a registered function.
#[derive(Clone)]
pub enum FunctionBody {
    /// Exactly `arity` positional arguments.
    Fixed { arity: usize, func: NativeFunction },
    /// One or more arguments, passed as a single slice.
    Dynamic { func: NativeFunction },
}

/// A registered function: its canonical name, calling shape, and whether its
/// result depends only on its inputs (making it safe to fold at build time).
#[derive(Clone)]
pub struct FunctionInfo {
    name: String,
    body: FunctionBody,
    is_idempotent: bool,
}

impl FunctionInfo {
    pub fn fixed<F>(name: &str, arity: usize, is_idempotent: bool, func: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        FunctionInfo {
            name: name.to_string(),
            body: FunctionBody::Fixed {
                arity,
                func: Arc::new(func),
            },
            is_idempotent,
        }
    }

    pub fn dynamic<F>(name: &str, is_idempotent: bool, func: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        FunctionInfo {
            name: name.to_string(),
            body: FunctionBody::Dynamic {
                func: Arc::new(func),
            },
            is_idempotent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Some(n)` for fixed arity, `None` for dynamic arity.
    pub fn number_of_parameters(&self) -> Option<usize> {
        match self.body {
            FunctionBody::Fixed { arity, .. } => Some(arity),
            FunctionBody::Dynamic { .. } => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.body, FunctionBody::Dynamic { .. })
    }

    pub fn is_idempotent(&self) -> bool {
        self.is_idempotent
    }

    pub fn call(&self, args: &[f64]) -> f64 {
        match &self.body {
            FunctionBody::Fixed { func, .. } | FunctionBody::Dynamic { func } => func(args),
        }
    }
}

impl fmt::Debug for FunctionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionInfo")
            .field("name", &self.name)
            .field("number_of_parameters", &self.number_of_parameters())
            .field("is_idempotent", &self.is_idempotent)
            .finish()
    }
}

/// Lowercases `name` when the registry is case-insensitive, with a fast path
/// for ASCII names.
pub(crate) fn canonical_name(name: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        name.to_string()
    } else if name.is_ascii() {
        name.to_ascii_lowercase()
    } else {
        name.to_lowercase()
    }
}

/// Name → function map. Case sensitivity is fixed at construction; guarded
/// mode forbids redefinition, and even outside guarded mode an overwrite must
/// keep the original calling shape.
pub struct FunctionRegistry {
    case_sensitive: bool,
    guarded: bool,
    entries: HashMap<String, Arc<FunctionInfo>>,
}

impl FunctionRegistry {
    pub fn new(case_sensitive: bool, guarded: bool) -> Self {
        FunctionRegistry {
            case_sensitive,
            guarded,
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, mut info: FunctionInfo) -> Result<(), RegistrationError> {
        let key = canonical_name(&info.name, self.case_sensitive);
        if let Some(existing) = self.entries.get(&key) {
            if self.guarded {
                return Err(RegistrationError::DuplicateName(info.name));
            }
            let same_shape = existing.is_dynamic() == info.is_dynamic()
                && existing.number_of_parameters() == info.number_of_parameters();
            if !same_shape {
                return Err(RegistrationError::ArityChange { name: info.name });
            }
        }
        info.name = key.clone();
        self.entries.insert(key, Arc::new(info));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FunctionInfo>> {
        if self.case_sensitive || name.chars().all(|c| c.is_ascii_lowercase() || !c.is_alphabetic())
        {
            self.entries.get(name)
        } else {
            self.entries.get(&canonical_name(name, false))
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionInfo> {
        self.entries.values().map(|info| info.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_and_dynamic_metadata() {
        let fixed = FunctionInfo::fixed("plus1", 1, true, |args| args[0] + 1.0);
        assert_eq!(fixed.number_of_parameters(), Some(1));
        assert!(!fixed.is_dynamic());
        assert_eq!(fixed.call(&[2.0]), 3.0);

        let dynamic = FunctionInfo::dynamic("total", true, |args| args.iter().sum());
        assert_eq!(dynamic.number_of_parameters(), None);
        assert!(dynamic.is_dynamic());
        assert_eq!(dynamic.call(&[1.0, 2.0, 3.0]), 6.0);
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let mut registry = FunctionRegistry::new(false, false);
        registry
            .register(FunctionInfo::fixed("Twice", 1, true, |args| args[0] * 2.0))
            .unwrap();
        assert!(registry.contains("twice"));
        assert!(registry.contains("TWICE"));
        assert_eq!(registry.get("tWiCe").unwrap().name(), "twice");
    }

    #[test]
    fn test_case_sensitive_lookup() {
        let mut registry = FunctionRegistry::new(true, false);
        registry
            .register(FunctionInfo::fixed("Twice", 1, true, |args| args[0] * 2.0))
            .unwrap();
        assert!(registry.contains("Twice"));
        assert!(!registry.contains("twice"));
    }

    #[test]
    fn test_guarded_mode_rejects_redefinition() {
        let mut registry = FunctionRegistry::new(false, true);
        registry
            .register(FunctionInfo::fixed("f", 1, true, |args| args[0]))
            .unwrap();
        let result = registry.register(FunctionInfo::fixed("f", 1, true, |args| -args[0]));
        assert_eq!(
            result,
            Err(RegistrationError::DuplicateName("f".to_string()))
        );
    }

    #[test]
    fn test_overwrite_must_preserve_shape() {
        let mut registry = FunctionRegistry::new(false, false);
        registry
            .register(FunctionInfo::fixed("f", 2, true, |args| args[0] + args[1]))
            .unwrap();

        // Same shape: allowed.
        registry
            .register(FunctionInfo::fixed("f", 2, true, |args| args[0] * args[1]))
            .unwrap();
        assert_eq!(registry.get("f").unwrap().call(&[3.0, 4.0]), 12.0);

        // Arity change: rejected.
        let result = registry.register(FunctionInfo::fixed("f", 1, true, |args| args[0]));
        assert_eq!(
            result,
            Err(RegistrationError::ArityChange {
                name: "f".to_string()
            })
        );

        // Dynamic-arity flag change: rejected.
        let result = registry.register(FunctionInfo::dynamic("f", true, |args| args[0]));
        assert_eq!(
            result,
            Err(RegistrationError::ArityChange {
                name: "f".to_string()
            })
        );
    }
}
