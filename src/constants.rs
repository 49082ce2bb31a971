use crate::error::RegistrationError;
use crate::functions::canonical_name;
use std::collections::HashMap;

/// A named constant. Immutable after registration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantInfo {
    pub name: String,
    pub value: f64,
}

impl ConstantInfo {
    pub fn new(name: &str, value: f64) -> Self {
        ConstantInfo {
            name: name.to_string(),
            value,
        }
    }
}

/// Name → value map with the same casing and guarding rules as the function
/// registry. Constants resolve at parse time, so redefining one after a
/// formula was built would silently change nothing; guarded mode turns the
/// attempt into an error instead.
pub struct ConstantRegistry {
    case_sensitive: bool,
    guarded: bool,
    entries: HashMap<String, ConstantInfo>,
}

impl ConstantRegistry {
    pub fn new(case_sensitive: bool, guarded: bool) -> Self {
        ConstantRegistry {
            case_sensitive,
            guarded,
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, mut info: ConstantInfo) -> Result<(), RegistrationError> {
        let key = canonical_name(&info.name, self.case_sensitive);
        if self.guarded && self.entries.contains_key(&key) {
            return Err(RegistrationError::DuplicateName(info.name));
        }
        info.name = key.clone();
        self.entries.insert(key, info);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ConstantInfo> {
        if self.case_sensitive {
            self.entries.get(name)
        } else {
            self.entries.get(&canonical_name(name, false))
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstantInfo> {
        self.entries.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Registers `e` and `pi`.
pub fn register_default_constants(
    registry: &mut ConstantRegistry,
) -> Result<(), RegistrationError> {
    registry.register(ConstantInfo::new("e", std::f64::consts::E))?;
    registry.register(ConstantInfo::new("pi", std::f64::consts::PI))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut registry = ConstantRegistry::new(false, false);
        registry.register(ConstantInfo::new("Answer", 42.0)).unwrap();
        assert_eq!(registry.get("answer").map(|c| c.value), Some(42.0));
        assert_eq!(registry.get("ANSWER").map(|c| c.value), Some(42.0));
    }

    #[test]
    fn test_guarded_mode_rejects_redefinition() {
        let mut registry = ConstantRegistry::new(false, true);
        registry.register(ConstantInfo::new("g", 9.81)).unwrap();
        assert_eq!(
            registry.register(ConstantInfo::new("g", 10.0)),
            Err(RegistrationError::DuplicateName("g".to_string()))
        );
    }

    #[test]
    fn test_unguarded_overwrite_wins() {
        let mut registry = ConstantRegistry::new(false, false);
        registry.register(ConstantInfo::new("g", 9.81)).unwrap();
        registry.register(ConstantInfo::new("g", 10.0)).unwrap();
        assert_eq!(registry.get("g").map(|c| c.value), Some(10.0));
    }

    #[test]
    fn test_default_constants() {
        let mut registry = ConstantRegistry::new(false, false);
        register_default_constants(&mut registry).unwrap();
        assert_eq!(registry.get("pi").map(|c| c.value), Some(std::f64::consts::PI));
        assert_eq!(registry.get("e").map(|c| c.value), Some(std::f64::consts::E));
        assert_eq!(registry.len(), 2);
    }
}
