use std::collections::HashMap;
use std::fmt;

use crate::operator::Operator;
use crate::ops;

/// Maps operation type names to their [`Operator`] implementations.
pub struct OpRegistry {
    operators: HashMap<String, Box<dyn Operator>>,
}

impl OpRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in operator.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        ops::register_defaults(&mut registry);
        registry
    }

    /// Register an operator under its own name, replacing any previous
    /// operator of that name. Returns `self` for chaining.
    pub fn register<O>(&mut self, operator: O) -> &mut Self
    where
        O: Operator + 'static,
    {
        let name = operator.name().to_string();
        tracing::trace!(op_type = %name, "registering operator");
        self.operators.insert(name, Box::new(operator));
        self
    }

    /// Look up an operator by type name.
    pub fn get(&self, op_type: &str) -> Option<&dyn Operator> {
        self.operators.get(op_type).map(|op| op.as_ref())
    }

    pub fn contains(&self, op_type: &str) -> bool {
        self.operators.contains_key(op_type)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Registered type names, sorted.
    pub fn operator_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for OpRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OpRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpRegistry")
            .field("operators", &self.operator_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = OpRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("Add").is_none());
    }

    #[test]
    fn test_defaults_cover_catalog() {
        let registry = OpRegistry::with_defaults();
        for name in [
            ops::PARAMETER,
            ops::CONSTANT,
            ops::ADD,
            ops::MINIMUM,
            ops::MAXIMUM,
            ops::CONVERT,
            ops::CONCAT,
            ops::REDUCE_MIN,
            ops::REDUCE_MAX,
            ops::RANGE,
            ops::SHAPE_OF,
            ops::SQUEEZE,
            ops::UNSQUEEZE,
            ops::SPLIT,
        ] {
            assert!(registry.contains(name), "{} not registered", name);
            assert_eq!(registry.get(name).map(|op| op.name()), Some(name));
        }
        assert_eq!(registry.len(), 14);
        let names = registry.operator_names();
        assert!(names.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = OpRegistry::new();
        registry
            .register(ops::elementwise::Add)
            .register(ops::elementwise::Add);
        assert_eq!(registry.len(), 1);
    }
}
