// src/commands/registry.rs
use std::collections::HashMap;
use super::bash_cmd::{BashCommand, ShCommand};
use super::types::Command;

/// Name to command table consulted after functions and builtins.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registry holding the commands the interpreter ships itself.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BashCommand));
        registry.register(Box::new(ShCommand));
        registry
    }

    pub fn register(&mut self, cmd: Box<dyn Command>) {
        self.commands.insert(cmd.name().to_string(), cmd);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    /// Sorted command names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry").field("commands", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_names() {
        let registry = CommandRegistry::with_defaults();
        assert!(registry.contains("bash"));
        assert!(registry.contains("sh"));
        assert_eq!(registry.names(), vec!["bash", "sh"]);
        assert!(registry.get("cat").is_none());
        assert!(CommandRegistry::new().names().is_empty());
    }
}
