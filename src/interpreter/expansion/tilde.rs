//! Tilde Expansion
//!
//! `~` is `$HOME`, `~+` is `$PWD`, `~-` is `$OLDPWD`. Other users live
//! under `/home/<user>` in the virtual filesystem, except the current
//! `$USER` whose home is `$HOME`.

use crate::interpreter::types::InterpreterState;

const DEFAULT_HOME: &str = "/home/user";

impl InterpreterState {
    pub fn expand_tilde(&mut self, user: Option<&str>) -> String {
        match user {
            None => self.vars.get_scalar("HOME").unwrap_or_else(|| DEFAULT_HOME.to_string()),
            Some("+") => self.vars.get_scalar("PWD").unwrap_or_else(|| self.cwd.clone()),
            Some("-") => self.vars.get_scalar("OLDPWD").unwrap_or_else(|| "~-".to_string()),
            Some(name) => {
                if self.vars.get_scalar("USER").as_deref() == Some(name) {
                    if let Some(home) = self.vars.get_scalar("HOME") {
                        return home;
                    }
                }
                format!("/home/{}", name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tilde_forms() {
        let mut state = InterpreterState::default();
        assert_eq!(state.expand_tilde(None), "/home/user");
        state.vars.set_scalar("HOME", "/root").unwrap();
        state.vars.set_scalar("PWD", "/work").unwrap();
        state.vars.set_scalar("USER", "root").unwrap();
        assert_eq!(state.expand_tilde(None), "/root");
        assert_eq!(state.expand_tilde(Some("+")), "/work");
        assert_eq!(state.expand_tilde(Some("-")), "~-");
        assert_eq!(state.expand_tilde(Some("root")), "/root");
        assert_eq!(state.expand_tilde(Some("bob")), "/home/bob");
    }
}
