//! The embedded browser a session drives.

use serde_json::Value;

use crate::error::{ChatblockError, Result};

pub trait Browser {
    fn navigate(&mut self, url: &str) -> Result<()>;
    fn reload(&mut self) -> Result<()>;
    fn execute_script(&mut self, script: &str) -> Result<Value>;
}

/// A browser without a page: records what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBrowser {
    history: Vec<String>,
    reloads: usize,
    scripts: Vec<String>,
    script_error: Option<String>,
}

impl HeadlessBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `execute_script` call fail with `message`.
    pub fn with_script_error(message: impl Into<String>) -> Self {
        Self {
            script_error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn reloads(&self) -> usize {
        self.reloads
    }

    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }
}

impl Browser for HeadlessBrowser {
    fn navigate(&mut self, url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ChatblockError::Navigation("empty url".to_string()));
        }
        self.history.push(url.to_string());
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        self.reloads += 1;
        Ok(())
    }

    fn execute_script(&mut self, script: &str) -> Result<Value> {
        if let Some(message) = &self.script_error {
            return Err(ChatblockError::Script(message.clone()));
        }
        self.scripts.push(script.to_string());
        Ok(serde_json::json!({ "ok": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_records_navigation() {
        let mut b = HeadlessBrowser::new();
        assert_eq!(b.current_url(), None);
        b.navigate("https://a/1").unwrap();
        b.navigate("https://a/2").unwrap();
        b.reload().unwrap();
        assert_eq!(b.current_url(), Some("https://a/2"));
        assert_eq!(b.history().len(), 2);
        assert_eq!(b.reloads(), 1);
        assert!(b.navigate("").is_err());
    }

    #[test]
    fn test_script_error() {
        let mut b = HeadlessBrowser::with_script_error("blocked");
        let err = b.execute_script("1").unwrap_err();
        assert_eq!(err.to_string(), "script execution failed: blocked");
        assert!(b.scripts().is_empty());

        let mut ok = HeadlessBrowser::new();
        assert_eq!(ok.execute_script("1").unwrap()["ok"], true);
        assert_eq!(ok.scripts(), ["1".to_string()]);
    }
}
