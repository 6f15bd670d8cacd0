//! Per-action limit rules.
//!
//! Callers of the admission service may omit a limit; the limit is then
//! looked up here by action name, falling back to a default. A file looks
//! like:
//!
//! ```yaml
//! default_limit: 10
//! actions:
//!   - action: LOGIN
//!     limit: 5
//!   - action: CREATE_ADMIN
//!     limit: 3
//! ```
//!
//! Every limit must be positive; loading rejects zero.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::error::{Result, TurnstileError};

/// Limit applied when neither the caller nor the rules name one.
pub const DEFAULT_LIMIT: u32 = 10;

/// Per-action limits with a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRules {
    /// Limit for actions without a rule
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    /// Rules in file order
    #[serde(default)]
    pub actions: Vec<ActionRule>,
}

/// A limit for one named action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRule {
    /// The action name to match exactly
    pub action: String,
    /// Operations permitted per window
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl Default for ActionRules {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            actions: Vec::new(),
        }
    }
}

impl ActionRules {
    /// Create rules with only a default limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading action rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rules: ActionRules = serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse action rules: {}", e)))?;
        rules.validate()?;
        Ok(rules)
    }

    fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            return Err(TurnstileError::Config(
                "default_limit must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for rule in &self.actions {
            if rule.action.is_empty() {
                return Err(TurnstileError::Config(
                    "action rule with empty action name".to_string(),
                ));
            }
            if rule.limit == 0 {
                return Err(TurnstileError::Config(format!(
                    "limit for action {} must be greater than zero",
                    rule.action
                )));
            }
            if !seen.insert(rule.action.as_str()) {
                return Err(TurnstileError::Config(format!(
                    "duplicate rule for action {}",
                    rule.action
                )));
            }
        }
        Ok(())
    }

    /// Find the configured rule for an action.
    pub fn find(&self, action: &str) -> Option<&ActionRule> {
        self.actions.iter().find(|rule| rule.action == action)
    }

    /// Resolve the limit for one call.
    ///
    /// A non-zero `requested` limit wins, then the action's rule, then the
    /// default.
    pub fn limit_for(&self, action: &str, requested: u32) -> u32 {
        if requested > 0 {
            return requested;
        }

        self.find(action)
            .map(|rule| rule.limit)
            .unwrap_or(self.default_limit)
    }
}
