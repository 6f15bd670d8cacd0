//! Registry key generation and handling.

/// Separator between the action name and the client identifier.
pub const KEY_SEPARATOR: char = '_';

/// A key that uniquely identifies one action budget for one client.
///
/// Equality and hashing use both parts, so an action name that happens to
/// contain the separator cannot collide with another action/client pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// The logical action being throttled
    pub action: String,
    /// The derived client identifier
    pub client: String,
}

impl RateLimitKey {
    /// Create a new key from an action name and a client identifier.
    pub fn new(action: &str, client: &str) -> Self {
        Self {
            action: action.to_string(),
            client: client.to_string(),
        }
    }

    /// Convert the key to its joined string form, e.g. `LOGIN_203.0.113.7`.
    pub fn to_string_key(&self) -> String {
        format!("{}{}{}", self.action, KEY_SEPARATOR, self.client)
    }
}

impl std::fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_to_string() {
        let key = RateLimitKey::new("LOGIN", "203.0.113.7");
        assert_eq!(key.to_string_key(), "LOGIN_203.0.113.7");
        assert_eq!(key.to_string(), "LOGIN_203.0.113.7");
    }

    #[test]
    fn test_key_equality() {
        let key1 = RateLimitKey::new("LOGIN", "10.0.0.1");
        let key2 = RateLimitKey::new("LOGIN", "10.0.0.1");
        let key3 = RateLimitKey::new("RESET_PASSWORD", "10.0.0.1");

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
    }

    #[test]
    fn test_keys_with_separator_do_not_collide() {
        let key1 = RateLimitKey::new("A_B", "c");
        let key2 = RateLimitKey::new("A", "B_c");

        assert_eq!(key1.to_string_key(), key2.to_string_key());
        assert_ne!(key1, key2);
    }
}
