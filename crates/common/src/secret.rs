//! Secret wrapper for sensitive values
//!
//! Refresh tokens must never appear in logs or Debug output. The wrapper
//! zeroizes the inner value on drop.

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value - redacted in Debug/Display/logs
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Create a new secret value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Whether the wrapped string is empty after trimming.
    ///
    /// An empty or whitespace-only refresh token means the user flow is
    /// not configured, so callers check this before attempting a mint.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_redacts_debug() {
        let secret = Secret::new(String::from("rt_refresh_value"));
        let debug = format!("{:?}", secret);
        assert_eq!(debug, "[REDACTED]");
        assert!(!debug.contains("rt_refresh_value"));
    }

    #[test]
    fn secret_exposes_value() {
        let secret = Secret::new(String::from("rt_refresh_value"));
        assert_eq!(secret.expose(), "rt_refresh_value");
    }

    #[test]
    fn blank_detection() {
        assert!(Secret::new(String::new()).is_blank());
        assert!(Secret::new(String::from("   \n")).is_blank());
        assert!(!Secret::new(String::from("rt_x")).is_blank());
    }
}
