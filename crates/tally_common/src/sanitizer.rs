//! Redaction of identity data before it reaches the logs
//!
//! Emails are the identity key throughout Tally, so every log field that
//! carries one goes through [`redact`] first.

use regex::Regex;
use std::sync::OnceLock;

static PATTERNS: OnceLock<Vec<(Regex, String)>> = OnceLock::new();
static SANITIZER: OnceLock<LogSanitizer> = OnceLock::new();

pub struct LogSanitizer {
    patterns: Vec<(Regex, String)>,
}

impl LogSanitizer {
    pub fn new() -> Self {
        let patterns = PATTERNS.get_or_init(|| {
            vec![
                // Keep the first character and the domain: s***@x.com
                (
                    Regex::new(r"\b([a-zA-Z0-9])[a-zA-Z0-9._%+-]*@([a-zA-Z0-9.-]+\.[a-zA-Z]{2,})\b")
                        .unwrap(),
                    "$1***@$2".to_string(),
                ),
                (
                    Regex::new(r"(?i)(bearer\s+)[a-z0-9._~+/=-]+").unwrap(),
                    "$1***".to_string(),
                ),
                // IPv4 Address
                (
                    Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").unwrap(),
                    "***.***.***.***".to_string(),
                ),
            ]
        });

        Self {
            patterns: patterns.clone(),
        }
    }

    pub fn sanitize(&self, message: &str) -> String {
        let mut result = message.to_string();
        for (pattern, replacement) in &self.patterns {
            result = pattern.replace_all(&result, replacement).to_string();
        }
        result
    }
}

impl Default for LogSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Sanitize with the shared instance
pub fn redact(message: &str) -> String {
    SANITIZER.get_or_init(LogSanitizer::new).sanitize(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_redaction() {
        let sanitizer = LogSanitizer::new();
        let log = "Queued rating for sara.ali@example.com";
        assert_eq!(sanitizer.sanitize(log), "Queued rating for s***@example.com");
    }

    #[test]
    fn test_bare_email() {
        assert_eq!(redact("b@y.com"), "b***@y.com");
    }

    #[test]
    fn test_bearer_redaction() {
        let log = "Authorization: Bearer eyJhbGciOi.abc-123";
        assert_eq!(redact(log), "Authorization: Bearer ***");
    }

    #[test]
    fn test_ip_redaction() {
        let sanitizer = LogSanitizer::new();
        let log = "Healthcheck to 192.168.1.1 failed";
        assert_eq!(sanitizer.sanitize(log), "Healthcheck to ***.***.***.*** failed");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(redact("drained 3 pending mutations"), "drained 3 pending mutations");
    }
}
