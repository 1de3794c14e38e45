//! PII redaction applied before a prompt leaves the process, with the
//! reverse map kept only in core process memory (§4.3).

use orch_core::config::RedactionPattern;
use regex::Regex;
use std::collections::HashMap;

/// Compiled form of the configured `redaction_patterns` (§6).
pub struct Redactor {
    rules: Vec<(Regex, String)>,
}

impl Redactor {
    /// Compile `patterns`. Malformed regexes are skipped rather than
    /// failing gateway construction — a bad pattern shouldn't take down
    /// the whole orchestrator.
    #[must_use]
    pub fn new(patterns: &[RedactionPattern]) -> Self {
        let rules = patterns
            .iter()
            .filter_map(|p| Regex::new(&p.pattern).ok().map(|re| (re, p.tag.clone())))
            .collect();
        Self { rules }
    }

    #[must_use]
    pub fn none() -> Self {
        Self { rules: Vec::new() }
    }

    /// Replace every match with an opaque `[[REDACTED:tag:n]]` token,
    /// returning the redacted text plus the reverse map needed to restore
    /// the original values for in-process use only.
    #[must_use]
    pub fn redact(&self, text: &str) -> (String, HashMap<String, String>) {
        let mut reverse = HashMap::new();
        let mut out = text.to_string();
        for (index, (re, tag)) in self.rules.iter().enumerate() {
            let mut counter = 0usize;
            out = re
                .replace_all(&out, |caps: &regex::Captures| {
                    let token = format!("[[REDACTED:{tag}:{index}:{counter}]]");
                    reverse.insert(token.clone(), caps[0].to_string());
                    counter += 1;
                    token
                })
                .into_owned();
        }
        (out, reverse)
    }

    /// Restore original values in `text` using a reverse map produced by
    /// [`Self::redact`]. Never call this on anything about to leave the
    /// process.
    #[must_use]
    pub fn unredact(text: &str, reverse: &HashMap<String, String>) -> String {
        let mut out = text.to_string();
        for (token, original) in reverse {
            out = out.replace(token, original);
        }
        out
    }
}
