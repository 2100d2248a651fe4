//! Glob patterns for blob listings
//!
//! Translates shell-style globs (`*`, `?`, `[abc]`, `[!abc]`) into anchored
//! regular expressions matched against a single file name. Wildcards never
//! cross a `/`.

use regex::Regex;

use crate::error::{StorageError, StorageResult};

/// A compiled glob matched against bare file names
#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: String,
    regex: Regex,
    hint: Option<String>,
}

impl GlobPattern {
    /// Compile `pattern`; an empty pattern matches everything
    pub fn new(pattern: &str) -> StorageResult<Self> {
        let raw = if pattern.is_empty() { "*" } else { pattern };

        let mut source = String::from("^");
        let mut literals: Vec<String> = vec![String::new()];
        let chars: Vec<char> = raw.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '*' => {
                    source.push_str("[^/]*");
                    literals.push(String::new());
                }
                '?' => {
                    source.push_str("[^/]");
                    literals.push(String::new());
                }
                '[' => match chars[i + 1..].iter().position(|&c| c == ']') {
                    // `[]` is not a class; treat the bracket literally
                    Some(end) if end > 0 => {
                        let body: String = chars[i + 1..i + 1 + end].iter().collect();
                        source.push('[');
                        let body = match body.strip_prefix('!') {
                            Some(rest) => {
                                source.push('^');
                                rest.to_string()
                            }
                            None => body,
                        };
                        for c in body.chars() {
                            if c == '-' {
                                source.push('-');
                            } else {
                                source.push_str(&regex::escape(&c.to_string()));
                            }
                        }
                        source.push(']');
                        literals.push(String::new());
                        i += end + 1;
                    }
                    _ => {
                        source.push_str(&regex::escape("["));
                        push_literal(&mut literals, '[');
                    }
                },
                c => {
                    source.push_str(&regex::escape(&c.to_string()));
                    push_literal(&mut literals, c);
                }
            }
            i += 1;
        }
        source.push('$');

        let regex = Regex::new(&source)
            .map_err(|e| StorageError::InvalidPath(format!("bad pattern '{}': {}", raw, e)))?;

        Ok(Self {
            raw: raw.to_string(),
            regex,
            hint: pick_hint(literals),
        })
    }

    /// Whether a bare file name matches
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// A literal fragment every match must contain (`*.md` gives `.md`)
    ///
    /// Used to narrow remote `name contains` queries. The server-side filter
    /// can over-match (`foo.md.bak`), so results still go through
    /// [`GlobPattern::matches`].
    pub fn contains_hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }
}

fn push_literal(literals: &mut [String], c: char) {
    if let Some(last) = literals.last_mut() {
        last.push(c);
    }
}

/// Prefer the trailing literal (the extension), else the longest one
fn pick_hint(literals: Vec<String>) -> Option<String> {
    let last = literals.last().cloned().unwrap_or_default();
    if !last.is_empty() {
        return Some(last);
    }
    literals
        .into_iter()
        .filter(|l| !l.is_empty())
        .max_by_key(|l| l.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_pattern() {
        let glob = GlobPattern::new("*.md").unwrap();
        assert!(glob.matches("2026-01-01.md"));
        assert!(glob.matches(".md"));
        assert!(!glob.matches("foo.md.bak"));
        assert!(!glob.matches("notes.txt"));
        assert_eq!(glob.contains_hint(), Some(".md"));
    }

    #[test]
    fn test_question_mark_and_classes() {
        let glob = GlobPattern::new("2026-0?-[0-3]?.md").unwrap();
        assert!(glob.matches("2026-01-15.md"));
        assert!(!glob.matches("2026-01-45.md"));

        let negated = GlobPattern::new("[!_]*.json").unwrap();
        assert!(negated.matches("tasks.json"));
        assert!(!negated.matches("_draft.json"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let glob = GlobPattern::new("a+b(1).txt").unwrap();
        assert!(glob.matches("a+b(1).txt"));
        assert!(!glob.matches("aab1.txt"));
    }

    #[test]
    fn test_wildcard_does_not_cross_separator() {
        let glob = GlobPattern::new("*.md").unwrap();
        assert!(!glob.matches("sub/a.md"));
    }

    #[test]
    fn test_empty_and_star() {
        let all = GlobPattern::new("").unwrap();
        assert!(all.matches("anything"));
        assert_eq!(all.as_str(), "*");
        assert_eq!(all.contains_hint(), None);
    }

    #[test]
    fn test_hint_selection() {
        assert_eq!(GlobPattern::new("tasks.json").unwrap().contains_hint(), Some("tasks.json"));
        assert_eq!(GlobPattern::new("daily-*").unwrap().contains_hint(), Some("daily-"));
        assert_eq!(GlobPattern::new("log-*-x*").unwrap().contains_hint(), Some("log-"));
    }

    #[test]
    fn test_unclosed_bracket_is_literal() {
        let glob = GlobPattern::new("[draft").unwrap();
        assert!(glob.matches("[draft"));
    }
}
