//! Group classification by glob allow-lists.
//!
//! Patterns support `*`, `?` and `[...]` classes and match the whole group
//! name, case-insensitively. A group lands in the first enabled category
//! whose list matches, checked in the order always-on, TV, movies, so no
//! group is processed twice in one run.

use regex::Regex;

use crate::config::GroupsConfig;
use crate::error::{Error, Result};
use crate::model::MediaCategory;

/// Groups of one run, split by category, each in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPlan {
    pub always_on: Vec<String>,
    pub tv: Vec<String>,
    pub movies: Vec<String>,
}

impl GroupPlan {
    pub fn is_empty(&self) -> bool {
        self.always_on.is_empty() && self.tv.is_empty() && self.movies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.always_on.len() + self.tv.len() + self.movies.len()
    }
}

/// Compiled allow-lists.
#[derive(Debug, Clone)]
pub struct GroupMatcher {
    rules: Vec<(MediaCategory, Vec<Regex>)>,
}

impl GroupMatcher {
    pub fn new(config: &GroupsConfig) -> Result<Self> {
        let lists = [
            (
                MediaCategory::AlwaysOn,
                config.process_24_7_groups,
                &config.groups_24_7,
            ),
            (
                MediaCategory::Episode,
                config.process_tv_series_groups,
                &config.tv_series_groups,
            ),
            (
                MediaCategory::Movie,
                config.process_movies_groups,
                &config.movies_groups,
            ),
        ];

        let mut rules = Vec::new();
        for (category, enabled, patterns) in lists {
            if !enabled {
                continue;
            }
            let compiled = patterns
                .iter()
                .map(|p| glob_to_regex(p))
                .collect::<Result<Vec<_>>>()?;
            rules.push((category, compiled));
        }
        Ok(Self { rules })
    }

    /// Category `group` belongs to this run, if any.
    pub fn classify(&self, group: &str) -> Option<MediaCategory> {
        self.rules
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(group)))
            .map(|(category, _)| *category)
    }

    pub fn partition<I, S>(&self, groups: I) -> GroupPlan
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut plan = GroupPlan::default();
        for group in groups {
            let group = group.into();
            match self.classify(&group) {
                Some(MediaCategory::AlwaysOn) => plan.always_on.push(group),
                Some(MediaCategory::Episode) => plan.tv.push(group),
                Some(MediaCategory::Movie) => plan.movies.push(group),
                None => {}
            }
        }
        plan
    }
}

/// Translate a shell-style glob into an anchored, case-insensitive regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut out = String::with_capacity(pattern.len() * 2 + 8);
    out.push_str("(?is)^");

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                // Find the closing bracket; an unclosed `[` is a literal.
                // A `]` right after `[` or `[!` belongs to the set.
                let rest: String = chars.clone().collect();
                let negated = usize::from(rest.starts_with('!'));
                let leading = negated + usize::from(rest[negated..].starts_with(']'));
                let close = rest
                    .char_indices()
                    .skip(leading)
                    .find(|(_, ch)| *ch == ']')
                    .map(|(i, _)| i);
                match close {
                    Some(end) => {
                        let class = &rest[..end];
                        out.push('[');
                        let body = match class.strip_prefix('!') {
                            Some(negated) => {
                                out.push('^');
                                negated
                            }
                            None => class,
                        };
                        for ch in body.chars() {
                            if matches!(ch, '\\' | '[' | ']' | '^' | '&' | '~') {
                                out.push('\\');
                            }
                            out.push(ch);
                        }
                        out.push(']');
                        for _ in 0..=class.chars().count() {
                            chars.next();
                        }
                    }
                    None => out.push_str(r"\["),
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');

    Regex::new(&out).map_err(|e| Error::config(format!("invalid group pattern '{pattern}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, name: &str) -> bool {
        glob_to_regex(pattern).unwrap().is_match(name)
    }

    #[test]
    fn test_glob_basics() {
        assert!(matches("Action*", "Action Movies"));
        assert!(matches("action*", "ACTION MOVIES"));
        assert!(!matches("Action*", "Best Action"));
        assert!(matches("*Drama*", "UK | Drama Series"));
        assert!(matches("HD?", "HD1"));
        assert!(!matches("HD?", "HD12"));
    }

    #[test]
    fn test_glob_classes() {
        assert!(matches("Movies [0-9]*", "Movies 4K"));
        assert!(!matches("Movies [0-9]*", "Movies HD"));
        assert!(matches("Movies [!0-9]*", "Movies HD"));
        assert!(matches("[]]x", "]x"));
    }

    #[test]
    fn test_glob_bracket_right_after_negation() {
        assert!(glob_to_regex("[!]").is_ok());
        assert!(matches("[!]", "[!]"));
        assert!(!matches("[!]", "x"));
        assert!(matches("Live [!]]*", "Live Sports"));
        assert!(!matches("Live [!]]*", "Live ]"));
        assert!(matches("[]", "[]"));
    }

    #[test]
    fn test_glob_escapes_regex_syntax() {
        assert!(matches("US | News (Live)", "US | News (Live)"));
        assert!(!matches("a.b", "axb"));
        assert!(matches("open[", "open["));
        assert!(matches("24/7 *", "24/7 Cartoons"));
    }

    #[test]
    fn test_partition_first_category_wins() {
        let config = GroupsConfig {
            process_movies_groups: true,
            process_tv_series_groups: true,
            process_24_7_groups: true,
            movies_groups: vec!["Action*".into(), "*".into()],
            tv_series_groups: vec!["*Series".into()],
            groups_24_7: vec!["24/7*".into()],
        };
        let matcher = GroupMatcher::new(&config).unwrap();
        let plan = matcher.partition(["Action Movies", "Drama Series", "24/7 Series", "Other"]);

        assert_eq!(plan.always_on, vec!["24/7 Series"]);
        assert_eq!(plan.tv, vec!["Drama Series"]);
        assert_eq!(plan.movies, vec!["Action Movies", "Other"]);
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn test_disabled_category_is_ignored() {
        let config = GroupsConfig {
            process_movies_groups: false,
            process_tv_series_groups: true,
            process_24_7_groups: false,
            movies_groups: vec!["*".into()],
            tv_series_groups: vec!["Kids*".into()],
            groups_24_7: vec!["*".into()],
        };
        let matcher = GroupMatcher::new(&config).unwrap();
        assert_eq!(matcher.classify("Kids Shows"), Some(MediaCategory::Episode));
        assert_eq!(matcher.classify("Action Movies"), None);
        assert!(matcher.partition(["Action Movies"]).is_empty());
    }
}
