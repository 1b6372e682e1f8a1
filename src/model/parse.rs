//! Stream name parsing.
//!
//! Upstream names are free text such as `"Some Film (2019)"` or
//! `"Show Name S01E02"`. [`NameParser`] turns them into a
//! [`ClassifiedItem`] for the category the group was matched against, or
//! drops them when the name doesn't fit.

use std::sync::LazyLock;

use regex::Regex;

use super::{ClassifiedItem, MediaCategory, StreamItem};
use crate::config::LibraryConfig;
use crate::error::{Error, Result};

/// Default episode pattern: `<show> SxxEyy`.
pub const DEFAULT_EPISODE_PATTERN: &str =
    r"^(?P<show>.+?)[\s._-]*[Ss](?P<season>\d{1,2})[\s._-]*[Ee](?P<episode>\d{1,3})";

/// Default movie pattern: `<title> (yyyy)` or `<title> [yyyy]`. A bare
/// trailing number stays part of the title ("Blade Runner 2049").
pub const DEFAULT_MOVIE_YEAR_PATTERN: &str =
    r"^\s*(?P<title>.+?)[\s._-]*(?:\((?P<year>\d{4})\)|\[(?P<byear>\d{4})\])\s*$";

static ALWAYS_ON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b24[/-]7\b[\s\-:]*")
        .unwrap_or_else(|e| panic!("24/7 pattern is invalid: {e}"))
});

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Parses raw stream names into classified items.
#[derive(Debug, Clone)]
pub struct NameParser {
    remove_strings: Vec<String>,
    episode_re: Regex,
    movie_re: Regex,
}

impl NameParser {
    /// Build a parser from library settings.
    ///
    /// Fails when a configured pattern doesn't compile.
    pub fn new(config: &LibraryConfig) -> Result<Self> {
        Ok(Self {
            remove_strings: config.remove_strings.clone(),
            episode_re: compile("tv_series_episode_regex", &config.tv_series_episode_regex)?,
            movie_re: compile("movie_year_regex", &config.movie_year_regex)?,
        })
    }

    /// Strip configured tokens and filesystem-illegal characters.
    pub fn clean_name(&self, name: &str) -> String {
        let mut cleaned = name.to_string();
        for token in self.remove_strings.iter().filter(|t| !t.is_empty()) {
            cleaned = cleaned.replace(token.as_str(), "");
        }
        cleaned.retain(|c| !ILLEGAL_CHARS.contains(&c));
        cleaned.trim().to_string()
    }

    /// Parse `item` for `category`. Returns `None` when the name doesn't
    /// fit the category (e.g. an episode without an SxxEyy tag).
    pub fn classify(&self, item: StreamItem, category: MediaCategory) -> Option<ClassifiedItem> {
        match category {
            MediaCategory::Movie => Some(self.classify_movie(item)),
            MediaCategory::Episode => self.classify_episode(item),
            MediaCategory::AlwaysOn => {
                let title = self.clean_name(&clean_always_on_title(&item.name));
                (!title.is_empty()).then(|| ClassifiedItem {
                    item,
                    category,
                    title,
                    year: None,
                    season: None,
                    episode: None,
                })
            }
        }
    }

    fn classify_movie(&self, item: StreamItem) -> ClassifiedItem {
        let parsed = self.movie_re.captures(&item.name).and_then(|caps| {
            let title = caps.name("title").or_else(|| caps.get(1))?;
            let year = ["year", "byear"]
                .iter()
                .find_map(|name| caps.name(name))
                .or_else(|| caps.get(2))
                .and_then(|m| m.as_str().parse::<i32>().ok());
            Some((self.clean_name(title.as_str()), year))
        });
        let (title, year) = match parsed {
            Some((title, year)) if !title.is_empty() => (title, year),
            _ => (self.clean_name(&item.name), None),
        };
        ClassifiedItem {
            item,
            category: MediaCategory::Movie,
            title,
            year,
            season: None,
            episode: None,
        }
    }

    fn classify_episode(&self, item: StreamItem) -> Option<ClassifiedItem> {
        let caps = self.episode_re.captures(&item.name)?;

        // Named groups first, positional as a fallback for user patterns.
        let group = |name: &str, idx: usize| {
            caps.name(name)
                .or_else(|| caps.get(idx))
                .map(|m| m.as_str().to_string())
        };
        let show = self.clean_name(&group("show", 1)?);
        let season = group("season", 2)?.parse::<u32>().ok()?;
        let episode = group("episode", 3)?.parse::<u32>().ok()?;

        if show.is_empty() {
            return None;
        }

        Some(ClassifiedItem {
            item,
            category: MediaCategory::Episode,
            title: show,
            year: None,
            season: Some(season),
            episode: Some(episode),
        })
    }
}

fn compile(setting: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::config(format!("invalid {setting} {pattern:?}: {e}")))
}

/// Remove the `24/7` marker from a channel name.
pub fn clean_always_on_title(name: &str) -> String {
    ALWAYS_ON_RE.replace_all(name, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> NameParser {
        NameParser::new(&LibraryConfig {
            remove_strings: vec!["EN - ".to_string()],
            ..LibraryConfig::default()
        })
        .unwrap()
    }

    fn stream(name: &str) -> StreamItem {
        StreamItem {
            id: 1,
            name: name.to_string(),
            url: "http://x/1.ts".to_string(),
            stream_hash: String::new(),
            updated_at: None,
            group: "Group".to_string(),
        }
    }

    #[test]
    fn test_movie_title_and_year() {
        let item = parser()
            .classify(stream("Some Film (2019)"), MediaCategory::Movie)
            .unwrap();
        assert_eq!(item.title, "Some Film");
        assert_eq!(item.year, Some(2019));
    }

    #[test]
    fn test_movie_year_variants() {
        let p = parser();
        for name in ["Some Film [2019]", "Some Film(2019)", "EN - Some Film (2019)"] {
            let item = p.classify(stream(name), MediaCategory::Movie).unwrap();
            assert_eq!(item.year, Some(2019), "{name}");
            assert_eq!(item.title, "Some Film", "{name}");
        }
    }

    #[test]
    fn test_trailing_number_stays_in_title() {
        let p = parser();
        for name in ["Blade Runner 2049", "Class of 1999"] {
            let item = p.classify(stream(name), MediaCategory::Movie).unwrap();
            assert_eq!(item.title, name);
            assert_eq!(item.year, None);
        }
        let item = p
            .classify(stream("Blade Runner 2049 (2017)"), MediaCategory::Movie)
            .unwrap();
        assert_eq!((item.title.as_str(), item.year), ("Blade Runner 2049", Some(2017)));
    }

    #[test]
    fn test_custom_movie_pattern() {
        let p = NameParser::new(&LibraryConfig {
            movie_year_regex: r"^(?P<title>.+?)\.(?P<year>\d{4})$".to_string(),
            ..LibraryConfig::default()
        })
        .unwrap();
        let item = p.classify(stream("Some.Film.2019"), MediaCategory::Movie).unwrap();
        assert_eq!((item.title.as_str(), item.year), ("Some.Film", Some(2019)));
    }

    #[test]
    fn test_movie_without_year_keeps_title() {
        let item = parser()
            .classify(stream("Untitled: Director's Cut"), MediaCategory::Movie)
            .unwrap();
        assert_eq!(item.title, "Untitled Director's Cut");
        assert_eq!(item.year, None);
    }

    #[test]
    fn test_episode_tag() {
        let item = parser()
            .classify(stream("Show Name S01E02"), MediaCategory::Episode)
            .unwrap();
        assert_eq!(item.title, "Show Name");
        assert_eq!(item.season, Some(1));
        assert_eq!(item.episode, Some(2));
    }

    #[test]
    fn test_episode_without_tag_is_dropped() {
        assert!(
            parser()
                .classify(stream("Show Name Pilot"), MediaCategory::Episode)
                .is_none()
        );
    }

    #[test]
    fn test_positional_episode_pattern() {
        let p = NameParser::new(&LibraryConfig {
            tv_series_episode_regex: r"^(.+?) (\d+)x(\d+)".to_string(),
            ..LibraryConfig::default()
        })
        .unwrap();
        let item = p.classify(stream("Show 3x04"), MediaCategory::Episode).unwrap();
        assert_eq!((item.season, item.episode), (Some(3), Some(4)));
    }

    #[test]
    fn test_invalid_patterns_are_config_errors() {
        let result = NameParser::new(&LibraryConfig {
            tv_series_episode_regex: "(unclosed".to_string(),
            ..LibraryConfig::default()
        });
        assert!(matches!(result, Err(Error::Config(_))));

        let result = NameParser::new(&LibraryConfig {
            movie_year_regex: "[".to_string(),
            ..LibraryConfig::default()
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_always_on_marker_removed() {
        assert_eq!(clean_always_on_title("24/7 Classic Sitcoms"), "Classic Sitcoms");
        assert_eq!(clean_always_on_title("24-7: Cartoons"), "Cartoons");
        let item = parser()
            .classify(stream("24/7 Nature"), MediaCategory::AlwaysOn)
            .unwrap();
        assert_eq!(item.title, "Nature");
    }

    #[test]
    fn test_clean_name_strips_illegal_chars() {
        assert_eq!(parser().clean_name(" A/B: C? "), "AB C");
    }
}
