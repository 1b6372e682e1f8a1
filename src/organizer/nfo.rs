//! NFO sidecar rendering.
//!
//! Kodi/Jellyfin-style XML documents, one schema per record kind:
//! `<movie>`, `<tvshow>` and `<episodedetails>`. Output is deterministic
//! for a given record so unchanged metadata renders byte-identical
//! sidecars, which is what lets the writer skip rewrites.

use std::fmt::Display;

use crate::enrichment::{MetadataRecord, RecordKind};

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Render the sidecar appropriate for `record.kind`. Seasons have no
/// sidecar of their own and render as a show.
pub fn render(record: &MetadataRecord) -> String {
    match record.kind {
        RecordKind::Movie => render_movie(record),
        RecordKind::Show | RecordKind::Season => render_show(record),
        RecordKind::Episode => render_episode(record),
    }
}

pub fn render_movie(movie: &MetadataRecord) -> String {
    let mut doc = Document::new("movie");
    doc.field("title", &movie.title)
        .field(
            "originaltitle",
            movie.original_title.as_deref().unwrap_or(&movie.title),
        )
        .field("sorttitle", &movie.title)
        .optional("year", movie.year())
        .optional("releasedate", movie.release_date.as_deref())
        .field("plot", &movie.overview)
        .optional("runtime", movie.runtime)
        .field("rating", format!("{:.1}", movie.vote_average))
        .field("votes", movie.vote_count)
        .field("tmdbid", movie.id)
        .uniqueid(movie.id)
        .each("genre", &movie.genres)
        .each("studio", &movie.studios)
        .each("country", &movie.countries)
        .optional("status", movie.status.as_deref());
    doc.finish()
}

pub fn render_show(show: &MetadataRecord) -> String {
    let mut doc = Document::new("tvshow");
    doc.field("title", &show.title)
        .field(
            "originaltitle",
            show.original_title.as_deref().unwrap_or(&show.title),
        )
        .field("plot", &show.overview)
        .field("tmdbid", show.id)
        .uniqueid(show.id)
        .optional("year", show.year())
        .optional("premiered", show.release_date.as_deref())
        .field("rating", format!("{:.1}", show.vote_average))
        .field("votes", show.vote_count)
        .each("genre", &show.genres)
        .optional("status", show.status.as_deref())
        .each("studio", &show.studios);
    doc.finish()
}

pub fn render_episode(episode: &MetadataRecord) -> String {
    let mut doc = Document::new("episodedetails");
    doc.field("title", &episode.title)
        .optional("season", episode.season_number)
        .optional("episode", episode.episode_number)
        .field("plot", &episode.overview)
        .optional("aired", episode.release_date.as_deref())
        .field("rating", format!("{:.1}", episode.vote_average))
        .field("votes", episode.vote_count)
        .field("tmdbid", episode.id)
        .uniqueid(episode.id);
    doc.finish()
}

/// Minimal XML builder: one root element with flat children.
struct Document {
    root: &'static str,
    out: String,
}

impl Document {
    fn new(root: &'static str) -> Self {
        let mut out = String::with_capacity(1024);
        out.push_str(XML_HEADER);
        out.push('\n');
        out.push('<');
        out.push_str(root);
        out.push_str(">\n");
        Self { root, out }
    }

    fn field(&mut self, tag: &str, value: impl Display) -> &mut Self {
        let value = value.to_string();
        self.out.push_str("  <");
        self.out.push_str(tag);
        self.out.push('>');
        self.out.push_str(&escape(&value));
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push_str(">\n");
        self
    }

    fn optional<T: Display>(&mut self, tag: &str, value: Option<T>) -> &mut Self {
        match value {
            Some(v) => self.field(tag, v),
            None => self,
        }
    }

    fn each(&mut self, tag: &str, values: &[String]) -> &mut Self {
        for value in values.iter().filter(|v| !v.is_empty()) {
            self.field(tag, value);
        }
        self
    }

    fn uniqueid(&mut self, id: i64) -> &mut Self {
        self.out.push_str(&format!(
            "  <uniqueid type=\"tmdb\" default=\"true\">{id}</uniqueid>\n"
        ));
        self
    }

    fn finish(&mut self) -> String {
        self.out.push_str("</");
        self.out.push_str(self.root);
        self.out.push_str(">\n");
        std::mem::take(&mut self.out)
    }
}

/// Escape the five XML special characters and drop control characters
/// that XML 1.0 forbids.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
