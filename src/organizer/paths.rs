//! On-disk layout of the generated library.
//!
//! ```text
//! <root>/Movies/<group>/<title> (<year>)/<title>.strm | .nfo | poster.jpg | fanart.jpg
//! <root>/TV Shows/<group>/<show>/<show>.nfo | poster.jpg | fanart.jpg
//! <root>/TV Shows/<group>/<show>/Season NN/<show> - SNNEMM.strm | .nfo | .jpg
//!                                          /Season NN.tbn
//! <root>/24-7/<group>/<title>.strm | .nfo
//! ```
//!
//! Everything here is a pure function of its inputs. Nothing touches the
//! filesystem; directories are created by the writer right before a write.

use std::path::{Path, PathBuf};

use crate::model::{ClassifiedItem, MediaCategory};

/// Everything a path depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaKey {
    Movie {
        group: String,
        title: String,
        year: Option<i32>,
    },
    Episode {
        group: String,
        show: String,
        season: u32,
        episode: u32,
    },
    AlwaysOn {
        group: String,
        title: String,
    },
}

impl MediaKey {
    /// Key for a classified item, with `year` overriding the parsed one
    /// (metadata may supply a year the name lacked).
    pub fn for_item(item: &ClassifiedItem, year: Option<i32>) -> Self {
        let group = item.group().to_string();
        match item.category {
            MediaCategory::Movie => Self::Movie {
                group,
                title: item.title.clone(),
                year: year.or(item.year),
            },
            MediaCategory::Episode => Self::Episode {
                group,
                show: item.title.clone(),
                season: item.season.unwrap_or_default(),
                episode: item.episode.unwrap_or_default(),
            },
            MediaCategory::AlwaysOn => Self::AlwaysOn {
                group,
                title: item.title.clone(),
            },
        }
    }

    /// Whether the item's base folder belongs to it alone, so removing the
    /// folder can't take other items with it.
    pub fn owns_folder(&self) -> bool {
        matches!(self, Self::Movie { .. })
    }

    pub fn category(&self) -> MediaCategory {
        match self {
            Self::Movie { .. } => MediaCategory::Movie,
            Self::Episode { .. } => MediaCategory::Episode,
            Self::AlwaysOn { .. } => MediaCategory::AlwaysOn,
        }
    }
}

/// Paths for one materialized item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedPaths {
    /// Folder holding the item's files. For always-on items this is the
    /// group folder, shared with other channels.
    pub base_folder: PathBuf,
    /// `.strm` pointer file
    pub pointer: PathBuf,
    /// `.nfo` sidecar
    pub sidecar: PathBuf,
    /// Poster for movies, episode still for episodes
    pub poster: Option<PathBuf>,
    /// Fanart for movies, season poster (`.tbn`) for episodes
    pub backdrop: Option<PathBuf>,
}

/// Show-level paths, shared by every episode of a show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowPaths {
    pub folder: PathBuf,
    pub sidecar: PathBuf,
    pub poster: PathBuf,
    pub backdrop: PathBuf,
}

pub fn compute_paths(root: &Path, key: &MediaKey) -> MaterializedPaths {
    match key {
        MediaKey::Movie { group, title, year } => {
            let title = sanitize(title);
            let folder_name = match year {
                Some(year) => format!("{title} ({year})"),
                None => title.clone(),
            };
            let base = category_root(root, MediaCategory::Movie)
                .join(sanitize(group))
                .join(folder_name);
            MaterializedPaths {
                pointer: base.join(format!("{title}.strm")),
                sidecar: base.join(format!("{title}.nfo")),
                poster: Some(base.join("poster.jpg")),
                backdrop: Some(base.join("fanart.jpg")),
                base_folder: base,
            }
        }
        MediaKey::Episode {
            group,
            show,
            season,
            episode,
        } => {
            let show_folder = show_paths(root, group, show).folder;
            let base = show_folder.join(season_folder_name(*season));
            let stem = format!("{} - S{season:02}E{episode:02}", sanitize(show));
            MaterializedPaths {
                pointer: base.join(format!("{stem}.strm")),
                sidecar: base.join(format!("{stem}.nfo")),
                poster: Some(base.join(format!("{stem}.jpg"))),
                backdrop: Some(base.join(format!("{}.tbn", season_folder_name(*season)))),
                base_folder: base,
            }
        }
        MediaKey::AlwaysOn { group, title } => {
            let title = sanitize(title);
            let base = category_root(root, MediaCategory::AlwaysOn).join(sanitize(group));
            MaterializedPaths {
                pointer: base.join(format!("{title}.strm")),
                sidecar: base.join(format!("{title}.nfo")),
                poster: None,
                backdrop: None,
                base_folder: base,
            }
        }
    }
}

pub fn show_paths(root: &Path, group: &str, show: &str) -> ShowPaths {
    let show = sanitize(show);
    let folder = category_root(root, MediaCategory::Episode)
        .join(sanitize(group))
        .join(&show);
    ShowPaths {
        sidecar: folder.join(format!("{show}.nfo")),
        poster: folder.join("poster.jpg"),
        backdrop: folder.join("fanart.jpg"),
        folder,
    }
}

fn category_root(root: &Path, category: MediaCategory) -> PathBuf {
    root.join(category.folder_name())
}

fn season_folder_name(season: u32) -> String {
    format!("Season {season:02}")
}

/// Make a name safe as a single path component.
///
/// Replaces separators and characters Windows rejects, trims trailing dots
/// and spaces, and maps empty or relative names to `_`.
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect();
    let trimmed = replaced.trim().trim_end_matches(['.', ' ']);
    match trimmed {
        "" | "." | ".." => "_".to_string(),
        other => other.to_string(),
    }
}
