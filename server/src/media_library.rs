// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use glob::{Pattern, glob};
use log::{info, warn};
use serde::Serialize;

use gs_elements::sync_error::SyncError;

pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mkv", "mov"];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VideoFile {
    pub name: String,
    // Megabytes, rounded to two decimal places.
    pub size: f64,
    pub modified: Option<String>,
}

// Recorded video files in the media directory.
pub struct MediaLibrary {
    media_dir: PathBuf,
}

impl MediaLibrary {
    pub fn new(media_dir: impl AsRef<Path>) -> Self {
        MediaLibrary{media_dir: media_dir.as_ref().to_path_buf()}
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    // Video files sorted by name. A missing media directory has no files.
    pub fn list_videos(&self) -> Vec<VideoFile> {
        let pattern = format!(
            "{}/*", Pattern::escape(&self.media_dir.to_string_lossy()));
        let entries = match glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Bad media glob pattern {:?}: {:?}", pattern, e);
                return Vec::new();
            }
        };
        let mut videos = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Error listing {:?}: {:?}", self.media_dir, e);
                    continue;
                }
            };
            if !is_video_file(&path) {
                continue;
            }
            let metadata = match fs::metadata(&path) {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let modified = metadata.modified().ok()
                .map(|t| DateTime::<Local>::from(t).to_rfc3339());
            videos.push(VideoFile{
                name: path.file_name().unwrap_or_default().to_string_lossy().into_owned(),
                size: size_in_mb(metadata.len()),
                modified,
            });
        }
        videos.sort_by(|a, b| a.name.cmp(&b.name));
        videos
    }

    // `name` must be a bare file name within the media directory.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, SyncError> {
        if name.is_empty() || name == "." || name == ".." ||
            name.contains('/') || name.contains('\\')
        {
            return Err(SyncError::InvalidArgument(
                format!("Invalid file name {:?}", name)));
        }
        Ok(self.media_dir.join(name))
    }

    pub fn delete(&self, name: &str) -> Result<(), SyncError> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted {:?}", path);
                Ok(())
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(SyncError::NotFound(name.to_string()))
            },
            Err(e) => Err(SyncError::io(&path, e)),
        }
    }
}

fn is_video_file(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        },
        None => false,
    }
}

fn size_in_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}
