//! Stremio Subtitle Client
//!
//! Free subtitle listing using Stremio's public addon endpoint.
//! No API key required - uses Stremio's OpenSubtitles v3 addon.
//!
//! Downloads are cached in the configured subtitle directory and parsed into
//! cues. Custom subtitles picked by the user are parsed in place.

use crate::models::{
    MediaContext, SubFormat, Subtitle, SubtitleFile, SubtitleInfo, SubtitleMatcher,
};
use crate::stream::srt;
use async_trait::async_trait;
use log::{debug, trace};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://opensubtitles-v3.strem.io";

/// Errors from listing, downloading or parsing subtitles
#[derive(Debug, Error)]
pub enum SubtitleError {
    #[error("No subtitle files available")]
    NoFilesFound,
    #[error("Subtitle request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Subtitle server returned {0}")]
    Status(reqwest::StatusCode),
    #[error("Subtitle file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse subtitle at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Unsupported subtitle format: {0}")]
    UnsupportedFormat(String),
}

/// Source of subtitles for the playback core
#[async_trait]
pub trait SubtitleProvider: Send + Sync {
    /// List the subtitles available for the given media
    async fn list_available(&self, media: &MediaContext)
        -> Result<Vec<SubtitleInfo>, SubtitleError>;

    /// Download the best matching file of `info` and parse it
    async fn download_and_parse(
        &self,
        info: &SubtitleInfo,
        matcher: &SubtitleMatcher,
    ) -> Result<Subtitle, SubtitleError>;
}

/// Subtitle client using Stremio's free public endpoint
pub struct SubtitleClient {
    base_url: String,
    client: reqwest::Client,
    cache_dir: PathBuf,
}

/// Stremio subtitle response
#[derive(Debug, Deserialize)]
struct StremioResponse {
    subtitles: Vec<StremioSubtitle>,
}

/// Single subtitle from Stremio
#[derive(Debug, Deserialize)]
struct StremioSubtitle {
    id: String,
    url: String,
    lang: String,
}

impl SubtitleClient {
    /// Create a new subtitle client caching downloads in `cache_dir`
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, cache_dir)
    }

    /// Create with custom base URL (for testing)
    pub fn with_base_url(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Default cache location (~/.cache/subplay/subtitles)
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("subplay")
            .join("subtitles")
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Remove all cached subtitle files
    pub async fn cleanup(&self) -> Result<(), SubtitleError> {
        if tokio::fs::try_exists(&self.cache_dir).await? {
            debug!("Cleaning subtitle directory {}", self.cache_dir.display());
            tokio::fs::remove_dir_all(&self.cache_dir).await?;
        }
        Ok(())
    }

    fn listing_url(&self, media: &MediaContext) -> String {
        let imdb = normalize_imdb_id(media.imdb_id());
        match media {
            MediaContext::Movie { .. } => {
                format!("{}/subtitles/movie/{}.json", self.base_url, imdb)
            }
            MediaContext::Episode {
                season, episode, ..
            } => format!(
                "{}/subtitles/series/{}:{}:{}.json",
                self.base_url, imdb, season, episode
            ),
        }
    }

    /// Get the cache path for a remote subtitle file
    fn cache_path(&self, info: &SubtitleInfo, file: &SubtitleFile) -> PathBuf {
        let language = info.language().unwrap_or("custom");
        let id: String = file
            .file_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        self.cache_dir.join(format!(
            "{}_{}.{}",
            language,
            id,
            SubFormat::Srt.extension()
        ))
    }

    /// Download a remote file into the cache, reusing a cached copy
    async fn download(
        &self,
        info: &SubtitleInfo,
        file: &SubtitleFile,
    ) -> Result<PathBuf, SubtitleError> {
        let cache_path = self.cache_path(info, file);
        if tokio::fs::try_exists(&cache_path).await? {
            trace!("Using cached subtitle {}", cache_path.display());
            return Ok(cache_path);
        }

        debug!("Downloading subtitle file {} from {}", file.name, file.url);
        let response = self.client.get(&file.url).send().await?;
        if !response.status().is_success() {
            return Err(SubtitleError::Status(response.status()));
        }
        let bytes = response.bytes().await?;

        if let Some(parent) = cache_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&cache_path, &bytes).await?;

        Ok(cache_path)
    }
}

#[async_trait]
impl SubtitleProvider for SubtitleClient {
    async fn list_available(
        &self,
        media: &MediaContext,
    ) -> Result<Vec<SubtitleInfo>, SubtitleError> {
        let url = self.listing_url(media);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(SubtitleError::Status(response.status()));
        }

        let api_response: StremioResponse = response.json().await?;
        let imdb_id = normalize_imdb_id(media.imdb_id());

        // group the flat file list per language
        let mut languages: BTreeMap<String, Vec<SubtitleFile>> = BTreeMap::new();
        for s in api_response.subtitles {
            let name = extract_release_from_id(&s.id);
            languages
                .entry(s.lang)
                .or_default()
                .push(SubtitleFile::new(s.id, name, s.url, 0.0, 0));
        }

        Ok(languages
            .into_iter()
            .map(|(language, files)| {
                SubtitleInfo::with_files(Some(imdb_id.clone()), language, files)
            })
            .collect())
    }

    async fn download_and_parse(
        &self,
        info: &SubtitleInfo,
        matcher: &SubtitleMatcher,
    ) -> Result<Subtitle, SubtitleError> {
        let file = info.best_matching_file(matcher)?;
        let path = match file.local_path() {
            Some(path) => path,
            None => self.download(info, file).await?,
        };

        let format = match path.extension().and_then(|e| e.to_str()) {
            None => SubFormat::Srt,
            Some(ext) => SubFormat::from_extension(ext)
                .ok_or_else(|| SubtitleError::UnsupportedFormat(ext.to_string()))?,
        };
        if format != SubFormat::Srt {
            return Err(SubtitleError::UnsupportedFormat(
                format.extension().to_string(),
            ));
        }

        let bytes = tokio::fs::read(&path).await?;
        let cues = srt::parse(&String::from_utf8_lossy(&bytes))?;
        debug!("Parsed {} cues from {}", cues.len(), path.display());

        Ok(Subtitle::new(path, Some(info.clone()), cues))
    }
}

/// Normalize IMDB ID to have "tt" prefix
fn normalize_imdb_id(imdb_id: &str) -> String {
    if imdb_id.starts_with("tt") {
        imdb_id.to_string()
    } else {
        format!("tt{}", imdb_id)
    }
}

/// Extract release name from Stremio subtitle ID
/// Stremio IDs can be: "12345678" (numeric) or contain embedded release info
fn extract_release_from_id(id: &str) -> String {
    // pipe-separated format: "id|release_name"
    if let Some(idx) = id.find('|') {
        let release = id[idx + 1..].trim();
        if !release.is_empty() {
            return release.to_string();
        }
    }

    if id.contains('.') || (id.contains('-') && !id.chars().all(|c| c.is_ascii_digit() || c == '-'))
    {
        return id.trim().to_string();
    }

    "OpenSubtitles".to_string()
}
