//! Data structures and types for subplay
//!
//! Contains the shared models of the subtitle synchronization core:
//! - **Preferences**: the persisted subtitle preference
//! - **Subtitle info**: candidates offered by a provider, including the
//!   disabled and custom selections
//! - **Matching**: picking the best remote file for the playing media
//! - **Subtitles**: downloaded and parsed cues
//! - **Playback**: play requests as published on the event bus

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::stream::SubtitleError;

static QUALITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{3,4})p").expect("valid quality pattern"));

static NORMALIZE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\]()_\-.\s]").expect("valid normalize pattern"));

/// Parse a resolution such as `720` out of a label like "720p" or "Show.1080p.WEB"
pub fn parse_quality(label: &str) -> Option<u32> {
    QUALITY_REGEX
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// =============================================================================
// Preference Models
// =============================================================================

/// Persisted subtitle preference
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "language", rename_all = "lowercase")]
pub enum SubtitlePreference {
    /// Subtitles are turned off
    #[default]
    Disabled,
    /// Prefer subtitles in the given language code
    Language(String),
}

impl fmt::Display for SubtitlePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtitlePreference::Disabled => write!(f, "disabled"),
            SubtitlePreference::Language(code) => write!(f, "preferred language {}", code),
        }
    }
}

// =============================================================================
// Subtitle Info Models
// =============================================================================

/// A remote (or local) subtitle file belonging to a [`SubtitleInfo`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleFile {
    pub file_id: String,
    pub name: String,
    /// Download url, or a filesystem path for custom files
    pub url: String,
    pub score: f32,
    pub downloads: u32,
    /// Resolution parsed from the file name, e.g. `720`
    pub quality: Option<u32>,
}

impl SubtitleFile {
    /// Create a new subtitle file, parsing the quality from its name
    pub fn new(
        file_id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        score: f32,
        downloads: u32,
    ) -> Self {
        let name = name.into();
        let quality = parse_quality(&name);

        Self {
            file_id: file_id.into(),
            name,
            url: url.into(),
            score,
            downloads,
            quality,
        }
    }

    /// Create a file pointing at a subtitle on the local filesystem
    pub fn local(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::new(name.clone(), name, path.to_string_lossy(), 0.0, 0)
    }

    /// Path on disk when this file isn't served over http
    pub fn local_path(&self) -> Option<PathBuf> {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            None
        } else if let Some(path) = self.url.strip_prefix("file://") {
            Some(PathBuf::from(path))
        } else {
            Some(PathBuf::from(&self.url))
        }
    }

    /// Ordering used to pick the best candidate (best first)
    ///
    /// More downloads win, then files with a known quality, then the higher score.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .downloads
            .cmp(&self.downloads)
            .then_with(|| match (self.quality, other.quality) {
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                _ => Ordering::Equal,
            })
            .then_with(|| {
                other
                    .score
                    .partial_cmp(&self.score)
                    .unwrap_or(Ordering::Equal)
            })
    }
}

/// Identifies a subtitle candidate
///
/// `None` and `Custom` replace the sentinel values a provider would otherwise
/// hand out for "no subtitle" and "let the user pick a file".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SubtitleInfo {
    /// Subtitles explicitly disabled
    None,
    /// User supplied subtitle, fileless until the user picked one
    Custom { files: Vec<SubtitleFile> },
    /// A provider subtitle in a specific language
    Language {
        imdb_id: Option<String>,
        language: String,
        files: Vec<SubtitleFile>,
    },
}

impl SubtitleInfo {
    pub fn none() -> Self {
        SubtitleInfo::None
    }

    pub fn custom() -> Self {
        SubtitleInfo::Custom { files: Vec::new() }
    }

    /// Custom subtitle backed by a file the user picked
    pub fn custom_file(path: impl AsRef<Path>) -> Self {
        SubtitleInfo::Custom {
            files: vec![SubtitleFile::local(path)],
        }
    }

    pub fn new(imdb_id: Option<String>, language: impl Into<String>) -> Self {
        SubtitleInfo::Language {
            imdb_id,
            language: language.into(),
            files: Vec::new(),
        }
    }

    pub fn with_files(
        imdb_id: Option<String>,
        language: impl Into<String>,
        files: Vec<SubtitleFile>,
    ) -> Self {
        SubtitleInfo::Language {
            imdb_id,
            language: language.into(),
            files,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SubtitleInfo::None)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, SubtitleInfo::Custom { .. })
    }

    /// Custom selection without a file yet; the user has to pick one
    pub fn needs_pick(&self) -> bool {
        matches!(self, SubtitleInfo::Custom { files } if files.is_empty())
    }

    /// Language code for provider subtitles
    pub fn language(&self) -> Option<&str> {
        match self {
            SubtitleInfo::Language { language, .. } => Some(language),
            _ => None,
        }
    }

    pub fn imdb_id(&self) -> Option<&str> {
        match self {
            SubtitleInfo::Language { imdb_id, .. } => imdb_id.as_deref(),
            _ => None,
        }
    }

    pub fn files(&self) -> &[SubtitleFile] {
        match self {
            SubtitleInfo::None => &[],
            SubtitleInfo::Custom { files } | SubtitleInfo::Language { files, .. } => {
                files.as_slice()
            }
        }
    }

    /// Retrieve the file that best matches the playing media
    ///
    /// A file with the same normalized name as the media wins. Otherwise the
    /// best ranked file with the matcher's quality (or an unknown quality), and
    /// finally the best ranked file overall.
    pub fn best_matching_file(
        &self,
        matcher: &SubtitleMatcher,
    ) -> Result<&SubtitleFile, SubtitleError> {
        let files = self.files();
        if files.is_empty() {
            return Err(SubtitleError::NoFilesFound);
        }

        if let Some(name) = matcher.name() {
            let wanted = normalize_name(name);
            let by_name = files
                .iter()
                .filter(|f| normalize_name(strip_subtitle_extension(&f.name)) == wanted)
                .min_by(|a, b| a.rank_cmp(b));
            if let Some(file) = by_name {
                return Ok(file);
            }
        }

        if let Some(quality) = matcher.quality_value() {
            let by_quality = files
                .iter()
                .filter(|f| f.quality.map_or(true, |q| q == quality))
                .min_by(|a, b| a.rank_cmp(b));
            if let Some(file) = by_quality {
                return Ok(file);
            }
        }

        files
            .iter()
            .min_by(|a, b| a.rank_cmp(b))
            .ok_or(SubtitleError::NoFilesFound)
    }
}

impl fmt::Display for SubtitleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtitleInfo::None => write!(f, "none"),
            SubtitleInfo::Custom { files } => write!(f, "custom ({} files)", files.len()),
            SubtitleInfo::Language {
                imdb_id,
                language,
                files,
            } => write!(
                f,
                "{} [{}] ({} files)",
                language,
                imdb_id.as_deref().unwrap_or("-"),
                files.len()
            ),
        }
    }
}

/// Media to list subtitles for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaContext {
    Movie { imdb_id: String },
    Episode {
        imdb_id: String,
        season: u16,
        episode: u16,
    },
}

impl MediaContext {
    pub fn imdb_id(&self) -> &str {
        match self {
            MediaContext::Movie { imdb_id } | MediaContext::Episode { imdb_id, .. } => imdb_id,
        }
    }
}

// =============================================================================
// Matcher
// =============================================================================

/// Filename and quality of the playing media, used to pick a subtitle file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubtitleMatcher {
    name: Option<String>,
    quality: Option<String>,
}

impl SubtitleMatcher {
    pub fn new(name: Option<String>, quality: Option<String>) -> Self {
        Self { name, quality }
    }

    /// Build a matcher from the playback url and quality label
    pub fn from_playback(url: Option<&str>, quality: Option<&str>) -> Self {
        Self {
            name: url.map(media_basename).filter(|n| !n.is_empty()),
            quality: quality.map(str::to_string),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn quality(&self) -> Option<&str> {
        self.quality.as_deref()
    }

    pub fn quality_value(&self) -> Option<u32> {
        self.quality.as_deref().and_then(parse_quality)
    }
}

/// File name of a url or path without its directory and extension
///
/// `http://host/show.s01e01.mkv?x=1` becomes `show.s01e01`.
pub fn media_basename(url: &str) -> String {
    let path = if url.contains("://") {
        url.split(['?', '#']).next().unwrap_or(url)
    } else {
        url
    };
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let file = urlencoding::decode(file)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| file.to_string());

    strip_extension(&file).to_string()
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Release names contain dots, only a known subtitle extension is removed
fn strip_subtitle_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && SubFormat::from_extension(ext).is_some() => stem,
        _ => name,
    }
}

fn normalize_name(name: &str) -> String {
    NORMALIZE_REGEX.replace_all(&name.to_lowercase(), "").into_owned()
}

// =============================================================================
// Subtitle Models
// =============================================================================

/// Subtitle file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SubFormat {
    #[default]
    Srt,
    WebVtt,
    Sub,
    Ass,
}

impl SubFormat {
    /// Detect the format from a file extension, `None` when unknown
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "srt" => Some(SubFormat::Srt),
            "vtt" | "webvtt" => Some(SubFormat::WebVtt),
            "sub" => Some(SubFormat::Sub),
            "ass" | "ssa" => Some(SubFormat::Ass),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SubFormat::Srt => "srt",
            SubFormat::WebVtt => "vtt",
            SubFormat::Sub => "sub",
            SubFormat::Ass => "ass",
        }
    }
}

impl fmt::Display for SubFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubFormat::Srt => write!(f, "SRT"),
            SubFormat::WebVtt => write!(f, "WebVTT"),
            SubFormat::Sub => write!(f, "SUB"),
            SubFormat::Ass => write!(f, "ASS"),
        }
    }
}

/// A run of text sharing one style
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StyledText {
    pub text: String,
    pub italic: bool,
    pub bold: bool,
    pub underline: bool,
}

impl StyledText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// One rendered line of a cue
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubtitleLine {
    pub texts: Vec<StyledText>,
}

impl SubtitleLine {
    /// The line without styling
    pub fn text(&self) -> String {
        self.texts.iter().map(|t| t.text.as_str()).collect()
    }
}

/// A timed subtitle entry, times in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub id: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub lines: Vec<SubtitleLine>,
}

/// A downloaded and parsed subtitle
#[derive(Debug, Clone, PartialEq)]
pub struct Subtitle {
    file: PathBuf,
    info: Option<SubtitleInfo>,
    cues: Vec<SubtitleCue>,
}

impl Subtitle {
    pub fn new(file: impl Into<PathBuf>, info: Option<SubtitleInfo>, cues: Vec<SubtitleCue>) -> Self {
        Self {
            file: file.into(),
            info,
            cues,
        }
    }

    /// Path of the subtitle file on disk
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn info(&self) -> Option<&SubtitleInfo> {
        self.info.as_ref()
    }

    pub fn cues(&self) -> &[SubtitleCue] {
        &self.cues
    }
}

impl fmt::Display for Subtitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} cues)",
            self.file.display(),
            self.cues.len()
        )
    }
}

// =============================================================================
// Playback Models
// =============================================================================

/// A request to start playback, as carried by `PlaybackStarted`
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    pub url: String,
    /// Quality label of the stream, e.g. "720p"
    pub quality: Option<String>,
    /// `false` when the caller disabled subtitles for this playback
    pub subtitles_enabled: bool,
    /// Subtitle explicitly chosen for this playback
    pub subtitle: Option<SubtitleInfo>,
    /// Subtitles available for the media
    pub available_subtitles: Vec<SubtitleInfo>,
}

impl PlayRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality: None,
            subtitles_enabled: true,
            subtitle: None,
            available_subtitles: Vec::new(),
        }
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn with_subtitle(mut self, subtitle: SubtitleInfo) -> Self {
        self.subtitle = Some(subtitle);
        self
    }

    pub fn with_available_subtitles(mut self, subtitles: Vec<SubtitleInfo>) -> Self {
        self.available_subtitles = subtitles;
        self
    }

    pub fn without_subtitles(mut self) -> Self {
        self.subtitles_enabled = false;
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
