//! Subtitle preference resolution for play requests

use crate::models::{PlayRequest, SubtitleInfo, SubtitlePreference};

/// Determine the subtitle to use for a play request
///
/// Subtitles disabled on the request or in the preference always win. An
/// explicitly selected subtitle comes next, then the preferred language
/// among the available subtitles.
pub fn resolve(request: &PlayRequest, preference: &SubtitlePreference) -> SubtitleInfo {
    if !request.subtitles_enabled {
        return SubtitleInfo::none();
    }

    let language = match preference {
        SubtitlePreference::Disabled => return SubtitleInfo::none(),
        SubtitlePreference::Language(language) => language,
    };

    if let Some(subtitle) = &request.subtitle {
        return subtitle.clone();
    }

    select_language(&request.available_subtitles, language)
}

/// Subtitle with exactly the given language, or `None`
pub fn select_language(available: &[SubtitleInfo], language: &str) -> SubtitleInfo {
    available
        .iter()
        .find(|s| s.language() == Some(language))
        .cloned()
        .unwrap_or(SubtitleInfo::None)
}
