//! SRT subtitle parser
//!
//! Turns SubRip content into cues with styled lines. Only the `<i>`, `<b>`
//! and `<u>` tags carry style; other tags such as `<font>` are dropped.

use crate::models::{StyledText, SubtitleCue, SubtitleLine};
use crate::stream::SubtitleError;
use regex::Regex;
use std::sync::LazyLock;

static TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})",
    )
    .expect("valid srt time pattern")
});

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([a-zA-Z]+)[^>]*>").expect("valid srt tag pattern"));

/// Parse SRT content into cues
pub fn parse(content: &str) -> Result<Vec<SubtitleCue>, SubtitleError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut cues = Vec::new();
    let mut block: Vec<(usize, &str)> = Vec::new();

    // `lines()` also strips the \r of CRLF endings
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            if !block.is_empty() {
                cues.push(parse_block(&block, cues.len())?);
                block.clear();
            }
        } else {
            block.push((index + 1, line));
        }
    }
    if !block.is_empty() {
        cues.push(parse_block(&block, cues.len())?);
    }

    Ok(cues)
}

fn parse_block(block: &[(usize, &str)], index: usize) -> Result<SubtitleCue, SubtitleError> {
    let mut lines = block.iter().peekable();

    // the numeric identifier is optional in the wild
    let id = match lines.peek() {
        Some((_, line)) if !line.contains("-->") => {
            let id = line.trim().to_string();
            lines.next();
            id
        }
        _ => (index + 1).to_string(),
    };

    let (line_number, time_line) = lines.next().copied().ok_or_else(|| SubtitleError::Parse {
        line: block[0].0,
        message: "missing cue timing".to_string(),
    })?;
    let (start_ms, end_ms) = parse_timing(time_line).ok_or_else(|| SubtitleError::Parse {
        line: line_number,
        message: format!("invalid cue timing \"{}\"", time_line.trim()),
    })?;

    Ok(SubtitleCue {
        id,
        start_ms,
        end_ms,
        lines: lines.map(|(_, text)| parse_line_style(text)).collect(),
    })
}

fn parse_timing(line: &str) -> Option<(u64, u64)> {
    let captures = TIME_REGEX.captures(line.trim())?;
    let value = |idx: usize| -> Option<u64> { captures.get(idx)?.as_str().parse().ok() };

    let start = value(1)? * 3_600_000 + value(2)? * 60_000 + value(3)? * 1_000 + value(4)?;
    let end = value(5)? * 3_600_000 + value(6)? * 60_000 + value(7)? * 1_000 + value(8)?;
    Some((start, end))
}

/// Split a text line into styled runs
pub fn parse_line_style(line: &str) -> SubtitleLine {
    let mut texts = Vec::new();
    let mut style = StyledText::default();
    let mut last = 0;

    for captures in TAG_REGEX.captures_iter(line) {
        let Some(tag) = captures.get(0) else {
            continue;
        };
        push_text(&mut texts, &style, &line[last..tag.start()]);
        last = tag.end();

        let enabled = captures.get(1).map_or(true, |m| m.as_str().is_empty());
        match captures
            .get(2)
            .map(|m| m.as_str().to_lowercase())
            .as_deref()
        {
            Some("i") => style.italic = enabled,
            Some("b") => style.bold = enabled,
            Some("u") => style.underline = enabled,
            _ => {}
        }
    }
    push_text(&mut texts, &style, &line[last..]);

    SubtitleLine { texts }
}

fn push_text(texts: &mut Vec<StyledText>, style: &StyledText, text: &str) {
    if text.is_empty() {
        return;
    }

    texts.push(StyledText {
        text: text.to_string(),
        ..style.clone()
    });
}
