//! Subtitle Client Tests
//!
//! Tests for the Stremio subtitle provider (free, no API key): listing,
//! download caching, file matching and SRT parsing.

use mockito::Server;
use std::path::PathBuf;
use subplay::models::{MediaContext, SubtitleFile, SubtitleInfo, SubtitleMatcher};
use subplay::stream::{SubtitleClient, SubtitleError, SubtitleProvider};
use tokio_test::{assert_err, assert_ok};

const SRT_BODY: &str = "1\r\n00:00:01,000 --> 00:00:03,500\r\n<i>Hello</i>, Batman!\r\n\r\n2\r\n00:00:05,000 --> 00:00:08,000\r\nI'm vengeance.\r\n";

fn movie(imdb_id: &str) -> MediaContext {
    MediaContext::Movie {
        imdb_id: imdb_id.to_string(),
    }
}

// =============================================================================
// Listing Tests
// =============================================================================

/// Test: Movie subtitles are grouped per language
#[tokio::test]
async fn test_list_movie_subtitles_grouped_by_language() {
    let mut server = Server::new_async().await;
    let cache = tempfile::tempdir().unwrap();

    let mock = server
        .mock("GET", "/subtitles/movie/tt0234215.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
            "subtitles": [
                {"id": "55419", "url": "https://subs5.strem.io/en/download/file/70235", "lang": "eng", "SubEncoding": "CP1252"},
                {"id": "122952", "url": "https://subs5.strem.io/en/download/file/169216", "lang": "fre"},
                {"id": "77|Matrix.1999.1080p.BluRay", "url": "https://subs5.strem.io/en/download/file/1", "lang": "eng"}
            ],
            "cacheMaxAge": 14400
        }"#,
        )
        .create_async()
        .await;

    let client = SubtitleClient::with_base_url(server.url(), cache.path());
    let results = assert_ok!(client.list_available(&movie("tt0234215")).await);

    mock.assert_async().await;

    assert_eq!(results.len(), 2, "one entry per language");
    assert_eq!(results[0].language(), Some("eng"));
    assert_eq!(results[0].imdb_id(), Some("tt0234215"));
    assert_eq!(results[0].files().len(), 2);
    assert_eq!(results[0].files()[1].name, "Matrix.1999.1080p.BluRay");
    assert_eq!(results[0].files()[1].quality, Some(1080));
    assert_eq!(results[1].language(), Some("fre"));
    assert_eq!(results[1].files()[0].name, "OpenSubtitles");
}

/// Test: Episode subtitles use the series endpoint
#[tokio::test]
async fn test_list_episode_subtitles() {
    let mut server = Server::new_async().await;
    let cache = tempfile::tempdir().unwrap();

    // Stremio format: /subtitles/series/{imdb}:{season}:{episode}.json
    let mock = server
        .mock("GET", "/subtitles/series/tt0903747:1:5.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"subtitles": [{"id": "78901", "url": "https://subs.io/78901", "lang": "eng"}]}"#)
        .create_async()
        .await;

    let client = SubtitleClient::with_base_url(server.url(), cache.path());
    let media = MediaContext::Episode {
        imdb_id: "tt0903747".into(),
        season: 1,
        episode: 5,
    };
    let results = assert_ok!(client.list_available(&media).await);

    mock.assert_async().await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].files()[0].file_id, "78901");
}

/// Test: Handle empty results gracefully
#[tokio::test]
async fn test_handles_no_subtitles() {
    let mut server = Server::new_async().await;
    let cache = tempfile::tempdir().unwrap();

    let mock = server
        .mock("GET", "/subtitles/movie/tt9999999.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"subtitles": []}"#)
        .create_async()
        .await;

    let client = SubtitleClient::with_base_url(server.url(), cache.path());
    let results = assert_ok!(client.list_available(&movie("tt9999999")).await);

    mock.assert_async().await;

    assert!(results.is_empty(), "Should return empty vec for no results");
}

/// Test: Handle API errors
#[tokio::test]
async fn test_handles_api_error() {
    let mut server = Server::new_async().await;
    let cache = tempfile::tempdir().unwrap();

    let mock = server
        .mock("GET", "/subtitles/movie/tt0000000.json")
        .with_status(500)
        .with_body("Internal Server Error")
        .create_async()
        .await;

    let client = SubtitleClient::with_base_url(server.url(), cache.path());
    let result = client.list_available(&movie("tt0000000")).await;

    mock.assert_async().await;

    assert!(
        matches!(result, Err(SubtitleError::Status(status)) if status.as_u16() == 500),
        "Should return error on 500"
    );
}

/// Test: Add tt prefix if missing from IMDB ID
#[tokio::test]
async fn test_adds_tt_prefix() {
    let mut server = Server::new_async().await;
    let cache = tempfile::tempdir().unwrap();

    let mock = server
        .mock("GET", "/subtitles/movie/tt1234567.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"subtitles": [{"id": "1", "url": "https://subs.io/1", "lang": "eng"}]}"#)
        .create_async()
        .await;

    let client = SubtitleClient::with_base_url(server.url(), cache.path());
    let results = assert_ok!(client.list_available(&movie("1234567")).await);

    mock.assert_async().await;

    assert_eq!(results[0].imdb_id(), Some("tt1234567"));
}

// =============================================================================
// Download & Parse Tests
// =============================================================================

/// Test: Downloads are parsed and cached
#[tokio::test]
async fn test_download_and_parse_caches_file() {
    let mut server = Server::new_async().await;
    let cache = tempfile::tempdir().unwrap();

    let mock = server
        .mock("GET", "/download/55419")
        .with_status(200)
        .with_body(SRT_BODY)
        .expect(1)
        .create_async()
        .await;

    let file = SubtitleFile::new(
        "55419",
        "Movie.2019.720p",
        format!("{}/download/55419", server.url()),
        0.0,
        0,
    );
    let info = SubtitleInfo::with_files(Some("tt0234215".into()), "eng", vec![file]);
    let matcher = SubtitleMatcher::from_playback(Some("Movie.2019.720p.mkv"), Some("720p"));
    let client = SubtitleClient::with_base_url(server.url(), cache.path());

    let subtitle = assert_ok!(client.download_and_parse(&info, &matcher).await);
    assert_eq!(subtitle.file(), cache.path().join("eng_55419.srt"));
    assert!(subtitle.file().exists());
    assert_eq!(subtitle.info(), Some(&info));
    assert_eq!(subtitle.cues().len(), 2);
    assert_eq!(subtitle.cues()[0].start_ms, 1_000);
    assert_eq!(subtitle.cues()[0].end_ms, 3_500);
    assert_eq!(subtitle.cues()[0].lines[0].text(), "Hello, Batman!");
    assert!(subtitle.cues()[0].lines[0].texts[0].italic);

    // second time from the cache
    let cached = assert_ok!(client.download_and_parse(&info, &matcher).await);
    assert_eq!(cached.cues(), subtitle.cues());

    mock.assert_async().await;
}

/// Test: The file named after the playing media is downloaded
#[tokio::test]
async fn test_download_prefers_matching_file_name() {
    let mut server = Server::new_async().await;
    let cache = tempfile::tempdir().unwrap();

    let popular = server
        .mock("GET", "/download/1")
        .with_status(200)
        .with_body(SRT_BODY)
        .expect(0)
        .create_async()
        .await;
    let matching = server
        .mock("GET", "/download/2")
        .with_status(200)
        .with_body(SRT_BODY)
        .create_async()
        .await;

    let info = SubtitleInfo::with_files(
        None,
        "eng",
        vec![
            SubtitleFile::new("1", "Other.Release.720p", format!("{}/download/1", server.url()), 9.0, 5000),
            SubtitleFile::new("2", "Show.S01E01.1080p.WEB", format!("{}/download/2", server.url()), 1.0, 10),
        ],
    );
    let matcher = SubtitleMatcher::from_playback(
        Some("http://localhost:8888/Show.S01E01.1080p.WEB.mkv?token=abc"),
        Some("720p"),
    );
    let client = SubtitleClient::with_base_url(server.url(), cache.path());

    assert_ok!(client.download_and_parse(&info, &matcher).await);

    matching.assert_async().await;
    popular.assert_async().await;
}

/// Test: A failing download is reported
#[tokio::test]
async fn test_download_http_error() {
    let mut server = Server::new_async().await;
    let cache = tempfile::tempdir().unwrap();

    let _mock = server
        .mock("GET", "/download/404")
        .with_status(404)
        .create_async()
        .await;

    let info = SubtitleInfo::with_files(
        None,
        "eng",
        vec![SubtitleFile::new("404", "x", format!("{}/download/404", server.url()), 0.0, 0)],
    );
    let client = SubtitleClient::with_base_url(server.url(), cache.path());

    let err = assert_err!(client.download_and_parse(&info, &SubtitleMatcher::default()).await);
    assert!(matches!(err, SubtitleError::Status(status) if status.as_u16() == 404));
    assert!(!cache.path().join("eng_404.srt").exists(), "nothing cached");
}

/// Test: Malformed content is a parse error
#[tokio::test]
async fn test_download_parse_error() {
    let mut server = Server::new_async().await;
    let cache = tempfile::tempdir().unwrap();

    let _mock = server
        .mock("GET", "/download/bad")
        .with_status(200)
        .with_body("1\nthis is not a timing\nText\n")
        .create_async()
        .await;

    let info = SubtitleInfo::with_files(
        None,
        "eng",
        vec![SubtitleFile::new("bad", "x", format!("{}/download/bad", server.url()), 0.0, 0)],
    );
    let client = SubtitleClient::with_base_url(server.url(), cache.path());

    let err = assert_err!(client.download_and_parse(&info, &SubtitleMatcher::default()).await);
    assert!(matches!(err, SubtitleError::Parse { line: 2, .. }));
}

/// Test: Subtitles without files can't be downloaded
#[tokio::test]
async fn test_no_files_found() {
    let cache = tempfile::tempdir().unwrap();
    let client = SubtitleClient::with_base_url("http://localhost:1", cache.path());

    let err = assert_err!(
        client
            .download_and_parse(&SubtitleInfo::new(None, "eng"), &SubtitleMatcher::default())
            .await
    );
    assert!(matches!(err, SubtitleError::NoFilesFound));
}

// =============================================================================
// Custom Subtitle Tests
// =============================================================================

/// Test: Custom files are parsed in place
#[tokio::test]
async fn test_custom_file_is_parsed_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let path = dir.path().join("My Movie.srt");
    std::fs::write(&path, format!("\u{feff}{}", SRT_BODY)).unwrap();

    let client = SubtitleClient::with_base_url("http://localhost:1", cache.path());
    let info = SubtitleInfo::custom_file(&path);

    let subtitle = assert_ok!(client.download_and_parse(&info, &SubtitleMatcher::default()).await);

    assert_eq!(subtitle.file(), path);
    assert_eq!(subtitle.cues().len(), 2);
    assert_eq!(subtitle.cues()[1].lines[0].text(), "I'm vengeance.");
    assert_eq!(std::fs::read_dir(cache.path()).unwrap().count(), 0, "nothing cached");
}

/// Test: Only SRT files are supported
#[tokio::test]
async fn test_unsupported_custom_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("movie.ass");
    std::fs::write(&path, "[Script Info]").unwrap();

    let client = SubtitleClient::with_base_url("http://localhost:1", dir.path());
    let err = assert_err!(
        client
            .download_and_parse(&SubtitleInfo::custom_file(&path), &SubtitleMatcher::default())
            .await
    );

    assert!(matches!(err, SubtitleError::UnsupportedFormat(format) if format == "ass"));
}

/// Test: Missing custom files are reported
#[tokio::test]
async fn test_missing_custom_file() {
    let cache = tempfile::tempdir().unwrap();
    let client = SubtitleClient::with_base_url("http://localhost:1", cache.path());
    let info = SubtitleInfo::custom_file(PathBuf::from("/does/not/exist.srt"));

    let err = assert_err!(client.download_and_parse(&info, &SubtitleMatcher::default()).await);
    assert!(matches!(err, SubtitleError::Io(_)));
}

// =============================================================================
// Cache Cleanup Tests
// =============================================================================

/// Test: Cleaning removes the subtitle directory
#[tokio::test]
async fn test_cleanup_removes_directory() {
    let root = tempfile::tempdir().unwrap();
    let cache = root.path().join("subtitles");
    std::fs::create_dir_all(&cache).unwrap();
    std::fs::write(cache.join("eng_1.srt"), SRT_BODY).unwrap();

    let client = SubtitleClient::with_base_url("http://localhost:1", &cache);
    assert_ok!(client.cleanup().await);
    assert!(!cache.exists());

    // cleaning a missing directory is fine
    assert_ok!(client.cleanup().await);
}
