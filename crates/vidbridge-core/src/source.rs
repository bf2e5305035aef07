//! Video source identification
//!
//! Resolves which backend plays a video, either from an explicit
//! [`SupportedVideoApi`] or by inspecting a URL.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use url::Url;

/// Backends a player can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportedVideoApi {
    /// Native `<video>` element playing a file URL
    Html5,
    /// YouTube IFrame embed
    YouTube,
}

impl SupportedVideoApi {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedVideoApi::Html5 => "html5",
            SupportedVideoApi::YouTube => "youtube",
        }
    }
}

impl std::fmt::Display for SupportedVideoApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SupportedVideoApi {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "html5" | "html" | "file" => Ok(SupportedVideoApi::Html5),
            "youtube" | "yt" => Ok(SupportedVideoApi::YouTube),
            other => Err(Error::bad_parameter(format!("unsupported video api '{}'", other))),
        }
    }
}

/// A video the player knows how to load
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoSource {
    /// Backend that plays the video
    pub api: SupportedVideoApi,
    /// Backend-specific id: a YouTube video id, or the file URL for HTML5
    pub id: String,
}

impl VideoSource {
    pub fn new(api: SupportedVideoApi, id: impl Into<String>) -> Self {
        Self { api, id: id.into() }
    }
}

impl std::fmt::Display for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.api, self.id)
    }
}

/// File extensions the HTML5 backend plays
pub const SUPPORTED_FILE_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "ogv", "m4v", "mov"];

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];

const YOUTUBE_SHORT_HOSTS: &[&str] = &["youtu.be", "www.youtu.be"];

/// Parse a URL into a [`VideoSource`].
///
/// YouTube URLs yield the video id; URLs of a supported video file yield
/// the whole URL as an HTML5 source.
pub fn parse_video_url(input: &str) -> Result<VideoSource> {
    let url = Url::parse(input.trim())
        .map_err(|e| Error::bad_parameter(format!("'{}' is not a valid URL: {}", input, e)))?;

    let host = url
        .host_str()
        .ok_or_else(|| Error::bad_parameter(format!("'{}' has no host", input)))?
        .to_ascii_lowercase();

    if YOUTUBE_HOSTS.contains(&host.as_str()) {
        let id = youtube_id_from_long_url(&url).ok_or_else(|| {
            Error::bad_parameter(format!("YouTube URL '{}' does not name a video (missing 'v')", input))
        })?;
        return youtube_source(id);
    }

    if YOUTUBE_SHORT_HOSTS.contains(&host.as_str()) {
        let id = first_path_segment(&url)
            .ok_or_else(|| Error::bad_parameter(format!("YouTube URL '{}' has no video id", input)))?;
        return youtube_source(id);
    }

    match file_extension(&url) {
        Some(ext) if SUPPORTED_FILE_EXTENSIONS.contains(&ext.as_str()) => {
            Ok(VideoSource::new(SupportedVideoApi::Html5, url.as_str()))
        }
        Some(ext) => Err(Error::bad_parameter(format!(
            "unsupported video file extension '.{}' (supported: {})",
            ext,
            SUPPORTED_FILE_EXTENSIONS.join(", ")
        ))),
        None => Err(Error::UnknownVideoSource(host)),
    }
}

/// Returns true for a well-formed YouTube video id
pub fn is_valid_youtube_id(id: &str) -> bool {
    id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn youtube_source(id: String) -> Result<VideoSource> {
    if !is_valid_youtube_id(&id) {
        return Err(Error::bad_parameter(format!("'{}' is not a valid YouTube video id", id)));
    }
    Ok(VideoSource::new(SupportedVideoApi::YouTube, id))
}

fn youtube_id_from_long_url(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    match segments.next() {
        Some("watch") => url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .filter(|v| !v.is_empty()),
        Some("embed") | Some("shorts") => segments.next().map(str::to_string),
        _ => None,
    }
}

fn first_path_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn file_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_watch_url() {
        let source = parse_video_url("https://www.youtube.com/watch?v=C0DPdy98e4c").unwrap();
        assert_eq!(source.api, SupportedVideoApi::YouTube);
        assert_eq!(source.id, "C0DPdy98e4c");
    }

    #[test]
    fn test_youtube_missing_v() {
        let result = parse_video_url("https://www.youtube.com/watch?xxx=C0DPdy98e4c");
        assert!(matches!(result, Err(Error::BadParameter(_))));
    }

    #[test]
    fn test_youtube_short_and_embed() {
        let short = parse_video_url("https://youtu.be/C0DPdy98e4c?t=42").unwrap();
        assert_eq!(short, VideoSource::new(SupportedVideoApi::YouTube, "C0DPdy98e4c"));

        let embed = parse_video_url("https://www.youtube-nocookie.com/embed/C0DPdy98e4c").unwrap();
        assert_eq!(embed.id, "C0DPdy98e4c");

        assert!(matches!(
            parse_video_url("https://youtu.be/short"),
            Err(Error::BadParameter(_))
        ));
    }

    #[test]
    fn test_file_urls() {
        let source = parse_video_url("https://cdn.example.com/media/clip.MP4").unwrap();
        assert_eq!(source.api, SupportedVideoApi::Html5);
        assert_eq!(source.id, "https://cdn.example.com/media/clip.MP4");

        assert!(matches!(
            parse_video_url("https://cdn.example.com/media/clip.avi"),
            Err(Error::BadParameter(_))
        ));
    }

    #[test]
    fn test_unknown_source() {
        match parse_video_url("https://vimeo.com/76979871") {
            Err(Error::UnknownVideoSource(host)) => assert_eq!(host, "vimeo.com"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(parse_video_url("not a url"), Err(Error::BadParameter(_))));
    }

    #[test]
    fn test_api_from_str() {
        assert_eq!("YouTube".parse::<SupportedVideoApi>().unwrap(), SupportedVideoApi::YouTube);
        assert_eq!("html5".parse::<SupportedVideoApi>().unwrap(), SupportedVideoApi::Html5);
        assert!("vimeo".parse::<SupportedVideoApi>().is_err());
    }
}
