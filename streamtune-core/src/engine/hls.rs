//! Segmented (M3U8) streaming backend.
//!
//! A master playlist is resolved to the variant closest to the configured
//! bitrate. The first media segment is decoded before the stream is reported
//! ready; the rest are fetched in order and appended to the same buffer.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::Url;

use super::{
    backend::{OpenedStream, StreamBackend},
    decode::{DecodedAudio, MediaHint, decode_bytes},
};
use crate::{
    config::BackendKind,
    error::StreamError,
    source::{PreparedStream, StreamBuffer},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    /// Peak bits per second
    pub bandwidth: u64,
    pub uri: Url,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub duration: f32,
    pub uri: Url,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    /// `#EXT-X-MAP` initialization section, prepended to every segment
    pub init: Option<Url>,
    pub segments: Vec<Segment>,
}

impl MediaPlaylist {
    pub fn duration_seconds(&self) -> f32 {
        self.segments.iter().map(|s| s.duration).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Playlist {
    Master(Vec<Variant>),
    Media(MediaPlaylist),
}

/// Split an attribute list (`KEY=value,KEY="quoted, value"`) into pairs
fn parse_attributes(list: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    let mut push = |item: &str| {
        if let Some((key, value)) = item.split_once('=') {
            attrs.push((
                key.trim().to_ascii_uppercase(),
                value.trim().trim_matches('"').to_string(),
            ));
        }
    };

    for ch in list.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' if !in_quotes => {
                push(&current);
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    push(&current);
    attrs
}

fn attribute<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn resolve(base: &Url, reference: &str) -> Result<Url, StreamError> {
    base.join(reference)
        .map_err(|e| StreamError::Manifest(format!("bad URI '{reference}': {e}")))
}

/// Parse an M3U8 document; relative URIs are resolved against `base`
pub fn parse_playlist(text: &str, base: &Url) -> Result<Playlist, StreamError> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    if lines.next() != Some("#EXTM3U") {
        return Err(StreamError::Manifest("missing #EXTM3U header".to_string()));
    }

    let mut variants = Vec::new();
    let mut segments = Vec::new();
    let mut init = None;
    let mut pending_bandwidth: Option<u64> = None;
    let mut pending_duration: Option<f32> = None;

    for line in lines {
        if let Some(rest) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            let attrs = parse_attributes(rest);
            let bandwidth = attribute(&attrs, "BANDWIDTH")
                .and_then(|b| b.parse().ok())
                .ok_or_else(|| StreamError::Manifest("variant without BANDWIDTH".to_string()))?;
            pending_bandwidth = Some(bandwidth);
        } else if let Some(rest) = line.strip_prefix("#EXTINF:") {
            let value = rest.split(',').next().unwrap_or_default().trim();
            let duration: f32 = value
                .parse()
                .ok()
                .filter(|d: &f32| d.is_finite() && *d >= 0.0)
                .ok_or_else(|| StreamError::Manifest(format!("bad segment duration '{value}'")))?;
            pending_duration = Some(duration);
        } else if let Some(rest) = line.strip_prefix("#EXT-X-MAP:") {
            let attrs = parse_attributes(rest);
            let uri = attribute(&attrs, "URI")
                .ok_or_else(|| StreamError::Manifest("EXT-X-MAP without URI".to_string()))?;
            init = Some(resolve(base, uri)?);
        } else if line.starts_with("#EXT-X-BYTERANGE") {
            return Err(StreamError::Manifest(
                "byte-range segments are not supported".to_string(),
            ));
        } else if let Some(rest) = line.strip_prefix("#EXT-X-KEY:") {
            let attrs = parse_attributes(rest);
            if attribute(&attrs, "METHOD").is_some_and(|m| m != "NONE") {
                return Err(StreamError::Manifest("encrypted segments are not supported".to_string()));
            }
        } else if line.starts_with('#') {
            // Tags we do not act on
        } else if let Some(bandwidth) = pending_bandwidth.take() {
            variants.push(Variant {
                bandwidth,
                uri: resolve(base, line)?,
            });
        } else if let Some(duration) = pending_duration.take() {
            segments.push(Segment {
                duration,
                uri: resolve(base, line)?,
            });
        } else {
            return Err(StreamError::Manifest(format!("URI '{line}' without a preceding tag")));
        }
    }

    if !variants.is_empty() {
        Ok(Playlist::Master(variants))
    } else if !segments.is_empty() {
        Ok(Playlist::Media(MediaPlaylist { init, segments }))
    } else {
        Err(StreamError::Manifest("playlist has no segments".to_string()))
    }
}

/// Variant whose bandwidth is closest to `bitrate_kbps`
pub fn select_variant(variants: &[Variant], bitrate_kbps: u32) -> Option<&Variant> {
    let target = u64::from(bitrate_kbps) * 1000;
    variants.iter().min_by_key(|v| v.bandwidth.abs_diff(target))
}

async fn fetch(client: &reqwest::Client, url: &Url) -> Result<reqwest::Response, StreamError> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(StreamError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response)
}

async fn fetch_playlist(client: &reqwest::Client, url: &Url) -> Result<Playlist, StreamError> {
    let response = fetch(client, url).await?;
    let base = response.url().clone();
    let text = response.text().await?;
    parse_playlist(&text, &base)
}

/// Fetch and decode one segment, with the init section in front of it
async fn load_segment(
    client: &reqwest::Client,
    init: Option<&Arc<Vec<u8>>>,
    segment: &Segment,
) -> Result<DecodedAudio, StreamError> {
    let response = fetch(client, &segment.uri).await?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let hint = MediaHint::from_response(content_type.as_deref(), segment.uri.path());
    let body = response.bytes().await?;

    let mut bytes = Vec::with_capacity(init.map_or(0, |i| i.len()) + body.len());
    if let Some(init) = init {
        bytes.extend_from_slice(init);
    }
    bytes.extend_from_slice(&body);

    tokio::task::spawn_blocking(move || decode_bytes(bytes, &hint))
        .await
        .map_err(|e| StreamError::Decode(format!("decoder task aborted: {e}")))?
}

/// Adaptive-manifest backend
pub struct HlsBackend {
    client: reqwest::Client,
    bitrate: u32,
}

impl HlsBackend {
    pub fn new(client: reqwest::Client, bitrate: u32) -> Self {
        Self { client, bitrate }
    }

    async fn resolve_media_playlist(&self, url: &str) -> Result<MediaPlaylist, StreamError> {
        let url = Url::parse(url).map_err(|e| StreamError::Manifest(format!("bad URL '{url}': {e}")))?;
        match fetch_playlist(&self.client, &url).await? {
            Playlist::Media(media) => Ok(media),
            Playlist::Master(variants) => {
                let variant = select_variant(&variants, self.bitrate)
                    .ok_or_else(|| StreamError::Manifest("no variants".to_string()))?;
                log::debug!(
                    "Selected variant {} ({} bps) for {} kbps",
                    variant.uri,
                    variant.bandwidth,
                    self.bitrate
                );
                match fetch_playlist(&self.client, &variant.uri).await? {
                    Playlist::Media(media) => Ok(media),
                    Playlist::Master(_) => Err(StreamError::Manifest(
                        "variant points to another master playlist".to_string(),
                    )),
                }
            }
        }
    }

    async fn start(&self, url: &str) -> Result<OpenedStream, StreamError> {
        let playlist = self.resolve_media_playlist(url).await?;
        let init = match &playlist.init {
            Some(init_url) => {
                let body = fetch(&self.client, init_url).await?.bytes().await?;
                Some(Arc::new(body.to_vec()))
            }
            None => None,
        };

        let mut segments = playlist.segments.iter();
        let first = segments
            .next()
            .ok_or_else(|| StreamError::Manifest("playlist has no segments".to_string()))?;
        let audio = load_segment(&self.client, init.as_ref(), first).await?;

        let buffer = Arc::new(StreamBuffer::new(audio.sample_rate, audio.channels));
        buffer.append(&audio.samples);

        let mut duration = playlist.duration_seconds();
        if duration <= 0.0 {
            duration = audio.duration_seconds();
        }
        let prepared = PreparedStream::new(Arc::clone(&buffer), duration);

        let rest: Vec<Segment> = segments.cloned().collect();
        if rest.is_empty() {
            buffer.finish();
            return Ok(OpenedStream::complete(prepared));
        }

        let client = self.client.clone();
        let fill = async move {
            for segment in &rest {
                let audio = load_segment(&client, init.as_ref(), segment).await?;
                if audio.sample_rate != buffer.sample_rate() || audio.channels != buffer.channels() {
                    return Err(StreamError::Decode(format!(
                        "segment {} changes format to {} Hz/{} ch",
                        segment.uri, audio.sample_rate, audio.channels
                    )));
                }
                buffer.append(&audio.samples);
            }
            buffer.finish();
            Ok(())
        };

        Ok(OpenedStream {
            prepared,
            fill: Some(Box::pin(fill)),
        })
    }
}

impl StreamBackend for HlsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Hls
    }

    fn open<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<OpenedStream, StreamError>> {
        Box::pin(self.start(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:3000/stream/7/192").unwrap()
    }

    #[test]
    fn parses_media_playlist() {
        let text = "#EXTM3U\n#EXT-X-VERSION:7\n#EXT-X-TARGETDURATION:4\n\
                    #EXT-X-MAP:URI=\"init.mp4\"\n\
                    #EXTINF:4.0,\nseg0.m4s\n#EXTINF:3.5,\nseg1.m4s\n#EXT-X-ENDLIST\n";
        let Playlist::Media(media) = parse_playlist(text, &base()).unwrap() else {
            panic!("expected media playlist");
        };
        assert_eq!(media.segments.len(), 2);
        assert_eq!(media.duration_seconds(), 7.5);
        assert_eq!(media.segments[1].uri.as_str(), "http://localhost:3000/stream/7/seg1.m4s");
        assert_eq!(
            media.init.unwrap().as_str(),
            "http://localhost:3000/stream/7/init.mp4"
        );
    }

    #[test]
    fn parses_master_and_selects_closest_bandwidth() {
        let text = "#EXTM3U\n\
                    #EXT-X-STREAM-INF:BANDWIDTH=64000,CODECS=\"mp4a.40.2,mp4a.40.5\"\nlow/index.m3u8\n\
                    #EXT-X-STREAM-INF:BANDWIDTH=196000\nmid/index.m3u8\n\
                    #EXT-X-STREAM-INF:BANDWIDTH=320000\n/abs/high.m3u8\n";
        let Playlist::Master(variants) = parse_playlist(text, &base()).unwrap() else {
            panic!("expected master playlist");
        };
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[2].uri.as_str(), "http://localhost:3000/abs/high.m3u8");

        assert_eq!(select_variant(&variants, 192).unwrap().bandwidth, 196000);
        assert_eq!(select_variant(&variants, 32).unwrap().bandwidth, 64000);
        assert_eq!(select_variant(&variants, 1000).unwrap().bandwidth, 320000);
    }

    #[test]
    fn rejects_malformed_manifests() {
        assert!(matches!(
            parse_playlist("seg0.ts\n", &base()),
            Err(StreamError::Manifest(_))
        ));
        assert!(matches!(
            parse_playlist("#EXTM3U\n#EXT-X-ENDLIST\n", &base()),
            Err(StreamError::Manifest(_))
        ));
        assert!(matches!(
            parse_playlist("#EXTM3U\n#EXTINF:abc,\nseg0.ts\n", &base()),
            Err(StreamError::Manifest(_))
        ));
        assert!(matches!(
            parse_playlist("#EXTM3U\norphan.ts\n", &base()),
            Err(StreamError::Manifest(_))
        ));
    }

    #[test]
    fn rejects_byte_range_and_encrypted_segments() {
        let ranged = "#EXTM3U\n#EXTINF:4.0,\n#EXT-X-BYTERANGE:75232@0\nmedia.aac\n";
        assert!(matches!(
            parse_playlist(ranged, &base()),
            Err(StreamError::Manifest(m)) if m.contains("byte-range")
        ));

        let encrypted = "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\n#EXTINF:4.0,\nseg0.ts\n";
        assert!(matches!(
            parse_playlist(encrypted, &base()),
            Err(StreamError::Manifest(m)) if m.contains("encrypted")
        ));

        let clear = "#EXTM3U\n#EXT-X-KEY:METHOD=NONE\n#EXTINF:4.0,\nseg0.ts\n";
        assert!(parse_playlist(clear, &base()).is_ok());
    }

    #[test]
    fn attribute_lists_respect_quotes() {
        let attrs = parse_attributes("BANDWIDTH=1,CODECS=\"a,b\",uri=\"x.mp4\"");
        assert_eq!(attribute(&attrs, "CODECS"), Some("a,b"));
        assert_eq!(attribute(&attrs, "URI"), Some("x.mp4"));
        assert_eq!(attribute(&attrs, "BANDWIDTH"), Some("1"));
    }
}
