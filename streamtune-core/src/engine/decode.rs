//! Whole-buffer decoding with symphonia.

use std::io::Cursor;

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

use crate::error::StreamError;

/// Interleaved f32 PCM decoded from one encoded resource
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn duration_seconds(&self) -> f32 {
        let frames = self.samples.len() / (self.channels.max(1) as usize);
        (frames as f32) / (self.sample_rate.max(1) as f32)
    }
}

/// Probe hint derived from what the server told us about the payload
#[derive(Debug, Clone, Default)]
pub struct MediaHint {
    pub extension: Option<String>,
    pub mime_type: Option<String>,
}

impl MediaHint {
    /// Build a hint from a response content type and the request path
    pub fn from_response(content_type: Option<&str>, path: &str) -> Self {
        let mime_type = content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");
        let extension = path
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty());
        Self {
            extension,
            mime_type,
        }
    }

    fn to_hint(&self) -> Hint {
        let mut hint = Hint::new();
        if let Some(ext) = &self.extension {
            hint.with_extension(ext);
        }
        if let Some(mime) = &self.mime_type {
            hint.mime_type(mime);
        }
        hint
    }
}

/// Decode a complete encoded resource into interleaved f32 samples.
///
/// Corrupt packets are skipped; a stream that yields no audio at all is a
/// decode failure.
pub fn decode_bytes(bytes: Vec<u8>, hint: &MediaHint) -> Result<DecodedAudio, StreamError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &hint.to_hint(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| match e {
            SymphoniaError::Unsupported(what) => StreamError::Unsupported(what.to_string()),
            other => StreamError::Decode(other.to_string()),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| StreamError::Unsupported("no audio track".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| StreamError::Unsupported(e.to_string()))?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(StreamError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let frames = decoded.capacity();
                let required = frames * spec.channels.count();
                if sample_buf.as_ref().is_none_or(|buf| buf.capacity() < required) {
                    sample_buf = Some(SampleBuffer::<f32>::new(frames as u64, spec));
                }
                if let Some(buf) = sample_buf.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                log::warn!("Skipping corrupt packet: {}", msg);
            }
            Err(e) => return Err(StreamError::Decode(e.to_string())),
        }
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(StreamError::Decode("stream contains no audio".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_from_response() {
        let hint = MediaHint::from_response(Some("audio/mpeg; charset=binary"), "/stream/4/192");
        assert_eq!(hint.mime_type.as_deref(), Some("audio/mpeg"));
        assert_eq!(hint.extension, None);

        let hint = MediaHint::from_response(Some("application/octet-stream"), "/seg/part0.WAV");
        assert_eq!(hint.mime_type, None);
        assert_eq!(hint.extension.as_deref(), Some("wav"));
    }

    #[test]
    fn garbage_is_not_audio() {
        let result = decode_bytes(b"definitely not audio".to_vec(), &MediaHint::default());
        assert!(result.is_err());
    }

    #[test]
    fn duration_from_frames() {
        let audio = DecodedAudio {
            samples: vec![0.0; 8000],
            sample_rate: 2000,
            channels: 2,
        };
        assert_eq!(audio.duration_seconds(), 2.0);
    }
}
