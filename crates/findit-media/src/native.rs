//! Native in-process MP4/MOV prober
//!
//! Reads container metadata with the pure-Rust `mp4` crate, so the metadata
//! layer of the indexing pipeline never pays a subprocess spawn for the
//! common H.264/H.265 camera formats. Pixel-producing operations are refused
//! statically; the registry routes those to a decoding backend.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::debug;

use crate::{DecoderCapability, MediaType, ProbeResult, Result};

const NATIVE_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v"];

/// Pure-Rust MP4-family prober (priority 80)
#[derive(Debug, Clone, Default)]
pub struct NativeMp4Decoder;

impl NativeMp4Decoder {
    pub fn new() -> Self {
        Self
    }

    pub fn capability(&self) -> DecoderCapability {
        DecoderCapability {
            name: "native-mp4",
            file_extensions: NATIVE_EXTENSIONS,
            priority: 80,
        }
    }

    pub async fn probe(&self, path: &Path) -> Result<ProbeResult> {
        // Container parsing is quick, bounded work on the local file; no
        // subprocess and no decode, so doing it inline is acceptable.
        let path = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || probe_blocking(&path))
            .await
            .map_err(|e| crate::MediaError::DecodeFailed(e.to_string()))?;
        Ok(result)
    }
}

fn probe_blocking(path: &Path) -> ProbeResult {
    let Ok(file) = File::open(path) else {
        return ProbeResult::unsupported();
    };
    let Ok(metadata) = file.metadata() else {
        return ProbeResult::unsupported();
    };
    let size = metadata.len();

    let reader = BufReader::new(file);
    let mp4 = match mp4::Mp4Reader::read_header(reader, size) {
        Ok(m) => m,
        Err(e) => {
            debug!("native probe rejected {}: {}", path.display(), e);
            return ProbeResult::unsupported();
        }
    };

    let duration = mp4.duration().as_secs_f64();
    let mut video: Option<(&mp4::Mp4Track, &'static str)> = None;
    let mut has_audio = false;

    for track in mp4.tracks().values() {
        match track.track_type() {
            Ok(mp4::TrackType::Video) => {
                let codec = match track.media_type() {
                    Ok(mp4::MediaType::H264) => "h264",
                    Ok(mp4::MediaType::H265) => "hevc",
                    // Unrecognized video codec (ProRes, RAW formats): this
                    // backend cannot vouch for the file, let FFmpeg win.
                    _ => return ProbeResult::unsupported(),
                };
                video = Some((track, codec));
            }
            Ok(mp4::TrackType::Audio) => has_audio = true,
            _ => {}
        }
    }

    let Some((track, codec)) = video else {
        return ProbeResult::unsupported();
    };

    let fps = track.frame_rate();
    ProbeResult {
        // Beats the generic FFmpeg probe for its whitelist
        score: 95,
        media_type: MediaType::Video,
        container: "mp4".to_string(),
        codec: codec.to_string(),
        duration: (duration > 0.0).then_some(duration),
        resolution: Some((u32::from(track.width()), u32::from(track.height()))),
        fps: (fps > 0.0).then_some(fps),
        has_audio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability() {
        let cap = NativeMp4Decoder::new().capability();
        assert_eq!(cap.priority, 80);
        assert!(cap.file_extensions.contains(&"mov"));
        assert!(!cap.file_extensions.contains(&"mkv"));
    }

    #[tokio::test]
    async fn test_probe_rejects_non_mp4_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.mp4");
        std::fs::write(&path, b"not actually an mp4 file").unwrap();

        let probe = NativeMp4Decoder::new().probe(&path).await.unwrap();
        assert_eq!(probe.score, 0);
    }

    #[tokio::test]
    async fn test_probe_missing_file_scores_zero() {
        let probe = NativeMp4Decoder::new()
            .probe(Path::new("/nonexistent/x.mp4"))
            .await
            .unwrap();
        assert_eq!(probe.score, 0);
    }
}
