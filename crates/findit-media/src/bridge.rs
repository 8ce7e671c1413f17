//! Vendor CLI bridges
//!
//! Camera-raw formats ship with vendor command-line tools rather than codec
//! libraries. A bridge advertises a high priority for its extensions, probes
//! by checking the tool is installed, and silently degrades to score 0 when
//! it is not; the file then falls through to whatever else can read it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::process::{resolve_tool, run_tool, DEFAULT_TOOL_TIMEOUT};
use crate::{DecoderCapability, MediaError, MediaType, ProbeResult, Result};

/// Static description of a vendor tool bridge
#[derive(Debug, Clone, Copy)]
pub struct BridgeSpec {
    pub name: &'static str,
    pub tool: &'static str,
    pub file_extensions: &'static [&'static str],
    pub priority: i32,
    pub codec: &'static str,
}

/// Blackmagic RAW via the `braw-decode` CLI
pub const BRAW_BRIDGE: BridgeSpec = BridgeSpec {
    name: "braw-bridge",
    tool: "braw-decode",
    file_extensions: &["braw"],
    priority: 150,
    codec: "braw",
};

/// RED R3D via the `REDline` CLI
pub const RED_BRIDGE: BridgeSpec = BridgeSpec {
    name: "red-bridge",
    tool: "REDline",
    file_extensions: &["r3d"],
    priority: 140,
    codec: "r3d",
};

/// A decoder backed by an external vendor CLI tool
#[derive(Debug, Clone)]
pub struct ToolBridge {
    spec: BridgeSpec,
    timeout: Duration,
}

impl ToolBridge {
    pub fn new(spec: BridgeSpec) -> Self {
        Self {
            spec,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn capability(&self) -> DecoderCapability {
        DecoderCapability {
            name: self.spec.name,
            file_extensions: self.spec.file_extensions,
            priority: self.spec.priority,
        }
    }

    pub fn supports_audio_output(&self) -> bool {
        false
    }

    fn tool_installed(&self) -> bool {
        resolve_tool(self.spec.tool).is_ok()
    }

    pub async fn probe(&self, path: &Path) -> Result<ProbeResult> {
        let ext_matches = crate::file_extension(path)
            .map(|e| self.spec.file_extensions.contains(&e.as_str()))
            .unwrap_or(false);
        if !ext_matches || !self.tool_installed() {
            debug!(
                "bridge {} not applicable for {} (installed: {})",
                self.spec.name,
                path.display(),
                self.tool_installed()
            );
            return Ok(ProbeResult::unsupported());
        }
        if !path.exists() {
            return Ok(ProbeResult::unsupported());
        }

        // The vendor tools have no cheap metadata mode worth parsing here;
        // extension plus tool presence is the advertisement.
        Ok(ProbeResult {
            score: 90,
            media_type: MediaType::Video,
            container: self.spec.codec.to_string(),
            codec: self.spec.codec.to_string(),
            duration: None,
            resolution: None,
            fps: None,
            has_audio: false,
        })
    }

    /// Extract frames by invoking the vendor tool once per timestamp
    pub async fn extract_keyframes(
        &self,
        path: &Path,
        times: &[f64],
        out_dir: &Path,
        max_dim: u32,
    ) -> Result<Vec<Option<PathBuf>>> {
        if !self.tool_installed() {
            return Err(MediaError::ToolNotFound(self.spec.tool.to_string()));
        }
        std::fs::create_dir_all(out_dir)?;

        let mut results = Vec::with_capacity(times.len());
        for (i, &t) in times.iter().enumerate() {
            let out_path = out_dir.join(format!("frame_{i:03}.jpg"));
            let args = vec![
                path.display().to_string(),
                "--frame-at".to_string(),
                format!("{t:.3}"),
                "--max-dim".to_string(),
                max_dim.to_string(),
                "--out".to_string(),
                out_path.display().to_string(),
            ];
            match run_tool(self.spec.tool, &args, self.timeout).await {
                Ok(_) if out_path.exists() => results.push(Some(out_path)),
                Ok(_) => results.push(None),
                Err(e) => {
                    warn!(
                        "{} failed at {:.3}s for {}: {}",
                        self.spec.tool,
                        t,
                        path.display(),
                        e
                    );
                    results.push(None);
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_priorities_beat_builtin_decoders() {
        assert!(BRAW_BRIDGE.priority > 80);
        assert!(RED_BRIDGE.priority > 80);
        assert!(BRAW_BRIDGE.priority > RED_BRIDGE.priority - 20);
    }

    #[tokio::test]
    async fn test_probe_degrades_when_tool_missing() {
        // Neither vendor tool is installed in CI
        let bridge = ToolBridge::new(BRAW_BRIDGE);
        let probe = bridge.probe(Path::new("/clips/a.braw")).await.unwrap();
        assert_eq!(probe.score, 0);
    }

    #[tokio::test]
    async fn test_probe_rejects_wrong_extension() {
        let bridge = ToolBridge::new(RED_BRIDGE);
        let probe = bridge.probe(Path::new("/clips/a.mp4")).await.unwrap();
        assert_eq!(probe.score, 0);
    }
}
