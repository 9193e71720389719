//! Landmark source: an external hand-tracking helper process that prints one
//! JSON frame per line on stdout. Camera size and tracking confidence are
//! forwarded as arguments; anything unreadable on the stream degrades to a
//! frame with no hands.

use anyhow::{Context, Result};
use log::warn;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::config::SourceConfig;
use crate::landmarks::HandFrame;

pub struct HelperSource {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl HelperSource {
    pub fn spawn(cfg: &SourceConfig) -> Result<Self> {
        let mut cmd = Command::new(&cfg.command);
        cmd.args(&cfg.args)
            .arg("--width")
            .arg(cfg.width.to_string())
            .arg("--height")
            .arg(cfg.height.to_string())
            .arg("--max-hands")
            .arg(cfg.max_hands.to_string())
            .arg("--min-detection-confidence")
            .arg(cfg.min_detection_confidence.to_string())
            .arg("--min-tracking-confidence")
            .arg(cfg.min_tracking_confidence.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn tracking helper '{}'", cfg.command))?;
        let stdout = child
            .stdout
            .take()
            .context("tracking helper has no stdout")?;

        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
        })
    }

    /// Next frame from the helper; `None` once the stream has ended.
    /// Malformed lines count as frames without a hand.
    pub fn next_frame(&mut self) -> Option<HandFrame> {
        match self.lines.next()? {
            Err(e) => {
                warn!("helper read error: {e}");
                None
            }
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    return Some(HandFrame::default());
                }
                match serde_json::from_str::<HandFrame>(line) {
                    Ok(frame) => Some(frame),
                    Err(e) => {
                        warn!("malformed helper frame: {e}");
                        Some(HandFrame::default())
                    }
                }
            }
        }
    }
}

impl Drop for HelperSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// True when the configured helper resolves to something executable, for the
/// doctor report.
pub fn helper_on_path(command: &str) -> bool {
    let p = Path::new(command);
    if p.components().count() > 1 {
        return p.exists();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(command).exists()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::LANDMARK_COUNT;

    // exercises the full spawn/read/teardown path with a stand-in helper
    #[test]
    fn reads_frames_and_tolerates_garbage_lines() {
        let landmarks: Vec<String> = (0..LANDMARK_COUNT)
            .map(|i| format!(r#"{{"x": 0.5, "y": 0.5, "z": -0.{i}}}"#))
            .collect();
        let hand_line = format!(
            r#"{{"timestamp_ms": 1, "hands": [{{"landmarks": [{}]}}]}}"#,
            landmarks.join(",")
        );
        let script = format!(
            "echo '{hand_line}'; echo 'not json'; echo '{{\"timestamp_ms\": 2, \"hands\": []}}'"
        );
        let cfg = SourceConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script, "--".to_string()],
            ..SourceConfig::default()
        };

        let mut src = HelperSource::spawn(&cfg).unwrap();
        let f1 = src.next_frame().unwrap();
        assert!(f1.sample().is_some());
        let f2 = src.next_frame().unwrap();
        assert!(f2.sample().is_none(), "garbage line must read as no hand");
        let f3 = src.next_frame().unwrap();
        assert!(f3.sample().is_none());
        assert!(src.next_frame().is_none(), "stream end");
    }

    #[test]
    fn spawn_failure_is_an_error_not_a_panic() {
        let cfg = SourceConfig {
            command: "/nonexistent/treectl-hands".to_string(),
            ..SourceConfig::default()
        };
        assert!(HelperSource::spawn(&cfg).is_err());
    }

    #[test]
    fn path_resolution_for_doctor() {
        assert!(helper_on_path("sh"));
        assert!(!helper_on_path("definitely-not-a-real-helper-binary"));
        assert!(helper_on_path("/bin/sh"));
    }
}
