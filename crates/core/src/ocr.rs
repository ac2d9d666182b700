use crate::error::IntakeError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Driver for the external OCR binary. Invoked with a direct argument vector
/// (no shell), a hard wall-clock timeout, and captured stderr for
/// diagnostics. Output is located by scanning the per-document output
/// directory for generated markdown files.
pub struct OcrEngine {
    command: String,
    output_dir: PathBuf,
    timeout_secs: u64,
}

impl OcrEngine {
    pub fn new(command: impl Into<String>, output_dir: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            command: command.into(),
            output_dir: output_dir.into(),
            timeout_secs,
        }
    }

    /// Probe: run the binary with `--help` under a short timeout.
    pub async fn is_available(&self) -> bool {
        let probe = Command::new(&self.command)
            .arg("--help")
            .kill_on_drop(true)
            .output();
        match timeout(Duration::from_secs(15), probe).await {
            Ok(Ok(output)) => output.status.success(),
            _ => false,
        }
    }

    pub async fn extract_text(&self, pdf_path: &Path) -> Result<String, IntakeError> {
        if !pdf_path.exists() {
            return Err(IntakeError::OcrFailed(format!(
                "file does not exist: {}",
                pdf_path.display()
            )));
        }
        tokio::fs::create_dir_all(&self.output_dir).await?;

        info!(path = %pdf_path.display(), command = %self.command, "ocr start");
        let invocation = Command::new(&self.command)
            .arg("-p")
            .arg(pdf_path)
            .arg("-o")
            .arg(&self.output_dir)
            .kill_on_drop(true)
            .output();

        let output = match timeout(Duration::from_secs(self.timeout_secs), invocation).await {
            Ok(result) => result?,
            Err(_elapsed) => return Err(IntakeError::OcrTimeout(self.timeout_secs)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IntakeError::OcrFailed(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }
        if !output.stderr.is_empty() {
            debug!(stderr = %String::from_utf8_lossy(&output.stderr), "ocr stderr");
        }

        let document_dir = self.output_dir.join(file_stem(pdf_path)?);
        let markdown = collect_markdown(&document_dir);
        match markdown {
            Some(text) => {
                info!(path = %pdf_path.display(), chars = text.len(), "ocr extracted markdown");
                Ok(text)
            }
            None => Err(IntakeError::OcrFailed(format!(
                "no readable markdown under {}",
                document_dir.display()
            ))),
        }
    }

    /// Best-effort removal of the per-document output directory.
    pub async fn cleanup(&self, pdf_path: &Path) {
        let Ok(stem) = file_stem(pdf_path) else {
            return;
        };
        let document_dir = self.output_dir.join(stem);
        if let Err(error) = tokio::fs::remove_dir_all(&document_dir).await {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %document_dir.display(), %error, "ocr cleanup failed");
            }
        }
    }
}

fn file_stem(path: &Path) -> Result<String, IntakeError> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_string())
        .ok_or_else(|| IntakeError::MissingFileName(path.display().to_string()))
}

fn collect_markdown(directory: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for entry in WalkDir::new(directory).into_iter().filter_map(|item| item.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_markdown = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
        if !is_markdown {
            continue;
        }
        if let Ok(text) = std::fs::read_to_string(entry.path()) {
            if !text.trim().is_empty() {
                parts.push(text);
            }
        }
    }

    if parts.is_empty() {
        None
    } else {
        parts.sort();
        Some(parts.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn markdown_collection_is_recursive_and_skips_empty() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("auto");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("page1.md"), "# 第一页").unwrap();
        fs::write(nested.join("page2.md"), "第二页").unwrap();
        fs::write(nested.join("empty.md"), "   ").unwrap();
        fs::write(nested.join("image.png"), b"binary").unwrap();

        let text = collect_markdown(dir.path()).unwrap();
        assert!(text.contains("第一页"));
        assert!(text.contains("第二页"));
        assert!(!text.contains("binary"));
    }

    #[test]
    fn missing_directory_yields_none() {
        assert!(collect_markdown(Path::new("/definitely/not/here")).is_none());
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let dir = tempdir().unwrap();
        let engine = OcrEngine::new("no-such-ocr-binary", dir.path(), 5);
        assert!(!engine.is_available().await);
    }

    #[tokio::test]
    async fn missing_file_fails_before_spawn() {
        let dir = tempdir().unwrap();
        let engine = OcrEngine::new("no-such-ocr-binary", dir.path(), 5);
        let result = engine.extract_text(Path::new("/tmp/nope.pdf")).await;
        assert!(matches!(result, Err(IntakeError::OcrFailed(_))));
    }
}
