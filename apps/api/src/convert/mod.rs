//! PDF-to-image conversion.
//!
//! Only the first page is rendered: the inference call works from a single
//! preview image of the resume.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::storage::FilePayload;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("{0}")]
    Failed(String),

    #[error("converter I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait PdfRasterizer: Send + Sync {
    async fn convert(&self, document: &FilePayload) -> Result<FilePayload, ConversionError>;
}

/// Renders page one of a PDF to PNG with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    binary: String,
    dpi: u32,
    timeout: Duration,
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<String>, dpi: u32, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            dpi,
            timeout,
        }
    }
}

#[async_trait]
impl PdfRasterizer for PdftoppmRasterizer {
    async fn convert(&self, document: &FilePayload) -> Result<FilePayload, ConversionError> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("input.pdf");
        let output_stem = scratch.path().join("page");
        tokio::fs::write(&input, &document.bytes).await?;

        let mut command = Command::new(&self.binary);
        command
            .arg("-png")
            .arg("-singlefile")
            .args(["-f", "1", "-l", "1"])
            .args(["-r", &self.dpi.to_string()])
            .arg(&input)
            .arg(&output_stem)
            .kill_on_drop(true);

        // Dropping the timed-out future kills the child.
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                ConversionError::Failed(format!(
                    "pdftoppm timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ConversionError::Failed(if stderr.is_empty() {
                format!("pdftoppm exited with {}", output.status)
            } else {
                stderr
            }));
        }

        let image_path = output_stem.with_extension("png");
        let image = tokio::fs::read(&image_path).await?;
        if image.is_empty() {
            return Err(ConversionError::Failed(
                "Converter produced an empty image".to_string(),
            ));
        }
        debug!("Rendered {} bytes of PNG at {} dpi", image.len(), self.dpi);

        Ok(FilePayload::new(
            image_file_name(&document.name),
            "image/png",
            Bytes::from(image),
        ))
    }
}

/// `resume.pdf` → `resume.png`.
pub fn image_file_name(document_name: &str) -> String {
    let stem = Path::new(document_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("resume");
    format!("{stem}.png")
}
