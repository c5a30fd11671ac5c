//! Tesseract command-line OCR engine

use super::OcrEngine;
use crate::error::{Error, Result};
use crate::pdf::PageImage;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

/// OCR by piping PNG pages through the `tesseract` binary
#[derive(Debug, Clone)]
pub struct TesseractCli {
    command: String,
    language: Option<String>,
}

impl TesseractCli {
    pub fn new(command: impl Into<String>, language: Option<String>) -> Self {
        Self {
            command: command.into(),
            language,
        }
    }

    /// Return an engine only if `<command> --version` runs successfully
    pub fn probe(command: &str, language: Option<String>) -> Option<Self> {
        match Command::new(command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => {
                tracing::info!(command, language = ?language, "Tesseract OCR available");
                Some(Self::new(command, language))
            }
            Ok(status) => {
                tracing::warn!(command, %status, "Tesseract --version failed, OCR disabled");
                None
            }
            Err(e) => {
                tracing::warn!(command, error = %e, "Tesseract not found, OCR disabled");
                None
            }
        }
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.arg("stdin").arg("stdout");
        if let Some(lang) = &self.language {
            cmd.arg("-l").arg(lang);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &PageImage) -> Result<String> {
        let png = image.encode_png()?;

        let mut child = self.build_command().spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => Error::OcrUnavailable {
                command: self.command.clone(),
            },
            _ => Error::Io(e),
        })?;

        // Feed stdin from a separate thread so a full stdout pipe can't deadlock us
        let mut stdin = child.stdin.take().ok_or_else(|| Error::Ocr {
            reason: "tesseract stdin not captured".to_string(),
        })?;
        let writer = std::thread::spawn(move || stdin.write_all(&png));

        let output = child.wait_with_output()?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Io(e)),
            Err(_) => {
                return Err(Error::Ocr {
                    reason: "stdin writer panicked".to_string(),
                })
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Ocr {
                reason: format!("page {}: {} ({})", image.page, stderr.trim(), output.status),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
