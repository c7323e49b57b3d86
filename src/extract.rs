//! Content extraction: raw upload bytes to plain text.
//!
//! Dispatch is an exhaustive match over [`FileKind`]:
//!
//! | Kind | Strategy | Empty result |
//! |------|----------|--------------|
//! | `txt` | UTF-8 decode, invalid sequences become U+FFFD | `Some("")` |
//! | `pdf` | `pdf-extract` per page, pages joined by `\n` | placeholder text |
//! | `image` | greyscale + contrast stretch, PNG, OCR engine | `None` |
//!
//! Every collaborator failure (PDF parse error or panic, image decode
//! error, OCR process failure, timeout) becomes
//! [`VaultError::ExtractionFailed`].

use std::io::Cursor;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use docvault_core::models::FileKind;
use docvault_core::{Result, VaultError};

use crate::config::ExtractionConfig;

/// Content stored for a PDF with no recoverable text.
pub fn pdf_placeholder(size_bytes: usize) -> String {
    format!("[PDF document: {} bytes; no extractable text]", size_bytes)
}

/// Optical character recognition over a PNG image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, png: Vec<u8>) -> anyhow::Result<String>;
}

/// Runs the `tesseract` executable: `tesseract stdin stdout -l <lang>`.
pub struct TesseractOcr {
    command: String,
    language: String,
    timeout: Duration,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            config.ocr_command.clone(),
            config.ocr_language.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn run(&self, png: Vec<u8>) -> anyhow::Result<String> {
        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start OCR command '{}'", self.command))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("OCR process stdin unavailable"))?;
        stdin.write_all(&png).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, png: Vec<u8>) -> anyhow::Result<String> {
        tokio::time::timeout(self.timeout, self.run(png))
            .await
            .map_err(|_| anyhow!("OCR timed out after {:?}", self.timeout))?
    }
}

/// Turns upload bytes into document content.
pub struct Extractor {
    ocr: Arc<dyn OcrEngine>,
    timeout: Duration,
}

impl Extractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, timeout: Duration) -> Self {
        Self { ocr, timeout }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            Arc::new(TesseractOcr::from_config(config)),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Extract text from `bytes` declared as `kind`.
    ///
    /// Returns `None` only for images where OCR recognized nothing.
    pub async fn extract(&self, bytes: &[u8], kind: FileKind) -> Result<Option<String>> {
        let content = match kind {
            FileKind::Txt => Some(decode_text(bytes)),
            FileKind::Pdf => Some(self.extract_pdf(bytes).await?),
            FileKind::Image => self.extract_image(bytes).await?,
        };
        debug!(
            %kind,
            bytes = bytes.len(),
            chars = content.as_deref().map(|c| c.chars().count()).unwrap_or(0),
            "extracted content"
        );
        Ok(content)
    }

    async fn extract_pdf(&self, bytes: &[u8]) -> Result<String> {
        let data = bytes.to_vec();
        let task = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&data)
        });

        let pages = tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| {
                VaultError::extraction(FileKind::Pdf, format!("timed out after {:?}", self.timeout))
            })?
            // A panic inside the parser surfaces as a join error.
            .map_err(|e| VaultError::extraction(FileKind::Pdf, e))?
            .map_err(|e| VaultError::extraction(FileKind::Pdf, e))?;

        let text = pages.join("\n");
        if text.trim().is_empty() {
            info!(bytes = bytes.len(), "PDF has no extractable text, storing placeholder");
            return Ok(pdf_placeholder(bytes.len()));
        }
        Ok(text)
    }

    async fn extract_image(&self, bytes: &[u8]) -> Result<Option<String>> {
        let data = bytes.to_vec();
        let png = tokio::task::spawn_blocking(move || preprocess_image(&data))
            .await
            .map_err(|e| VaultError::extraction(FileKind::Image, e))?
            .map_err(|e| VaultError::extraction(FileKind::Image, e))?;

        let text = self
            .ocr
            .recognize(png)
            .await
            .map_err(|e| VaultError::extraction(FileKind::Image, e))?;

        let text = text.trim();
        if text.is_empty() {
            info!(bytes = bytes.len(), "OCR recognized no text");
            return Ok(None);
        }
        Ok(Some(text.to_string()))
    }
}

/// Decode bytes as UTF-8, replacing invalid sequences with U+FFFD.
pub fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Decode an image, convert to greyscale, stretch contrast, and encode as PNG.
pub fn preprocess_image(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes).context("Failed to decode image")?;
    let mut gray = decoded.to_luma8();
    stretch_contrast(&mut gray);

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(gray)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(png)
}

/// Linearly map the observed intensity range onto `0..=255`.
pub fn stretch_contrast(img: &mut GrayImage) {
    let (min, max) = img
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if max <= min {
        return;
    }
    let range = (max - min) as u32;
    for p in img.pixels_mut() {
        p.0[0] = (((p.0[0] - min) as u32 * 255 + range / 2) / range) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use std::sync::Mutex;

    /// Returns fixed text and records the PNG it was given.
    struct StubOcr {
        text: String,
        seen: Mutex<Vec<Vec<u8>>>,
    }

    impl StubOcr {
        fn new(text: &str) -> Arc<Self> {
            Arc::new(Self {
                text: text.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl OcrEngine for StubOcr {
        async fn recognize(&self, png: Vec<u8>) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(png);
            Ok(self.text.clone())
        }
    }

    struct FailingOcr;

    #[async_trait]
    impl OcrEngine for FailingOcr {
        async fn recognize(&self, _png: Vec<u8>) -> anyhow::Result<String> {
            bail!("tesseract exited with 1")
        }
    }

    fn low_contrast_png() -> Vec<u8> {
        let img = GrayImage::from_fn(4, 2, |x, _| Luma([100 + x as u8 * 10]));
        let mut out = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn extractor(ocr: Arc<dyn OcrEngine>) -> Extractor {
        Extractor::new(ocr, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_txt_verbatim_and_lossy() {
        let ex = extractor(StubOcr::new(""));
        let text = ex.extract("Quiet hours\n".as_bytes(), FileKind::Txt).await.unwrap();
        assert_eq!(text.as_deref(), Some("Quiet hours\n"));

        let lossy = ex.extract(&[b'o', b'k', 0xFF], FileKind::Txt).await.unwrap();
        assert_eq!(lossy.as_deref(), Some("ok\u{FFFD}"));
    }

    #[tokio::test]
    async fn test_empty_txt_is_empty_string() {
        let ex = extractor(StubOcr::new(""));
        assert_eq!(ex.extract(b"", FileKind::Txt).await.unwrap(), Some(String::new()));
    }

    #[tokio::test]
    async fn test_image_goes_through_ocr() {
        let ocr = StubOcr::new("  PARKING PERMIT 2024 \n");
        let ex = extractor(ocr.clone());
        let text = ex.extract(&low_contrast_png(), FileKind::Image).await.unwrap();
        assert_eq!(text.as_deref(), Some("PARKING PERMIT 2024"));

        let seen = ocr.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let sent = image::load_from_memory(&seen[0]).unwrap().to_luma8();
        let values: Vec<u8> = sent.pixels().map(|p| p.0[0]).collect();
        assert_eq!(*values.iter().min().unwrap(), 0);
        assert_eq!(*values.iter().max().unwrap(), 255);
    }

    #[tokio::test]
    async fn test_image_without_text_is_none() {
        let ex = extractor(StubOcr::new("   \n"));
        assert_eq!(ex.extract(&low_contrast_png(), FileKind::Image).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_undecodable_image_fails() {
        let ex = extractor(StubOcr::new("never"));
        let err = ex.extract(b"not an image", FileKind::Image).await.unwrap_err();
        assert!(matches!(err, VaultError::ExtractionFailed { kind: FileKind::Image, .. }));
    }

    #[tokio::test]
    async fn test_ocr_failure_is_extraction_failure() {
        let ex = extractor(Arc::new(FailingOcr));
        let err = ex.extract(&low_contrast_png(), FileKind::Image).await.unwrap_err();
        assert!(err.to_string().contains("image extraction failed"));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_fails() {
        let ex = extractor(StubOcr::new(""));
        let err = ex.extract(b"%PDF-1.4 garbage", FileKind::Pdf).await.unwrap_err();
        assert!(matches!(err, VaultError::ExtractionFailed { kind: FileKind::Pdf, .. }));
    }

    #[tokio::test]
    async fn test_pdf_error_keeps_parser_source() {
        let ex = extractor(StubOcr::new(""));
        let err = ex.extract(b"not a pdf at all", FileKind::Pdf).await.unwrap_err();
        let source = std::error::Error::source(&err).expect("missing source");
        assert!(source.downcast_ref::<pdf_extract::OutputError>().is_some());
    }

    #[tokio::test]
    async fn test_missing_ocr_binary_fails() {
        let ocr = TesseractOcr::new("docvault-no-such-ocr-binary", "eng", Duration::from_secs(5));
        assert!(ocr.recognize(low_contrast_png()).await.is_err());
    }

    #[test]
    fn test_stretch_contrast_flat_image_unchanged() {
        let mut img = GrayImage::from_pixel(3, 3, Luma([77]));
        stretch_contrast(&mut img);
        assert!(img.pixels().all(|p| p.0[0] == 77));
    }

    #[test]
    fn test_pdf_placeholder_format() {
        assert_eq!(pdf_placeholder(512), "[PDF document: 512 bytes; no extractable text]");
    }
}
