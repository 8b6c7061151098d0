//! Prompt → generated image → 128×128 PNG on disk.
//!
//! Every step is a hard sequence point. Nothing touches the output directory
//! until the icon is fully resized and encoded in memory, and the final file
//! only appears through a rename.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::Serialize;

use crate::context::{RequestContext, UsageTracker};
use crate::error::IconError;
use crate::naming::{FileNaming, icon_filename, icon_stem};
use crate::provider::{ImageReference, ImageRequest};

/// Edge of every saved icon, in pixels.
pub const ICON_EDGE: u32 = 128;
pub const DEFAULT_SOURCE_EDGE: u32 = 1024;

/// Square sizes the image model accepts for a generation request.
pub fn supported_source_edges(image_model: &str) -> &'static [u32] {
    if image_model.starts_with("dall-e-2") {
        &[256, 512, 1024]
    } else {
        &[1024]
    }
}

/// Rejects a source edge the image model cannot produce or one smaller than
/// the icon itself.
pub fn validate_source_edge(image_model: &str, source_edge: u32) -> Result<(), IconError> {
    let supported = supported_source_edges(image_model);
    if source_edge >= ICON_EDGE && supported.contains(&source_edge) {
        return Ok(());
    }
    let sizes = supported
        .iter()
        .map(|edge| format!("{edge}x{edge}"))
        .collect::<Vec<String>>()
        .join(", ");
    Err(IconError::InvalidRequest(format!(
        "source size {source_edge}x{source_edge} is not supported by '{image_model}' (supported: {sizes})"
    )))
}

/// Download transport for generated image payloads.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, IconError>;
}

/// Fetches over HTTP with a client scoped to the single download, so its
/// connections are released when the call returns on either path.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, IconError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| IconError::Download(format!("failed to build download client: {e}")))?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| IconError::Download(e.to_string()))?
            .error_for_status()
            .map_err(|e| IconError::Download(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| IconError::Download(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub image_model: String,
    pub quality: String,
    pub source_edge: u32,
    pub output_dir: PathBuf,
    pub naming: FileNaming,
}

impl PipelineSettings {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_model: "dall-e-3".to_string(),
            quality: "standard".to_string(),
            source_edge: DEFAULT_SOURCE_EDGE,
            output_dir: output_dir.into(),
            naming: FileNaming::Plain,
        }
    }
}

/// The terminal artifact of a successful task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedIcon {
    pub path: PathBuf,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

impl SavedIcon {
    pub fn status(&self) -> String {
        format!("Icon generated and saved to: {}", self.filename)
    }
}

pub struct ImagePipeline {
    settings: PipelineSettings,
    fetcher: Arc<dyn ImageFetcher>,
}

impl ImagePipeline {
    pub fn new(settings: PipelineSettings, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { settings, fetcher }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn generate(
        &self,
        prompt: &str,
        request: &RequestContext,
        usage: &UsageTracker,
    ) -> Result<SavedIcon, IconError> {
        let settings = &self.settings;

        // 1. request
        usage.begin_request()?;
        let image_request = ImageRequest::square(
            &settings.image_model,
            prompt,
            settings.source_edge,
            &settings.quality,
        );
        tracing::info!(
            model = %settings.image_model,
            size = %image_request.size,
            "requesting image generation"
        );
        let reference = request.generator().generate(&image_request).await?;
        usage.record_image();

        // 2. retrieve
        let payload = match reference {
            ImageReference::Url(url) => {
                tracing::debug!(url = %url, "downloading generated image");
                self.fetcher.fetch(&url).await?
            }
            ImageReference::Inline(bytes) => bytes,
        };
        tracing::debug!(bytes = payload.len(), "image payload retrieved");

        // 3-4. decode and resample
        let icon = resize_icon(&payload, ICON_EDGE)?;

        // 5. name, 6. encode and persist
        let png = encode_png(&icon)?;
        let stem = icon_stem(request.art_style(), request.description());
        let path = persist_icon(&settings.output_dir, &stem, settings.naming, &png).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::info!(file = %path.display(), bytes = png.len(), "icon saved");
        Ok(SavedIcon {
            path,
            filename,
            width: icon.width(),
            height: icon.height(),
            bytes: png.len(),
        })
    }
}

pub fn resize_icon(payload: &[u8], target_edge: u32) -> Result<DynamicImage, IconError> {
    let decoded =
        image::load_from_memory(payload).map_err(|e| IconError::Decode(e.to_string()))?;
    Ok(decoded.resize_exact(target_edge, target_edge, FilterType::Lanczos3))
}

pub fn encode_png(icon: &DynamicImage) -> Result<Vec<u8>, IconError> {
    let mut png = Vec::new();
    icon.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| IconError::Encode(e.to_string()))?;
    Ok(png)
}

async fn path_exists(path: &Path) -> Result<bool, IconError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| IconError::filesystem(path, e))
}

/// First free `{base}.png`, `{base}_2.png`, ... where `base` is the stem,
/// plus a unix-millisecond stamp under timestamp naming.
async fn choose_destination(
    output_dir: &Path,
    stem: &str,
    naming: FileNaming,
) -> Result<PathBuf, IconError> {
    let base = match naming {
        FileNaming::Plain => stem.to_string(),
        FileNaming::Timestamp => format!("{stem}_{}", chrono::Utc::now().timestamp_millis()),
    };

    let first = output_dir.join(icon_filename(&base, None));
    if !path_exists(&first).await? {
        return Ok(first);
    }
    let mut counter = 2u32;
    loop {
        let candidate = output_dir.join(icon_filename(&base, Some(&counter.to_string())));
        if !path_exists(&candidate).await? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

/// Writes `png` to a hidden sibling and renames it into place.
pub async fn persist_icon(
    output_dir: &Path,
    stem: &str,
    naming: FileNaming,
    png: &[u8],
) -> Result<PathBuf, IconError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| IconError::filesystem(output_dir, e))?;

    let destination = choose_destination(output_dir, stem, naming).await?;
    let partial = output_dir.join(format!(
        ".{}.partial",
        destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| stem.to_string())
    ));

    if let Err(err) = tokio::fs::write(&partial, png).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(IconError::filesystem(&partial, err));
    }
    if let Err(err) = tokio::fs::rename(&partial, &destination).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(IconError::filesystem(&destination, err));
    }

    Ok(destination)
}
