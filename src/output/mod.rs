//! Output delivery: route a rendered artifact to a served link, a saved
//! file path, or the raw payload.

use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

use crate::render::{DeliveryMode, RenderOutput};

mod files;

pub use files::{FileData, FileManager, ALLOWED_EXTENSIONS};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("unsupported file format: {0}")]
    UnsupportedExtension(String),
    #[error("path {path} is outside the allowed directories ({allowed})")]
    OutsideAllowedDirs { path: String, allowed: String },
    #[error("payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("decoded payload is empty")]
    EmptyPayload,
    #[error("payload is not SVG markup")]
    NotSvgMarkup,
    #[error("failed to write rendered output: {0}")]
    Io(#[from] io::Error),
}

/// Where a delivered artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    Link(String),
    File(PathBuf),
    Raw(String),
}

impl Delivered {
    pub fn output_type(&self) -> &'static str {
        match self {
            Self::Link(_) => "link",
            Self::File(_) => "filepath",
            Self::Raw(_) => "raw",
        }
    }

    pub fn into_data(self) -> String {
        match self {
            Self::Link(url) => url,
            Self::File(path) => path.display().to_string(),
            Self::Raw(payload) => payload,
        }
    }
}

/// Routes rendered output through one of the three delivery mechanisms.
#[derive(Debug, Clone)]
pub struct OutputRouter {
    files: FileManager,
    base_url: String,
}

impl OutputRouter {
    pub fn new(files: FileManager, base_url: String) -> Self {
        Self { files, base_url }
    }

    pub fn purge_temp_dir(&self) -> usize {
        self.files.purge()
    }

    /// Deliver `output` according to `mode`. A caller-supplied `file_path` is
    /// honored only for `filepath` delivery; `link` always uses a generated
    /// temp name so the URL stays under the served static root.
    pub fn deliver(
        &self,
        output: &RenderOutput,
        mode: DeliveryMode,
        file_path: Option<&Path>,
    ) -> Result<Delivered, DeliveryError> {
        match mode {
            DeliveryMode::Raw => Ok(Delivered::Raw(output.payload.clone())),
            DeliveryMode::FilePath => {
                let data = prepare_payload(output)?;
                match file_path {
                    Some(path) => Ok(Delivered::File(self.files.store_at(path, &data)?)),
                    None => {
                        let name = self.files.store(&data, output.format.extension())?;
                        Ok(Delivered::File(self.files.temp_dir().join(name)))
                    }
                }
            }
            DeliveryMode::Link => {
                let data = prepare_payload(output)?;
                let name = self.files.store(&data, output.format.extension())?;
                Ok(Delivered::Link(format!("{}/static/{}", self.base_url, name)))
            }
        }
    }
}

/// Validate the payload for filesystem delivery: vector markup must actually
/// be SVG, binary payloads must decode to a non-empty buffer. A violation is
/// a hard failure, never a silent fallback to another mode.
fn prepare_payload(output: &RenderOutput) -> Result<FileData, DeliveryError> {
    if output.format.is_vector() {
        if !output.payload.trim_start().starts_with("<svg") {
            return Err(DeliveryError::NotSvgMarkup);
        }
        return Ok(FileData::Text(output.payload.clone()));
    }
    let bytes = BASE64.decode(output.payload.as_bytes())?;
    if bytes.is_empty() {
        return Err(DeliveryError::EmptyPayload);
    }
    Ok(FileData::Bytes(bytes))
}
