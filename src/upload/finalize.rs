//! Turns a finished part upload into a sendable media reference.

use serde::{Deserialize, Serialize};

use crate::coordinator::TransferOutcome;
use crate::provider::{MediaAttributes, MediaDescriptor};
use crate::upload::error::{UploadError, UploadResult};
use crate::upload::sink::SizeClass;

const DEFAULT_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Self {
        match mime {
            "image/jpeg" | "image/png" | "image/webp" => MediaKind::Photo,
            m if m.starts_with("video/") => MediaKind::Video,
            m if m.starts_with("audio/") => MediaKind::Audio,
            _ => MediaKind::Document,
        }
    }
}

/// Reference to uploaded parts, shaped after the upload API that received them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputFile {
    Small {
        id: i64,
        parts: u32,
        name: String,
        md5_checksum: String,
    },
    Big {
        id: i64,
        parts: u32,
        name: String,
    },
}

impl InputFile {
    pub fn id(&self) -> i64 {
        match self {
            InputFile::Small { id, .. } | InputFile::Big { id, .. } => *id,
        }
    }

    pub fn parts(&self) -> u32 {
        match self {
            InputFile::Small { parts, .. } | InputFile::Big { parts, .. } => *parts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedMedia {
    pub file: InputFile,
    pub mime: String,
    pub kind: MediaKind,
    #[serde(skip_serializing_if = "MediaAttributes::is_empty", default)]
    pub attributes: MediaAttributes,
}

#[derive(Debug, Clone)]
pub struct FinalizeRequest {
    pub file_id: i64,
    pub total_parts: u32,
    pub size_class: SizeClass,
    pub md5: Option<[u8; 16]>,
    pub filename: String,
    pub mime: String,
    pub attributes: MediaAttributes,
}

impl FinalizeRequest {
    pub fn new(outcome: &TransferOutcome, descriptor: &MediaDescriptor) -> Self {
        Self {
            file_id: outcome.file_id,
            total_parts: outcome.parts,
            size_class: outcome.size_class,
            md5: outcome.checksum,
            filename: descriptor.filename.clone(),
            mime: descriptor.mime.clone(),
            attributes: descriptor.attributes.clone(),
        }
    }
}

pub trait Finalizer: Send + Sync {
    fn finalize(&self, request: FinalizeRequest) -> UploadResult<FinishedMedia>;
}

/// Builds [`FinishedMedia`] locally without contacting the chat side.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputFileFinalizer;

impl Finalizer for InputFileFinalizer {
    fn finalize(&self, request: FinalizeRequest) -> UploadResult<FinishedMedia> {
        let mime = if request.mime.is_empty() {
            mime_from_filename(&request.filename).to_string()
        } else {
            request.mime
        };
        let kind = MediaKind::from_mime(&mime);

        let file = match request.size_class {
            SizeClass::Small => {
                let md5 = request.md5.ok_or(UploadError::MissingChecksum)?;
                InputFile::Small {
                    id: request.file_id,
                    parts: request.total_parts,
                    name: request.filename,
                    md5_checksum: hex::encode(md5),
                }
            }
            SizeClass::Big if kind == MediaKind::Photo => {
                return Err(UploadError::Unsupported(SizeClass::Big));
            }
            SizeClass::Big => InputFile::Big {
                id: request.file_id,
                parts: request.total_parts,
                name: request.filename,
            },
        };

        Ok(FinishedMedia {
            file,
            mime,
            kind,
            attributes: request.attributes,
        })
    }
}

/// Guess a MIME type from the filename extension.
pub fn mime_from_filename(filename: &str) -> &'static str {
    let ext = match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return DEFAULT_MIME,
    };

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => DEFAULT_MIME,
    }
}
