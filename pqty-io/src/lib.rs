use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use pqty_core::document::PlantDocument;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// 文件头中的格式标记。
pub const FORMAT_TAG: &str = "pqty-document";
/// 当前写出的格式版本。
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<PlantDocument, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &PlantDocument, path: &Path) -> Result<(), IoError>;
}

#[derive(Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    document: PlantDocument,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format: &'static str,
    version: u32,
    document: &'a PlantDocument,
}

/// JSON 图纸读写。保存时先写入同目录的临时文件再改名，
/// 中途失败不会破坏原文件。
#[derive(Debug, Clone, Default)]
pub struct JsonFacade {
    pretty: bool,
}

impl JsonFacade {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn parse_str(&self, data: &str, path: &Path) -> Result<PlantDocument, IoError> {
        let envelope: Envelope =
            serde_json::from_str(data).map_err(|source| IoError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if envelope.format != FORMAT_TAG {
            return Err(IoError::InvalidDocument(format!(
                "unexpected format tag `{}`",
                envelope.format
            )));
        }
        if envelope.version > FORMAT_VERSION {
            return Err(IoError::InvalidDocument(format!(
                "unsupported format version {} (newest known: {FORMAT_VERSION})",
                envelope.version
            )));
        }
        Ok(envelope.document)
    }

    pub fn encode(&self, document: &PlantDocument) -> Result<String, IoError> {
        let envelope = EnvelopeRef {
            format: FORMAT_TAG,
            version: FORMAT_VERSION,
            document,
        };
        let encoded = if self.pretty {
            serde_json::to_string_pretty(&envelope)
        } else {
            serde_json::to_string(&envelope)
        };
        encoded.map_err(|err| IoError::InvalidDocument(err.to_string()))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// 先写入 `<path>.tmp` 再改名覆盖目标；任一步失败都会删除临时文件。
fn write_atomically<F>(path: &Path, write: F) -> Result<(), IoError>
where
    F: FnOnce(&mut fs::File) -> std::io::Result<()>,
{
    let tmp = temp_path(path);
    let written = fs::File::create(&tmp).and_then(|mut file| {
        write(&mut file)?;
        file.sync_all()
    });
    if let Err(source) = written {
        let _ = fs::remove_file(&tmp);
        return Err(IoError::WriteError { path: tmp, source });
    }
    if let Err(source) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(IoError::WriteError {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

impl DocumentLoader for JsonFacade {
    fn load(&self, path: &Path) -> Result<PlantDocument, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let document = self.parse_str(&data, path)?;
        info!(
            path = %path.display(),
            entities = document.entities().count(),
            rows = document.rows().count(),
            "已载入图纸"
        );
        Ok(document)
    }
}

impl DocumentSaver for JsonFacade {
    fn save(&self, document: &PlantDocument, path: &Path) -> Result<(), IoError> {
        let encoded = self.encode(document)?;
        write_atomically(path, |file| file.write_all(encoded.as_bytes()))?;
        debug!(path = %path.display(), bytes = encoded.len(), "已写出图纸");
        Ok(())
    }
}
