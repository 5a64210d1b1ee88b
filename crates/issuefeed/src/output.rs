use crate::{GeneratorConfig, IssueFeedError, IssueFeedResult, Record};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Version tag stamped into every output document.
pub const OUTPUT_VERSION: &str = "v3.0";
pub const DEFAULT_OUTPUT_DIR: &str = "json";

#[derive(Clone, Debug, Serialize)]
pub struct OutputDocument<'a> {
    pub version: &'static str,
    pub config: &'a GeneratorConfig,
    pub label: &'a str,
    pub content: Vec<&'a Record>,
}

impl OutputDocument<'_> {
    pub fn file_name(&self) -> String {
        format!("{}.json", self.label)
    }
}

/// Writes `<label>.json` for every document into `dir`, creating it when
/// missing. Files are replaced atomically through a temporary sibling.
pub fn write_documents(
    dir: &Path,
    documents: &[OutputDocument<'_>],
) -> IssueFeedResult<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|error| {
        IssueFeedError::Output(format!(
            "failed to create output directory '{}': {}",
            dir.display(),
            error
        ))
    })?;

    let mut written = Vec::with_capacity(documents.len());
    for document in documents {
        let path = dir.join(document.file_name());
        let bytes = serde_json::to_vec_pretty(document).map_err(|error| {
            IssueFeedError::Output(format!(
                "failed to serialize document '{}': {}",
                document.label, error
            ))
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|error| {
            IssueFeedError::Output(format!(
                "failed writing output file '{}': {}",
                tmp.display(),
                error
            ))
        })?;
        fs::rename(&tmp, &path).map_err(|error| {
            IssueFeedError::Output(format!(
                "failed renaming output file '{}': {}",
                path.display(),
                error
            ))
        })?;
        tracing::info!(file = %path.display(), records = document.content.len(), "generated file");
        written.push(path);
    }
    Ok(written)
}
