//! Mapping of request dataset names onto the mounted volumes.
//!
//! Dataset names come straight from the request body and are treated as
//! untrusted: only plain relative names (optionally nested) are accepted, so
//! a resolved path can never leave its mount root.

use crate::{Error, Result, config::StorageConfig};
use std::path::{Component, Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

impl ResolvedPaths {
    pub fn resolve(
        storage: &StorageConfig,
        input_dataset: &str,
        output_dataset: &str,
    ) -> Result<Self> {
        Ok(Self {
            input_path: resolve(&storage.input_root, input_dataset)?,
            output_path: resolve(&storage.output_root, output_dataset)?,
        })
    }
}

pub fn resolve(root: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() {
        return Err(Error::invalid_parameters("dataset name is empty"));
    }

    let mut path = root.to_path_buf();
    let mut has_normal = false;
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                has_normal = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                warn!("Rejected dataset name escaping its mount root: {:?}", name);
                return Err(Error::invalid_parameters(format!(
                    "dataset name must be a relative path inside the mount: {name}"
                )));
            }
        }
    }

    if !has_normal {
        return Err(Error::invalid_parameters(format!(
            "dataset name does not name a file: {name}"
        )));
    }

    Ok(path)
}
