use crate::{Error, Result};
use image::{ImageFormat, RgbImage};
use std::{
    io::Cursor,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

/// Picks the encoder from the output file extension.
pub fn output_format(path: &Path) -> Result<ImageFormat> {
    let unsupported = || {
        Error::invalid_parameters(format!(
            "unsupported output image type: {}",
            path.display()
        ))
    };

    match ImageFormat::from_path(path).map_err(|_| unsupported())? {
        format @ (ImageFormat::Png
        | ImageFormat::Jpeg
        | ImageFormat::Bmp
        | ImageFormat::Tiff
        | ImageFormat::Tga
        | ImageFormat::Pnm) => Ok(format),
        _ => Err(unsupported()),
    }
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format)?;
    Ok(buffer.into_inner())
}

/// Writes `image` to `path` so readers only ever see the old file or the
/// complete new one. The bytes land in a hidden sibling first and are
/// renamed over the target; the sibling is removed on every failure path.
pub async fn write_atomic(path: &Path, image: RgbImage, format: ImageFormat) -> Result<()> {
    let bytes = tokio::task::spawn_blocking(move || encode(&image, format)).await??;

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::invalid_parameters(format!("not a file path: {}", path.display())))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).await?;

    let temp_path = parent.join(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        Uuid::new_v4().simple()
    ));

    let result = write_then_rename(&temp_path, path, &bytes).await;
    if result.is_err() {
        if let Err(e) = fs::remove_file(&temp_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove temporary file {}: {}",
                    temp_path.display(),
                    e
                );
            }
        }
    }
    result
}

async fn write_then_rename(temp_path: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(temp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(temp_path, path).await?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
