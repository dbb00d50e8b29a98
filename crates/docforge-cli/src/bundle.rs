//! Zip bundle of generated files.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Pack `files` flat into a zip at `destination`. Returns the entry count.
pub fn write_bundle(files: &[&Path], destination: &Path) -> Result<usize> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let file = File::create(destination)
        .with_context(|| format!("Failed to create bundle: {}", destination.display()))?;
    let mut zip = ZipWriter::new(file);
    let options: FileOptions<()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut names = HashSet::new();
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Not a file: {}", path.display()))?;
        if !names.insert(name.clone()) {
            log::warn!("Skipping duplicate bundle entry {name}");
            continue;
        }
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&bytes)?;
    }
    zip.finish()?;
    Ok(names.len())
}
