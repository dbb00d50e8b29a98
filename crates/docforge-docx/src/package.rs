//! The zip container of a `.docx` file.

use docforge_core::{ForgeError, Result};
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub(crate) fn zip_error(err: zip::result::ZipError) -> ForgeError {
    ForgeError::ZipError(err.to_string())
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
}

/// Every entry of the archive, in archive order.
#[derive(Debug, Clone, Default)]
pub struct Package {
    entries: Vec<Entry>,
}

impl Package {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(zip_error)?;
            if file.encrypted() {
                return Err(ForgeError::ZipError(format!(
                    "{} is encrypted",
                    file.name()
                )));
            }
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                name: file.name().to_string(),
                is_dir: file.is_dir(),
                data,
            });
        }
        Ok(Self { entries })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name && !e.is_dir)
            .map(|e| e.data.as_slice())
    }

    /// Contents of an entry that must exist.
    pub fn require(&self, name: &str) -> Result<&[u8]> {
        self.get(name)
            .ok_or_else(|| ForgeError::TemplateError(format!("missing {name} in package")))
    }

    /// Replace an entry's contents, adding it when absent.
    pub fn set(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(Entry {
                name: name.to_string(),
                data,
                is_dir: false,
            }),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);
        for entry in &self.entries {
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)
                    .map_err(zip_error)?;
            } else {
                zip.start_file(entry.name.as_str(), options)
                    .map_err(zip_error)?;
                zip.write_all(&entry.data)?;
            }
        }
        let cursor = zip.finish().map_err(zip_error)?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> = FileOptions::default();
        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_roundtrip_keeps_order_and_content() {
        let bytes = archive(&[("[Content_Types].xml", "<Types/>"), ("word/document.xml", "<w:document/>")]);
        let mut package = Package::from_bytes(&bytes).unwrap();
        package.set("word/document.xml", b"<changed/>".to_vec());
        let reread = Package::from_bytes(&package.to_bytes().unwrap()).unwrap();
        assert_eq!(
            reread.names().collect::<Vec<_>>(),
            vec!["[Content_Types].xml", "word/document.xml"]
        );
        assert_eq!(reread.get("word/document.xml"), Some(&b"<changed/>"[..]));
    }

    #[test]
    fn test_missing_entry() {
        let package = Package::from_bytes(&archive(&[("a.xml", "<a/>")])).unwrap();
        assert!(package.contains("a.xml"));
        assert!(package.require("word/document.xml").is_err());
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            Package::from_bytes(b"plain text"),
            Err(ForgeError::ZipError(_))
        ));
    }
}
