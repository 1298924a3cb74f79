//! Physical package access: the ZIP archive beneath the OPC layer.

use crate::error::Result;
use std::io::{Cursor, Read, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Read access to the ZIP members of a package.
pub struct PhysPkgReader<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl PhysPkgReader<Cursor<Vec<u8>>> {
    /// Open a package held fully in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes))?;
        Ok(Self { archive })
    }
}

impl PhysPkgReader<std::fs::File> {
    /// Open a package file on disk.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let archive = ZipArchive::new(file)?;
        Ok(Self { archive })
    }
}

impl<R: Read + Seek> PhysPkgReader<R> {
    /// The membernames in archive order.
    pub fn membernames(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// Read the bytes of one member.
    pub fn read_member(&mut self, membername: &str) -> Result<Vec<u8>> {
        let mut member = self.archive.by_name(membername)?;
        let mut blob = Vec::with_capacity(member.size() as usize);
        member.read_to_end(&mut blob)?;
        Ok(blob)
    }
}

/// Write access to the ZIP members of a package.
pub struct PhysPkgWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    options: SimpleFileOptions,
}

impl PhysPkgWriter<Cursor<Vec<u8>>> {
    /// Create a writer backed by an in-memory buffer.
    pub fn in_memory() -> Self {
        Self::new(Cursor::new(Vec::new()))
    }

    /// Finish the archive and return its bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let mut zip = self.zip;
        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

impl<W: Write + Seek> PhysPkgWriter<W> {
    pub fn new(writer: W) -> Self {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        Self {
            zip: ZipWriter::new(writer),
            options,
        }
    }

    /// Append one member to the archive.
    pub fn write_member(&mut self, membername: &str, blob: &[u8]) -> Result<()> {
        self.zip.start_file(membername, self.options)?;
        self.zip.write_all(blob)?;
        Ok(())
    }

    /// Finish the archive, flushing the central directory.
    pub fn finish(mut self) -> Result<()> {
        self.zip.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_members() {
        let mut writer = PhysPkgWriter::in_memory();
        writer.write_member("[Content_Types].xml", b"<Types/>").unwrap();
        writer.write_member("word/document.xml", b"<w:document/>").unwrap();
        let bytes = writer.into_bytes().unwrap();

        let mut reader = PhysPkgReader::from_bytes(bytes).unwrap();
        assert_eq!(
            reader.membernames(),
            vec!["[Content_Types].xml".to_string(), "word/document.xml".to_string()]
        );
        assert_eq!(reader.read_member("word/document.xml").unwrap(), b"<w:document/>");
    }
}
