use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))
}

/// Create `dir` and any missing parents.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Write through a sibling temp file so readers never observe a partial file.
pub fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = std::env::temp_dir().join("vchunk_file_utils_test");
        ensure_dir(&dir).unwrap();
        let path = dir.join("blob.bin");
        write_file(&path, &[1, 2, 3]).unwrap();
        assert_eq!(read_file(&path).unwrap(), vec![1, 2, 3]);
        assert!(!dir.join("blob.bin.part").exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_read_missing_mentions_path() {
        let err = read_file(Path::new("/nonexistent/vchunk/file")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/vchunk/file"));
    }
}
