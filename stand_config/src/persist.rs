use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Hidden sibling of `path`; `config.txt` becomes `.config.txt.tmp`.
fn staging_path(path: &Path) -> io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", path.display()),
        )
    })?;
    let mut staged = std::ffi::OsString::from(".");
    staged.push(name);
    staged.push(".tmp");
    Ok(path.with_file_name(staged))
}

/// Replace the settings file in one rename. A power cut mid-write leaves the
/// previous contents, never a truncated file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let staged = staging_path(path)?;
    let mut f = File::create(&staged)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    drop(f);
    if let Err(e) = fs::rename(&staged, path) {
        let _ = fs::remove_file(&staged);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_file_is_a_hidden_sibling() {
        let p = staging_path(Path::new("/card/config.txt")).unwrap();
        assert_eq!(p, PathBuf::from("/card/.config.txt.tmp"));
    }

    #[test]
    fn replaces_contents_and_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        fs::write(&path, "*TN:1;\n").unwrap();
        write_atomic(&path, b"*TN:2;\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "*TN:2;\n");
        assert!(!dir.path().join(".config.txt.tmp").exists());
    }
}
