//! Finishing touches on a prepared binary: permissions, symlink, digest.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::{FetchError, Result};

/// Set the executable bits on `path`.
pub(crate) fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(FetchError::io("chmod", path))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Point `link` at `target`, replacing whatever was there.
pub(crate) fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent).map_err(FetchError::io("create", parent))?;
    }
    if std::fs::symlink_metadata(link).is_ok() {
        std::fs::remove_file(link).map_err(FetchError::io("remove", link))?;
    }

    #[cfg(unix)]
    std::os::unix::fs::symlink(target, link).map_err(FetchError::io("symlink", link))?;
    #[cfg(windows)]
    std::os::windows::fs::symlink_file(target, link).map_err(FetchError::io("symlink", link))?;

    Ok(())
}

/// Compute the SHA-256 of a file as lowercase hex.
pub(crate) async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(FetchError::io("open", path))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .map_err(FetchError::io("read", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sha256_of_known_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello");
        std::fs::write(&path, b"hello\n").unwrap();

        assert_eq!(
            sha256_file(&path).await.unwrap(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_make_executable() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tool");
        std::fs::write(&path, b"").unwrap();

        make_executable(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn test_replace_symlink_repoints() {
        let temp = TempDir::new().unwrap();
        let old = temp.path().join("convco-0.3.6");
        let new = temp.path().join("convco-0.3.7");
        std::fs::write(&old, b"old").unwrap();
        std::fs::write(&new, b"new").unwrap();
        let link = temp.path().join("bin").join("convco");

        replace_symlink(&old, &link).unwrap();
        replace_symlink(&new, &link).unwrap();
        assert_eq!(std::fs::read_link(&link).unwrap(), new);
    }

    #[cfg(unix)]
    #[test]
    fn test_replace_dangling_symlink() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("tool");
        std::fs::write(&target, b"x").unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(temp.path().join("gone"), &link).unwrap();

        replace_symlink(&target, &link).unwrap();
        assert_eq!(std::fs::read_link(&link).unwrap(), target);
    }
}
