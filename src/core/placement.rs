use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::downloader::Artifact;
use crate::core::error::{ResolveError, ResolveResult};

/// Copy verified artifacts from staging into `output_dir`.
///
/// Creates `output_dir` (and parents) as needed. Files are written under
/// their original name with owner-only read/write permissions; an existing
/// file of the same name is overwritten, so the last artifact wins.
pub async fn place(artifacts: &[Artifact], output_dir: &Path) -> ResolveResult<Vec<PathBuf>> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|source| ResolveError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;

    let mut placed = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let dest = output_dir.join(&artifact.filename);
        tokio::fs::copy(&artifact.path, &dest)
            .await
            .map_err(|source| ResolveError::Io {
                path: dest.clone(),
                source,
            })?;
        restrict_permissions(&dest).await?;

        debug!("Placed {} at {:?}", artifact, dest);
        placed.push(dest);
    }

    Ok(placed)
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> ResolveResult<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|source| ResolveError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> ResolveResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::integrity::{sha512_file, sha512_hex};

    fn staged(dir: &Path, filename: &str, content: &[u8]) -> Artifact {
        let path = dir.join(filename);
        std::fs::write(&path, content).unwrap();
        Artifact {
            project_id: "P1".into(),
            version_id: "V1".into(),
            version_name: "P1 V1".into(),
            version_number: "1.0.0".into(),
            filename: filename.into(),
            path,
            sha512: sha512_hex(content),
        }
    }

    #[tokio::test]
    async fn placed_file_matches_verified_digest() {
        let staging = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let artifact = staged(staging.path(), "a.jar", b"jar bytes");
        let target = output.path().join("mods").join("server");

        let placed = place(std::slice::from_ref(&artifact), &target).await.unwrap();

        assert_eq!(placed, [target.join("a.jar")]);
        assert_eq!(std::fs::read(&placed[0]).unwrap(), b"jar bytes");
        assert_eq!(sha512_file(&placed[0]).await.unwrap(), artifact.sha512);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn placed_files_are_owner_read_write_only() {
        use std::os::unix::fs::PermissionsExt;

        let staging = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let artifact = staged(staging.path(), "a.jar", b"jar bytes");

        let placed = place(&[artifact], output.path()).await.unwrap();

        let mode = std::fs::metadata(&placed[0]).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn same_filename_last_writer_wins() {
        let staging_a = tempfile::tempdir().unwrap();
        let staging_b = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let first = staged(staging_a.path(), "lib.jar", b"first");
        let second = staged(staging_b.path(), "lib.jar", b"second");

        place(&[first, second], output.path()).await.unwrap();

        assert_eq!(std::fs::read(output.path().join("lib.jar")).unwrap(), b"second");
    }
}
