//! SHA-512 digests for staged artifacts.

use std::path::Path;

use sha2::{Digest, Sha512};
use tokio::io::AsyncReadExt;

use crate::core::error::{ResolveError, ResolveResult};

/// Buffer size for reading files during digest calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Lowercase hexadecimal SHA-512 of a file's contents.
pub async fn sha512_file(path: &Path) -> ResolveResult<String> {
    let io_err = |source| ResolveError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::open(path).await.map_err(io_err)?;
    let mut hasher = Sha512::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).await.map_err(io_err)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compare the digest of `path` with the registry-declared `expected` digest.
///
/// Returns the computed digest on success.
pub async fn verify_sha512(path: &Path, filename: &str, expected: &str) -> ResolveResult<String> {
    let actual = sha512_file(path).await?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(ResolveError::IntegrityMismatch {
            filename: filename.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(actual)
}

#[cfg(test)]
pub(crate) fn sha512_hex(bytes: &[u8]) -> String {
    hex::encode(Sha512::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn digest_of_known_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();

        let digest = sha512_file(&path).await.unwrap();
        assert_eq!(
            digest,
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[tokio::test]
    async fn mismatch_reports_both_digests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jar");
        std::fs::write(&path, b"payload").unwrap();

        let err = verify_sha512(&path, "a.jar", "00ff").await.unwrap_err();
        match err {
            ResolveError::IntegrityMismatch {
                filename,
                expected,
                actual,
            } => {
                assert_eq!(filename, "a.jar");
                assert_eq!(expected, "00ff");
                assert_eq!(actual, sha512_hex(b"payload"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn uppercase_declared_digest_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jar");
        std::fs::write(&path, b"payload").unwrap();

        let expected = sha512_hex(b"payload").to_uppercase();
        assert!(verify_sha512(&path, "a.jar", &expected).await.is_ok());
    }
}
