//! # Encrypted Repository Archive
//!
//! A self-contained, integrity-checked, password-protected container for
//! one or more repositories, written with the reserved `.clonr`
//! extension.
//!
//! Container layout:
//!
//! ```text
//! magic "CLNR" | version u8 | kdf salt [16] | mem/time/par u32 LE |
//! manifest nonce [12] | manifest len u32 LE | encrypted manifest |
//! repeated: block len u64 LE | block nonce [12] | encrypted gzip(tar)
//! ```
//!
//! Every repository is walked, packed into a tar stream, gzip-compressed
//! at the requested level, and sealed with AES-256-GCM under an Argon2id
//! key derived from the archive password. The manifest records a BLAKE3
//! checksum over the decrypted, decompressed tar payloads; extraction
//! verifies it before a single file reaches its destination, and unpacks
//! into a staging directory that is renamed into place only at the end.

use crate::crypto::{self, Encrypted, KdfParams, SymmetricKey};
use crate::error::{Result, StandaloneError};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Reserved extension for archive files.
pub const ARCHIVE_EXTENSION: &str = "clonr";

const MAGIC: &[u8; 4] = b"CLNR";
const FORMAT_VERSION: u8 = 1;

/// Options controlling archive creation.
///
/// These knobs only affect what gets included and how hard gzip works;
/// the encryption and integrity guarantees are identical regardless.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub include_vcs_metadata: bool,
    /// Gzip level, 0 (store) through 9 (best).
    pub compression_level: u32,
    pub exclude_patterns: Vec<String>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            include_vcs_metadata: true,
            compression_level: 6,
            exclude_patterns: Vec::new(),
        }
    }
}

/// Manifest written once at archive-creation time and verified on
/// extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub created_at: DateTime<Utc>,
    pub format_version: u8,
    pub total_uncompressed_size: u64,
    /// BLAKE3 of the concatenated decompressed tar payloads, hex encoded.
    pub checksum: String,
    pub compression_algorithm: String,
    pub encryption_algorithm: String,
    pub repositories: Vec<RepoArchiveEntry>,
}

/// One archived repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoArchiveEntry {
    pub name: String,
    pub source_url: Option<String>,
    pub original_path: PathBuf,
    pub file_count: u64,
    pub size: u64,
    pub last_commit: Option<String>,
    pub archived_at: DateTime<Utc>,
}

/// Create an archive of the given repository paths.
pub fn create(
    paths: &[PathBuf],
    output: &Path,
    password: &str,
    options: &ArchiveOptions,
) -> Result<ArchiveManifest> {
    if paths.is_empty() {
        return Err(StandaloneError::NotFound(
            "no repository paths to archive".to_string(),
        ));
    }

    let output = ensure_extension(output);
    let params = KdfParams::new();
    let key = crypto::derive_password_key(password.as_bytes(), &params)?;

    let mut entries = Vec::new();
    let mut blocks = Vec::new();
    let mut hasher = blake3::Hasher::new();
    let mut total_uncompressed = 0u64;

    for path in paths {
        if !path.is_dir() {
            return Err(StandaloneError::NotFound(format!(
                "repository path does not exist or is not a directory: {}",
                path.display()
            )));
        }
        let name = repo_name(path)?;
        if entries.iter().any(|e: &RepoArchiveEntry| e.name == name) {
            return Err(StandaloneError::AlreadyExists(format!(
                "repository name '{}'",
                name
            )));
        }

        let (tar_bytes, file_count, size) = pack_repository(path, options)?;
        hasher.update(&tar_bytes);
        total_uncompressed += size;

        let (source_url, last_commit) = read_git_metadata(path);
        entries.push(RepoArchiveEntry {
            name: name.clone(),
            source_url,
            original_path: path.clone(),
            file_count,
            size,
            last_commit,
            archived_at: Utc::now(),
        });

        let compressed = compress(&tar_bytes, options.compression_level)?;
        blocks.push(crypto::encrypt(&key, &compressed)?);
        debug!(
            repo = %name,
            files = file_count,
            raw = tar_bytes.len(),
            compressed = compressed.len(),
            "packed repository"
        );
    }

    let manifest = ArchiveManifest {
        created_at: Utc::now(),
        format_version: FORMAT_VERSION,
        total_uncompressed_size: total_uncompressed,
        checksum: hasher.finalize().to_hex().to_string(),
        compression_algorithm: "gzip".to_string(),
        encryption_algorithm: "aes-256-gcm".to_string(),
        repositories: entries,
    };

    write_container(&output, &params, &key, &manifest, &blocks)?;
    info!(
        archive = %output.display(),
        repositories = manifest.repositories.len(),
        "archive created"
    );
    Ok(manifest)
}

/// Decrypt and return the manifest without extracting anything.
pub fn list(archive_path: &Path, password: &str) -> Result<ArchiveManifest> {
    let raw = std::fs::read(archive_path)?;
    let (manifest, _, _) = read_container(&raw, password)?;
    Ok(manifest)
}

/// Extract the full archive into `dest_dir`.
///
/// Fails atomically: every block is decrypted, decompressed, and checked
/// against the manifest checksum in a staging directory; only then is the
/// staging directory renamed to `dest_dir`. On any failure nothing is
/// left at the destination.
pub fn extract(archive_path: &Path, dest_dir: &Path, password: &str) -> Result<ArchiveManifest> {
    let raw = std::fs::read(archive_path)?;
    let (manifest, blocks, key) = read_container(&raw, password)?;

    if blocks.len() != manifest.repositories.len() {
        return Err(StandaloneError::Integrity(format!(
            "archive holds {} blocks but the manifest lists {} repositories",
            blocks.len(),
            manifest.repositories.len()
        )));
    }
    if dest_dir.exists() && std::fs::read_dir(dest_dir)?.next().is_some() {
        return Err(StandaloneError::AlreadyExists(format!(
            "destination directory {}",
            dest_dir.display()
        )));
    }

    let staging = staging_dir(dest_dir)?;
    let result = extract_into_staging(&manifest, &blocks, &key, &staging);

    match result {
        Ok(()) => {
            if dest_dir.exists() {
                // Verified empty above
                std::fs::remove_dir(dest_dir)?;
            }
            std::fs::rename(&staging, dest_dir)?;
            info!(dest = %dest_dir.display(), "archive extracted");
            Ok(manifest)
        }
        Err(e) => {
            let _ = std::fs::remove_dir_all(&staging);
            Err(e)
        }
    }
}

fn extract_into_staging(
    manifest: &ArchiveManifest,
    blocks: &[Encrypted],
    key: &SymmetricKey,
    staging: &Path,
) -> Result<()> {
    // Verify everything before the first write: decrypt and decompress
    // all blocks, then check the payload checksum.
    let mut payloads = Vec::with_capacity(blocks.len());
    let mut hasher = blake3::Hasher::new();

    for (block, entry) in blocks.iter().zip(&manifest.repositories) {
        let compressed = crypto::decrypt(key, block).map_err(|_| {
            StandaloneError::Integrity(format!(
                "encrypted block for repository '{}' failed authentication",
                entry.name
            ))
        })?;

        let mut tar_bytes = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut tar_bytes)
            .map_err(|e| {
                StandaloneError::Integrity(format!(
                    "corrupt compressed block for repository '{}': {}",
                    entry.name, e
                ))
            })?;

        hasher.update(&tar_bytes);
        payloads.push(tar_bytes);
    }

    let checksum = hasher.finalize().to_hex().to_string();
    if checksum != manifest.checksum {
        return Err(StandaloneError::Integrity(
            "archive payload checksum does not match the manifest".to_string(),
        ));
    }

    for (tar_bytes, entry) in payloads.iter().zip(&manifest.repositories) {
        let repo_dir = staging.join(&entry.name);
        std::fs::create_dir_all(&repo_dir)?;
        tar::Archive::new(tar_bytes.as_slice())
            .unpack(&repo_dir)
            .map_err(|e| {
                StandaloneError::Integrity(format!(
                    "failed to unpack repository '{}': {}",
                    entry.name, e
                ))
            })?;
    }
    Ok(())
}

fn pack_repository(path: &Path, options: &ArchiveOptions) -> Result<(Vec<u8>, u64, u64)> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut file_count = 0u64;
    let mut size = 0u64;

    let walker = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            if !options.include_vcs_metadata && name == ".git" {
                return false;
            }
            !options
                .exclude_patterns
                .iter()
                .any(|pattern| matches_pattern(&name, pattern))
        });

    for entry in walker {
        let entry = entry.map_err(|e| StandaloneError::Io(std::io::Error::other(e)))?;
        let rel = entry
            .path()
            .strip_prefix(path)
            .expect("walked path is under its root");
        if rel.as_os_str().is_empty() {
            continue;
        }

        if entry.file_type().is_dir() {
            builder.append_path_with_name(entry.path(), rel)?;
        } else if entry.file_type().is_file() {
            builder.append_path_with_name(entry.path(), rel)?;
            file_count += 1;
            size += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
        // Symlinks and special files are skipped
    }

    let tar_bytes = builder.into_inner()?;
    Ok((tar_bytes, file_count, size))
}

/// Match a file name against an exclude pattern. `*.ext` matches by
/// suffix; anything else must match the name exactly.
fn matches_pattern(name: &str, pattern: &str) -> bool {
    match pattern.strip_prefix('*') {
        Some(suffix) => name.ends_with(suffix),
        None => name == pattern,
    }
}

fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Best-effort reading of git metadata; a repository without usable
/// metadata still archives cleanly.
fn read_git_metadata(repo: &Path) -> (Option<String>, Option<String>) {
    let git_dir = repo.join(".git");

    let source_url = std::fs::read_to_string(git_dir.join("config"))
        .ok()
        .and_then(|config| {
            config.lines().find_map(|line| {
                line.trim()
                    .strip_prefix("url = ")
                    .map(|url| url.trim().to_string())
            })
        });

    let last_commit = std::fs::read_to_string(git_dir.join("HEAD"))
        .ok()
        .and_then(|head| {
            let head = head.trim();
            match head.strip_prefix("ref: ") {
                Some(reference) => std::fs::read_to_string(git_dir.join(reference))
                    .ok()
                    .map(|commit| commit.trim().to_string()),
                None => Some(head.to_string()),
            }
        })
        .filter(|commit| !commit.is_empty());

    (source_url, last_commit)
}

fn repo_name(path: &Path) -> Result<String> {
    path.canonicalize()?
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            StandaloneError::NotFound(format!(
                "cannot determine repository name for: {}",
                path.display()
            ))
        })
}

fn ensure_extension(output: &Path) -> PathBuf {
    match output.extension() {
        Some(ext) if ext == ARCHIVE_EXTENSION => output.to_path_buf(),
        _ => {
            let mut name = output.as_os_str().to_os_string();
            name.push(format!(".{}", ARCHIVE_EXTENSION));
            PathBuf::from(name)
        }
    }
}

fn staging_dir(dest: &Path) -> Result<PathBuf> {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "extract".to_string());
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let staging = parent.join(format!(".{}.partial", name));
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    std::fs::create_dir_all(&staging)?;
    Ok(staging)
}

fn write_container(
    output: &Path,
    params: &KdfParams,
    key: &SymmetricKey,
    manifest: &ArchiveManifest,
    blocks: &[Encrypted],
) -> Result<()> {
    let manifest_json = serde_json::to_vec(manifest)?;
    let sealed_manifest = crypto::encrypt(key, &manifest_json)?;

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&params.salt);
    out.extend_from_slice(&params.mem_cost.to_le_bytes());
    out.extend_from_slice(&params.time_cost.to_le_bytes());
    out.extend_from_slice(&params.parallelism.to_le_bytes());
    out.extend_from_slice(&sealed_manifest.nonce);
    out.extend_from_slice(&(sealed_manifest.ciphertext.len() as u32).to_le_bytes());
    out.extend_from_slice(&sealed_manifest.ciphertext);

    for block in blocks {
        out.extend_from_slice(&(block.ciphertext.len() as u64).to_le_bytes());
        out.extend_from_slice(&block.nonce);
        out.extend_from_slice(&block.ciphertext);
    }

    // Write beside the target and rename so an interrupt never leaves a
    // half-written archive under the reserved extension
    let tmp = output.with_extension("clonr.tmp");
    std::fs::write(&tmp, &out)?;
    std::fs::rename(&tmp, output)?;
    Ok(())
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(StandaloneError::Decode("truncated archive".to_string()));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn take_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

fn parse_header(reader: &mut ByteReader<'_>) -> Result<(KdfParams, Encrypted)> {
    if reader.take(4)? != MAGIC {
        return Err(StandaloneError::Decode("not a clonr archive".to_string()));
    }
    let version = reader.take(1)?[0];
    if version != FORMAT_VERSION {
        return Err(StandaloneError::Decode(format!(
            "unsupported archive format version: {}",
            version
        )));
    }

    let params = KdfParams {
        salt: reader.take(16)?.try_into().unwrap(),
        mem_cost: reader.take_u32()?,
        time_cost: reader.take_u32()?,
        parallelism: reader.take_u32()?,
    };

    let nonce: [u8; 12] = reader.take(12)?.try_into().unwrap();
    let manifest_len = reader.take_u32()? as usize;
    let ciphertext = reader.take(manifest_len)?.to_vec();

    Ok((params, Encrypted { nonce, ciphertext }))
}

fn read_container(
    raw: &[u8],
    password: &str,
) -> Result<(ArchiveManifest, Vec<Encrypted>, SymmetricKey)> {
    let mut reader = ByteReader::new(raw);
    let (params, sealed_manifest) = parse_header(&mut reader)?;

    let key = crypto::derive_password_key(password.as_bytes(), &params)?;
    // The manifest is the password check: derivation always succeeds, so
    // an authentication failure here means the password is wrong, which
    // is reported distinctly from a corrupt container.
    let manifest_json =
        crypto::decrypt(&key, &sealed_manifest).map_err(|_| StandaloneError::WrongPassword)?;
    let manifest: ArchiveManifest = serde_json::from_slice(&manifest_json)
        .map_err(|e| StandaloneError::Decode(format!("corrupt archive manifest: {}", e)))?;

    let mut blocks = Vec::new();
    while reader.remaining() > 0 {
        let len = reader.take_u64()? as usize;
        let nonce: [u8; 12] = reader.take(12)?.try_into().unwrap();
        let ciphertext = reader.take(len)?.to_vec();
        blocks.push(Encrypted { nonce, ciphertext });
    }

    Ok((manifest, blocks, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn make_repo(root: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let repo = root.join(name);
        for (rel, content) in files {
            let path = repo.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        std::fs::create_dir_all(&repo).unwrap();
        repo
    }

    fn count_files(dir: &Path) -> u64 {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count() as u64
    }

    #[test]
    fn test_create_extract_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let repo = make_repo(
            tmp.path(),
            "project",
            &[
                ("README.md", "# project"),
                ("src/main.rs", "fn main() {}"),
                ("src/util/helpers.rs", "pub fn help() {}"),
            ],
        );

        let archive = tmp.path().join("backup.clonr");
        let manifest =
            create(&[repo], &archive, "correcthorsebattery", &ArchiveOptions::default()).unwrap();

        assert_eq!(manifest.repositories.len(), 1);
        assert_eq!(manifest.repositories[0].name, "project");
        assert_eq!(manifest.repositories[0].file_count, 3);
        assert_eq!(manifest.compression_algorithm, "gzip");
        assert_eq!(manifest.encryption_algorithm, "aes-256-gcm");

        let dest = tmp.path().join("restore");
        let extracted = extract(&archive, &dest, "correcthorsebattery").unwrap();
        assert_eq!(extracted.checksum, manifest.checksum);

        let restored = dest.join("project");
        assert_eq!(count_files(&restored), manifest.repositories[0].file_count);
        assert_eq!(
            std::fs::read_to_string(restored.join("src/main.rs")).unwrap(),
            "fn main() {}"
        );
    }

    #[test]
    fn test_multiple_repositories() {
        let tmp = TempDir::new().unwrap();
        let a = make_repo(tmp.path(), "alpha", &[("a.txt", "aaa")]);
        let b = make_repo(tmp.path(), "beta", &[("b.txt", "bbb"), ("c.txt", "ccc")]);

        let archive = tmp.path().join("multi.clonr");
        let manifest = create(&[a, b], &archive, "pw", &ArchiveOptions::default()).unwrap();
        assert_eq!(manifest.repositories.len(), 2);

        let dest = tmp.path().join("out");
        extract(&archive, &dest, "pw").unwrap();
        assert!(dest.join("alpha/a.txt").exists());
        assert!(dest.join("beta/b.txt").exists());
        assert!(dest.join("beta/c.txt").exists());
    }

    #[test]
    fn test_wrong_password_is_distinguishable() {
        let tmp = TempDir::new().unwrap();
        let repo = make_repo(tmp.path(), "repo", &[("f.txt", "data")]);
        let archive = tmp.path().join("a.clonr");
        create(&[repo], &archive, "right", &ArchiveOptions::default()).unwrap();

        assert_matches!(
            list(&archive, "wrong"),
            Err(StandaloneError::WrongPassword)
        );

        let dest = tmp.path().join("never");
        assert_matches!(
            extract(&archive, &dest, "wrong"),
            Err(StandaloneError::WrongPassword)
        );
        assert!(!dest.exists());
    }

    #[test]
    fn test_list_without_extracting() {
        let tmp = TempDir::new().unwrap();
        let repo = make_repo(tmp.path(), "repo", &[("f.txt", "data")]);
        let archive = tmp.path().join("a.clonr");
        let created = create(&[repo], &archive, "pw", &ArchiveOptions::default()).unwrap();

        let listed = list(&archive, "pw").unwrap();
        assert_eq!(listed, created);
    }

    #[test]
    fn test_tampered_block_fails_atomically() {
        let tmp = TempDir::new().unwrap();
        let repo = make_repo(tmp.path(), "repo", &[("f.txt", "data")]);
        let archive = tmp.path().join("a.clonr");
        create(&[repo], &archive, "pw", &ArchiveOptions::default()).unwrap();

        // Flip a byte near the end, inside the repository block
        let mut raw = std::fs::read(&archive).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        std::fs::write(&archive, &raw).unwrap();

        let dest = tmp.path().join("out");
        assert_matches!(
            extract(&archive, &dest, "pw"),
            Err(StandaloneError::Integrity(_))
        );
        // Nothing written, no staging left behind
        assert!(!dest.exists());
        assert!(!tmp.path().join(".out.partial").exists());
    }

    #[test]
    fn test_truncated_archive_is_decode_error() {
        let tmp = TempDir::new().unwrap();
        let repo = make_repo(tmp.path(), "repo", &[("f.txt", "data")]);
        let archive = tmp.path().join("a.clonr");
        create(&[repo], &archive, "pw", &ArchiveOptions::default()).unwrap();

        let raw = std::fs::read(&archive).unwrap();
        std::fs::write(&archive, &raw[..20]).unwrap();

        assert_matches!(list(&archive, "pw"), Err(StandaloneError::Decode(_)));
    }

    #[test]
    fn test_not_an_archive() {
        let tmp = TempDir::new().unwrap();
        let bogus = tmp.path().join("file.clonr");
        std::fs::write(&bogus, b"this is not an archive at all").unwrap();

        assert_matches!(list(&bogus, "pw"), Err(StandaloneError::Decode(_)));
    }

    #[test]
    fn test_exclude_patterns() {
        let tmp = TempDir::new().unwrap();
        let repo = make_repo(
            tmp.path(),
            "repo",
            &[
                ("keep.rs", "keep"),
                ("debug.log", "noise"),
                ("target/out.bin", "artifact"),
            ],
        );

        let options = ArchiveOptions {
            exclude_patterns: vec!["*.log".to_string(), "target".to_string()],
            ..Default::default()
        };
        let archive = tmp.path().join("a.clonr");
        let manifest = create(&[repo], &archive, "pw", &options).unwrap();
        assert_eq!(manifest.repositories[0].file_count, 1);

        let dest = tmp.path().join("out");
        extract(&archive, &dest, "pw").unwrap();
        assert!(dest.join("repo/keep.rs").exists());
        assert!(!dest.join("repo/debug.log").exists());
        assert!(!dest.join("repo/target").exists());
    }

    #[test]
    fn test_no_git_excludes_vcs_metadata_only() {
        let tmp = TempDir::new().unwrap();
        let repo = make_repo(
            tmp.path(),
            "repo",
            &[(".git/HEAD", "ref: refs/heads/main"), ("code.rs", "fn x() {}")],
        );

        let options = ArchiveOptions {
            include_vcs_metadata: false,
            ..Default::default()
        };
        let archive = tmp.path().join("a.clonr");
        let manifest = create(&[repo], &archive, "pw", &options).unwrap();
        assert_eq!(manifest.repositories[0].file_count, 1);

        let dest = tmp.path().join("out");
        extract(&archive, &dest, "pw").unwrap();
        assert!(dest.join("repo/code.rs").exists());
        assert!(!dest.join("repo/.git").exists());
    }

    #[test]
    fn test_git_metadata_recorded() {
        let tmp = TempDir::new().unwrap();
        let repo = make_repo(
            tmp.path(),
            "repo",
            &[
                ("file.txt", "x"),
                (".git/HEAD", "ref: refs/heads/main\n"),
                (
                    ".git/refs/heads/main",
                    "0123456789abcdef0123456789abcdef01234567\n",
                ),
                (
                    ".git/config",
                    "[remote \"origin\"]\n\turl = git@github.com:acme/repo.git\n",
                ),
            ],
        );

        let archive = tmp.path().join("a.clonr");
        let manifest = create(&[repo], &archive, "pw", &ArchiveOptions::default()).unwrap();

        let entry = &manifest.repositories[0];
        assert_eq!(
            entry.last_commit.as_deref(),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
        assert_eq!(
            entry.source_url.as_deref(),
            Some("git@github.com:acme/repo.git")
        );
    }

    #[test]
    fn test_extract_refuses_nonempty_destination() {
        let tmp = TempDir::new().unwrap();
        let repo = make_repo(tmp.path(), "repo", &[("f.txt", "data")]);
        let archive = tmp.path().join("a.clonr");
        create(&[repo], &archive, "pw", &ArchiveOptions::default()).unwrap();

        let dest = tmp.path().join("occupied");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("existing.txt"), "here first").unwrap();

        assert_matches!(
            extract(&archive, &dest, "pw"),
            Err(StandaloneError::AlreadyExists(_))
        );
        assert!(dest.join("existing.txt").exists());
    }

    #[test]
    fn test_extension_is_appended() {
        let tmp = TempDir::new().unwrap();
        let repo = make_repo(tmp.path(), "repo", &[("f.txt", "data")]);

        create(
            &[repo],
            &tmp.path().join("backup"),
            "pw",
            &ArchiveOptions::default(),
        )
        .unwrap();
        assert!(tmp.path().join("backup.clonr").exists());
    }

    #[test]
    fn test_compression_levels_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let content = "abcdef".repeat(5000);
        let repo = make_repo(tmp.path(), "repo", &[("big.txt", content.as_str())]);

        for level in [0u32, 9] {
            let options = ArchiveOptions {
                compression_level: level,
                ..Default::default()
            };
            let archive = tmp.path().join(format!("l{}.clonr", level));
            create(&[repo.clone()], &archive, "pw", &options).unwrap();

            let dest = tmp.path().join(format!("out{}", level));
            extract(&archive, &dest, "pw").unwrap();
            assert_eq!(
                std::fs::read_to_string(dest.join("repo/big.txt")).unwrap(),
                content
            );
        }
    }

    #[test]
    fn test_empty_input_rejected() {
        let tmp = TempDir::new().unwrap();
        assert_matches!(
            create(&[], &tmp.path().join("a"), "pw", &ArchiveOptions::default()),
            Err(StandaloneError::NotFound(_))
        );
    }
}
