//! Archive fidelity scenarios: create/extract round trips, wrong-password
//! behavior, and on-disk atomicity.

use clonr::archive::{self, ArchiveOptions};
use clonr::StandaloneError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

fn make_repo(root: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let repo = root.join(name);
    std::fs::create_dir_all(&repo).unwrap();
    for (rel, content) in files {
        let path = repo.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    repo
}

fn file_count(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count() as u64
}

#[test]
fn archive_then_extract_matches_manifest_file_count() {
    let tmp = TempDir::new().unwrap();
    let repo = make_repo(
        tmp.path(),
        "repo",
        &[
            ("README.md", "readme"),
            ("src/lib.rs", "pub fn f() {}"),
            ("src/nested/deep/file.txt", "deep"),
            ("docs/guide.md", "guide"),
        ],
    );

    let archive_path = tmp.path().join("backup.clonr");
    let manifest = archive::create(
        &[repo.clone()],
        &archive_path,
        "correcthorsebattery",
        &ArchiveOptions::default(),
    )
    .unwrap();

    let dest = tmp.path().join("restore");
    archive::extract(&archive_path, &dest, "correcthorsebattery").unwrap();

    let restored = dest.join("repo");
    assert!(restored.is_dir());
    assert_eq!(file_count(&restored), manifest.repositories[0].file_count);
    assert_eq!(file_count(&restored), file_count(&repo));

    // Contents byte-identical
    for entry in WalkDir::new(&repo).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(&repo).unwrap();
            assert_eq!(
                std::fs::read(entry.path()).unwrap(),
                std::fs::read(restored.join(rel)).unwrap(),
                "mismatch at {}",
                rel.display()
            );
        }
    }
}

#[test]
fn wrong_password_never_produces_garbage_files() {
    let tmp = TempDir::new().unwrap();
    let repo = make_repo(tmp.path(), "repo", &[("secret.txt", "confidential")]);

    let archive_path = tmp.path().join("backup.clonr");
    archive::create(&[repo], &archive_path, "right-password", &ArchiveOptions::default()).unwrap();

    let dest = tmp.path().join("restore");
    let result = archive::extract(&archive_path, &dest, "wrong-password");

    assert!(matches!(result, Err(StandaloneError::WrongPassword)));
    assert!(!dest.exists(), "nothing may be written on a wrong password");
}

#[test]
fn listing_requires_the_password_but_extracts_nothing() {
    let tmp = TempDir::new().unwrap();
    let repo = make_repo(tmp.path(), "repo", &[("a.txt", "a"), ("b.txt", "b")]);

    let archive_path = tmp.path().join("backup.clonr");
    archive::create(&[repo], &archive_path, "pw", &ArchiveOptions::default()).unwrap();

    assert!(matches!(
        archive::list(&archive_path, "nope"),
        Err(StandaloneError::WrongPassword)
    ));

    let manifest = archive::list(&archive_path, "pw").unwrap();
    assert_eq!(manifest.repositories[0].file_count, 2);

    // list() touched nothing on disk besides reading the archive
    let entries: Vec<_> = std::fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(entries.len(), 2); // the repo and the archive
}

#[test]
fn corrupted_archive_fails_without_partial_extraction() {
    let tmp = TempDir::new().unwrap();
    let repo = make_repo(
        tmp.path(),
        "repo",
        &[("one.txt", "1"), ("two.txt", "2"), ("three.txt", "3")],
    );

    let archive_path = tmp.path().join("backup.clonr");
    archive::create(&[repo], &archive_path, "pw", &ArchiveOptions::default()).unwrap();

    // Corrupt a byte in the middle of the repository block
    let mut raw = std::fs::read(&archive_path).unwrap();
    let target = raw.len() - 10;
    raw[target] ^= 0x55;
    std::fs::write(&archive_path, &raw).unwrap();

    let dest = tmp.path().join("restore");
    let result = archive::extract(&archive_path, &dest, "pw");

    assert!(matches!(result, Err(StandaloneError::Integrity(_))));
    assert!(!dest.exists());

    // No staging leftovers anywhere in the parent
    let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains("partial"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn no_git_knob_changes_contents_not_guarantees() {
    let tmp = TempDir::new().unwrap();
    let repo = make_repo(
        tmp.path(),
        "repo",
        &[
            ("code.rs", "fn main() {}"),
            (".git/HEAD", "ref: refs/heads/main"),
            (".git/config", "[core]"),
        ],
    );

    let with_git = tmp.path().join("with.clonr");
    let without_git = tmp.path().join("without.clonr");

    archive::create(&[repo.clone()], &with_git, "pw", &ArchiveOptions::default()).unwrap();
    archive::create(
        &[repo],
        &without_git,
        "pw",
        &ArchiveOptions {
            include_vcs_metadata: false,
            ..Default::default()
        },
    )
    .unwrap();

    let a = archive::extract(&with_git, &tmp.path().join("out-with"), "pw").unwrap();
    let b = archive::extract(&without_git, &tmp.path().join("out-without"), "pw").unwrap();

    assert_eq!(a.repositories[0].file_count, 3);
    assert_eq!(b.repositories[0].file_count, 1);

    // Both are equally protected: wrong password fails identically
    assert!(matches!(
        archive::list(&without_git, "bad"),
        Err(StandaloneError::WrongPassword)
    ));
}

#[test]
fn multi_repo_archive_preserves_separation() {
    let tmp = TempDir::new().unwrap();
    let a = make_repo(tmp.path(), "frontend", &[("app.js", "js")]);
    let b = make_repo(tmp.path(), "backend", &[("main.rs", "rs"), ("lib.rs", "rs")]);

    let archive_path = tmp.path().join("both.clonr");
    let manifest =
        archive::create(&[a, b], &archive_path, "pw", &ArchiveOptions::default()).unwrap();

    assert_eq!(manifest.repositories.len(), 2);
    let names: Vec<&str> = manifest.repositories.iter().map(|r| r.name.as_str()).collect();
    assert!(names.contains(&"frontend"));
    assert!(names.contains(&"backend"));

    let dest = tmp.path().join("out");
    archive::extract(&archive_path, &dest, "pw").unwrap();
    assert!(dest.join("frontend/app.js").exists());
    assert!(dest.join("backend/main.rs").exists());
    assert!(dest.join("backend/lib.rs").exists());
}
