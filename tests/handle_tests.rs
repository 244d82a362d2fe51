use filekeep::{AccessMode, DigestForm, FileClass, FileError, FileHandle, HandleOptions, HashAlgorithm};
use filetime::FileTime;
use std::fs;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn mode(s: &str) -> AccessMode {
    s.parse().unwrap()
}

fn bump_mtime(path: &std::path::Path, secs: u64) {
    let later = SystemTime::now() + Duration::from_secs(secs);
    filetime::set_file_mtime(path, FileTime::from_system_time(later)).unwrap();
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_creation_modes_create_missing_file() {
    let dir = tempdir().unwrap();

    for (i, m) in ["w", "wb", "w+", "wb+", "a", "ab", "a+", "ab+"].iter().enumerate() {
        for open in [true, false] {
            let path = dir.path().join(format!("new_{i}_{open}.txt"));
            let options = HandleOptions::default()
                .with_mode(mode(m))
                .open_on_create(open);

            let file = FileHandle::with_options(&path, options).unwrap();
            assert!(path.is_file(), "mode {m} did not create the file");
            assert_eq!(file.is_open(), open, "mode {m}");
        }
    }
}

#[test]
fn test_read_mode_on_missing_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.txt");

    match FileHandle::new(&path) {
        Err(FileError::PathNotFound(p)) => assert_eq!(p, path),
        other => panic!("Expected PathNotFound, got {other:?}"),
    }
    assert!(!path.exists());
}

#[test]
fn test_directory_is_not_a_file() {
    let dir = tempdir().unwrap();

    let result = FileHandle::with_options(
        dir.path(),
        HandleOptions::default().with_mode(mode("a")),
    );
    assert!(matches!(result, Err(FileError::NotAFile(_))));
}

#[test]
fn test_classification() {
    let dir = tempdir().unwrap();
    let cases = [
        ("plain.txt", false, FileClass::Normal),
        (".hidden", false, FileClass::Hidden),
        ("scratch.txt", true, FileClass::Temporary),
        (".scratch", true, FileClass::HiddenTemporary),
    ];

    for (name, temporary, expected) in cases {
        let path = dir.path().join(name);
        let options = HandleOptions::default()
            .with_mode(mode("w"))
            .temporary(temporary);
        let file = FileHandle::with_options(&path, options).unwrap();
        assert_eq!(file.class(), expected, "{name}");
    }
}

// =============================================================================
// Open / close
// =============================================================================

#[test]
fn test_close_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "x").unwrap();

    let mut file = FileHandle::new(&path).unwrap();
    assert!(file.is_open());
    assert!(file.close());
    assert!(!file.is_open());
    assert!(!file.close());
}

#[test]
fn test_open_with_other_mode_keeps_stored_mode() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "x").unwrap();

    let mut file =
        FileHandle::with_options(&path, HandleOptions::default().open_on_create(false)).unwrap();
    assert!(file.open(Some(mode("a"))).unwrap());
    file.write(b"y").unwrap();
    assert_eq!(file.mode(), AccessMode::READ);
    assert_eq!(fs::read(&path).unwrap(), b"xy");
}

#[cfg(unix)]
#[test]
fn test_open_error_leaves_handle_closed() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let path = dir.path().join("locked.txt");
    fs::write(&path, "x").unwrap();

    let mut file =
        FileHandle::with_options(&path, HandleOptions::default().open_on_create(false)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

    // Root ignores permission bits, so only assert when the open fails.
    if let Err(err) = file.open(None) {
        assert!(matches!(err, FileError::Open { .. }));
        assert!(!file.is_open());
    }
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
}

// =============================================================================
// Read / write
// =============================================================================

#[test]
fn test_read_and_write_require_open_handle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "x").unwrap();

    let mut file =
        FileHandle::with_options(&path, HandleOptions::default().open_on_create(false)).unwrap();
    assert!(matches!(file.read(None), Err(FileError::NotOpen(_))));
    assert!(matches!(file.write(b"y"), Err(FileError::NotOpen(_))));
    assert!(matches!(file.truncate(None), Err(FileError::NotOpen(_))));
}

#[test]
fn test_write_through_read_only_handle_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "x").unwrap();

    let mut file = FileHandle::new(&path).unwrap();
    assert!(matches!(file.write(b"y"), Err(FileError::Write { .. })));
}

#[test]
fn test_read_lines_works_while_closed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "alpha\nbeta\r\ngamma").unwrap();

    let file =
        FileHandle::with_options(&path, HandleOptions::default().open_on_create(false)).unwrap();
    assert_eq!(file.read_lines().unwrap(), vec!["alpha", "beta", "gamma"]);
    assert!(!file.is_open());
}

// =============================================================================
// Hashing
// =============================================================================

#[test]
fn test_write_then_hash_reflects_new_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");

    let mut file =
        FileHandle::with_options(&path, HandleOptions::default().with_mode(mode("w"))).unwrap();
    file.close();
    let empty = file.sha256(DigestForm::Hex).unwrap();

    file.open(None).unwrap();
    file.write(b"abc").unwrap();
    file.close();

    let after = file.sha256(DigestForm::Hex).unwrap();
    assert_ne!(empty, after);
    assert_eq!(
        after.as_hex().unwrap(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn test_hash_open_handle_reads_from_position() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "xxabc").unwrap();

    let mut file = FileHandle::new(&path).unwrap();
    file.read(Some(2)).unwrap();
    let digest = file.hash(HashAlgorithm::Md5, DigestForm::Hex).unwrap();
    assert_eq!(digest.as_hex().unwrap(), "900150983cd24fb0d6963f7d28e17f72");
    assert!(file.is_open());
}

#[test]
fn test_hash_after_write_and_rewind_covers_new_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");

    let mut file =
        FileHandle::with_options(&path, HandleOptions::default().with_mode(mode("w+"))).unwrap();
    file.write(b"new content").unwrap();

    // At EOF the tail is empty.
    let tail = file.sha256(DigestForm::Hex).unwrap();
    assert_eq!(
        tail.as_hex().unwrap(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );

    file.rewind().unwrap();
    let whole = file.sha256(DigestForm::Hex).unwrap();
    assert_ne!(whole, tail);

    let mut fresh =
        FileHandle::with_options(&path, HandleOptions::default().open_on_create(false)).unwrap();
    assert_eq!(fresh.sha256(DigestForm::Hex).unwrap(), whole);
}

#[test]
fn test_partial_digest_not_served_after_close() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "hello world").unwrap();

    let mut file = FileHandle::new(&path).unwrap();
    file.read(Some(6)).unwrap();
    let tail = file.sha256(DigestForm::Hex).unwrap();

    file.close();
    let full = file.sha256(DigestForm::Hex).unwrap();
    assert_ne!(full, tail);
    assert_eq!(
        full.as_hex().unwrap(),
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
}

#[test]
fn test_hash_of_closed_handle_stays_closed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "abc").unwrap();

    let mut file =
        FileHandle::with_options(&path, HandleOptions::default().open_on_create(false)).unwrap();
    file.md5(DigestForm::Hex).unwrap();
    assert!(!file.is_open());
}

#[test]
fn test_digest_lengths_across_block_boundaries() {
    let dir = tempdir().unwrap();
    let block = 64;

    for size in [0, 1, block - 1, block, block + 1, block * 10 + 3] {
        let path = dir.path().join(format!("f{size}.bin"));
        fs::write(&path, vec![0xabu8; size]).unwrap();

        let options = HandleOptions::default()
            .open_on_create(false)
            .with_block_size(block);
        let mut file = FileHandle::with_options(&path, options).unwrap();

        assert_eq!(file.md5(DigestForm::Hex).unwrap().len(), 32, "size {size}");
        assert_eq!(file.sha256(DigestForm::Hex).unwrap().len(), 64, "size {size}");
        assert_eq!(file.md5(DigestForm::Bytes).unwrap().len(), 16, "size {size}");
        assert_eq!(file.sha256(DigestForm::Bytes).unwrap().len(), 32, "size {size}");
    }
}

#[test]
fn test_hex_and_bytes_forms_agree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "form check").unwrap();

    let mut file =
        FileHandle::with_options(&path, HandleOptions::default().open_on_create(false)).unwrap();
    let hex = file.sha256(DigestForm::Hex).unwrap();
    let bytes = file.sha256(DigestForm::Bytes).unwrap();
    assert_eq!(hex.as_hex().unwrap(), bytes.to_hex());

    let md5 = file.md5(DigestForm::Hex).unwrap();
    assert_ne!(md5.to_hex(), hex.to_hex());
}

// =============================================================================
// Modification tracking
// =============================================================================

#[test]
fn test_modified_after_external_write() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "x").unwrap();

    let file =
        FileHandle::with_options(&path, HandleOptions::default().open_on_create(false)).unwrap();
    assert!(!file.modified().unwrap());

    fs::write(&path, "changed").unwrap();
    bump_mtime(&path, 5);
    assert!(file.modified().unwrap());
    // Asking again does not refresh the cached stamp.
    assert!(file.modified().unwrap());
}

#[test]
fn test_touch_resets_modified() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "x").unwrap();

    let mut file =
        FileHandle::with_options(&path, HandleOptions::default().open_on_create(false)).unwrap();
    bump_mtime(&path, 5);
    assert!(file.modified().unwrap());

    let stamp = file.touch().unwrap();
    assert_eq!(stamp, file.cached_modification_time());
    assert!(!file.modified().unwrap());
}

#[test]
fn test_touch_recreates_deleted_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "x").unwrap();

    let mut file = FileHandle::new(&path).unwrap();
    assert!(file.delete());
    assert!(!file.exists());

    file.touch().unwrap();
    assert!(file.exists());
    assert_eq!(file.size().unwrap(), 0);
    assert!(!file.is_open());
}

// =============================================================================
// Deletion and lifecycle
// =============================================================================

#[test]
fn test_delete_twice_returns_false() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "x").unwrap();

    let mut file = FileHandle::new(&path).unwrap();
    assert!(file.delete());
    assert!(!file.is_open());
    assert!(!path.exists());
    assert!(!file.delete());
}

#[test]
fn test_temporary_file_removed_on_drop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scratch.txt");

    {
        let options = HandleOptions::default()
            .with_mode(mode("w"))
            .temporary(true);
        let mut file = FileHandle::with_options(&path, options).unwrap();
        file.write(b"short lived").unwrap();
        assert!(path.is_file());
    }

    assert!(!path.exists());
}

#[test]
fn test_temporary_file_removed_on_unwind() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".scratch");
    let moved = path.clone();

    let result = std::panic::catch_unwind(move || {
        let options = HandleOptions::default()
            .with_mode(mode("w"))
            .temporary(true);
        let _file = FileHandle::with_options(&moved, options).unwrap();
        panic!("boom");
    });

    assert!(result.is_err());
    assert!(!path.exists());
}

#[test]
fn test_normal_file_survives_drop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keep.txt");

    {
        let _file =
            FileHandle::with_options(&path, HandleOptions::default().with_mode(mode("w")))
                .unwrap();
    }

    assert!(path.is_file());
}

#[test]
fn test_temporary_already_deleted_drop_is_quiet() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scratch.txt");
    let options = HandleOptions::default()
        .with_mode(mode("w"))
        .temporary(true);

    let mut file = FileHandle::with_options(&path, options).unwrap();
    assert!(file.delete());
    drop(file);
    assert!(!path.exists());
}

// =============================================================================
// Grep
// =============================================================================

#[test]
fn test_grep_matches_anywhere_in_line() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");
    fs::write(&path, "INFO start\nERROR disk full\nINFO done\nWARN error-ish\n").unwrap();

    let file = FileHandle::new(&path).unwrap();
    assert_eq!(file.grep("ERROR").unwrap(), vec!["ERROR disk full"]);
    assert_eq!(
        file.grep("(?i)error").unwrap(),
        vec!["ERROR disk full", "WARN error-ish"]
    );
    assert!(file.grep("^done").unwrap().is_empty());
}

#[test]
fn test_grep_invalid_pattern() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");
    fs::write(&path, "x\n").unwrap();

    let file = FileHandle::new(&path).unwrap();
    match file.grep("(unclosed") {
        Err(FileError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "(unclosed"),
        other => panic!("Expected InvalidPattern, got {other:?}"),
    }
}
