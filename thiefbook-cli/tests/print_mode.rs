use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::{tempdir, TempDir};

fn book(dir: &TempDir, lines: usize) -> PathBuf {
    let path = dir.path().join("book.txt");
    let body: String = (0..lines).map(|i| format!("line {}\n", i)).collect();
    fs::write(&path, body).unwrap();
    path
}

fn thiefbook(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("thiefbook").unwrap();
    cmd.arg("--data-dir")
        .arg(dir.join("data"))
        .arg("--config")
        .arg(dir.join("config.toml"))
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn prints_the_requested_page() {
    let dir = tempdir().unwrap();
    let path = book(&dir, 100);

    let output = thiefbook(dir.path())
        .args(["--print", "--page", "3", "--lines-per-page", "4"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "line 8\nline 9\nline 10\nline 11\n"
    );
}

#[test]
fn resumes_from_saved_position() {
    let dir = tempdir().unwrap();
    let path = book(&dir, 100);

    thiefbook(dir.path())
        .args(["--print", "--page", "5", "-n", "10"])
        .arg(&path)
        .assert()
        .success();

    let output = thiefbook(dir.path())
        .args(["--print", "-n", "10"])
        .arg(&path)
        .output()
        .unwrap();
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(text.starts_with("line 40\n"), "got {:?}", text);
}

#[test]
fn reads_book_and_layout_from_config_file() {
    let dir = tempdir().unwrap();
    let path = book(&dir, 20);
    fs::write(
        dir.path().join("config.toml"),
        format!(
            "book_path = {:?}\nlines_per_page = 2\nline_spacing = 1\n",
            path.to_string_lossy()
        ),
    )
    .unwrap();

    let output = thiefbook(dir.path()).arg("--print").output().unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "line 0\n\nline 1\n"
    );
}

#[test]
fn missing_book_fails() {
    let dir = tempdir().unwrap();
    thiefbook(dir.path())
        .arg("--print")
        .arg(dir.path().join("absent.txt"))
        .assert()
        .failure();
}

#[test]
fn no_book_at_all_fails() {
    let dir = tempdir().unwrap();
    thiefbook(dir.path()).arg("--print").assert().failure();
}
