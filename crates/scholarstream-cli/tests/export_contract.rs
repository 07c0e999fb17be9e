const TRANSCRIPT: &str = r#"{"entries":[
  {"role":"user","text":"What changed in protein folding after 2020?"},
  {"role":"assistant","text":"AlphaFold 2 set a new bar.<br>Later work targets complexes."}
]}"#;

fn export(args: &[&str], dir: &std::path::Path) -> std::process::Output {
    let transcript = dir.join("transcript.json");
    std::fs::write(&transcript, TRANSCRIPT).unwrap();
    let bin = assert_cmd::cargo::cargo_bin!("scholarstream");
    std::process::Command::new(bin)
        .arg("export")
        .arg("--transcript")
        .arg(&transcript)
        .args(args)
        .env_remove("SCHOLARSTREAM_ENV_FILE")
        .output()
        .expect("run scholarstream export")
}

#[test]
fn export_markdown_infers_format_from_extension() {
    let tmp = tempfile::tempdir().unwrap();
    let out_path = tmp.path().join("exports/chat_history.md");
    let out = export(&["--out", out_path.to_str().unwrap()], tmp.path());
    assert!(
        out.status.success(),
        "export failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let md = std::fs::read_to_string(&out_path).unwrap();
    assert!(md.starts_with("# Chat history\n"));
    assert!(md.contains("**You:**"));
    assert!(md.contains("**AI Assistant:**\n\nAlphaFold 2 set a new bar.  \nLater work targets complexes."));
}

#[test]
fn export_text_is_wrapped() {
    let tmp = tempfile::tempdir().unwrap();
    let out_path = tmp.path().join("chat.out");
    let out = export(
        &["--format", "text", "--width", "24", "--out", out_path.to_str().unwrap()],
        tmp.path(),
    );
    assert!(out.status.success());
    let txt = std::fs::read_to_string(&out_path).unwrap();
    assert!(txt.starts_with("You:\n"));
    assert!(txt.contains("\nAI Assistant:\n"));
    assert!(txt.lines().all(|l| l.chars().count() <= 24), "{txt}");
}

#[test]
fn export_without_known_extension_needs_format() {
    let tmp = tempfile::tempdir().unwrap();
    let out_path = tmp.path().join("chat.docx");
    let out = export(&["--json", "--out", out_path.to_str().unwrap()], tmp.path());
    assert!(!out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse error json");
    assert_eq!(v["kind"].as_str(), Some("export"));
    assert_eq!(v["error"]["code"].as_str(), Some("invalid_params"));
    assert!(!out_path.exists());
}

#[test]
fn export_pdf_without_fonts_is_an_export_error() {
    let tmp = tempfile::tempdir().unwrap();
    let transcript = tmp.path().join("transcript.json");
    std::fs::write(&transcript, TRANSCRIPT).unwrap();
    let bin = assert_cmd::cargo::cargo_bin!("scholarstream");
    let out = std::process::Command::new(bin)
        .args(["--json", "export", "--transcript"])
        .arg(&transcript)
        .arg("--out")
        .arg(tmp.path().join("chat.pdf"))
        .env_remove("SCHOLARSTREAM_ENV_FILE")
        .env("SCHOLARSTREAM_FONT_DIR", tmp.path())
        .env("SCHOLARSTREAM_FONT_NAME", "NoSuchFamilyForScholarstreamTests")
        .output()
        .expect("run scholarstream export");
    assert!(!out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse error json");
    assert_eq!(v["error"]["code"].as_str(), Some("export_failed"));
}
