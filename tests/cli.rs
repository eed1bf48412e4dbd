use std::path::Path;
use std::process::{Command, Output};

fn bidwise(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bidwise"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("bidwise.toml");
    let body = format!(
        "[paths]\nchunks = {:?}\npreprocessed = {:?}\n",
        dir.join("out/chunks.jsonl"),
        dir.join("pre"),
    );
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn chunk_writes_jsonl_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    std::fs::create_dir(dir.path().join("pre")).unwrap();
    let doc = serde_json::json!({
        "text": "1. 사업 개요\n본 사업은 차세대 정보시스템 구축을 목적으로 한다.",
        "metadata": {
            "공고 번호": "20240101-00",
            "발주 기관": "한국전력공사",
            "사업명": "차세대 정보시스템 구축"
        }
    });
    std::fs::write(dir.path().join("pre/a.json"), doc.to_string()).unwrap();

    let out = bidwise(&config, &["chunk"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let jsonl = std::fs::read_to_string(dir.path().join("out/chunks.jsonl")).unwrap();
    let lines: Vec<serde_json::Value> = jsonl
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["doc_id"], "20240101-00");
    assert_eq!(lines[0]["chunk_id"], "20240101-00_0");
    assert_eq!(lines[0]["metadata"]["organization"], "한국전력공사");
}

#[test]
fn chunk_without_documents_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    std::fs::create_dir(dir.path().join("pre")).unwrap();

    let out = bidwise(&config, &["chunk"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("failed to load documents"));
}

#[test]
fn eval_reports_missing_set() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let out = bidwise(&config, &["eval", "missing.jsonl"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("failed to load eval set"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bidwise.toml");
    std::fs::write(&config, "[retrieval]\ntop_k = 0\n").unwrap();

    let out = bidwise(&config, &["chunk"]);
    assert!(!out.status.success());
}
