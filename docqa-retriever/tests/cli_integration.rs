use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn docqa(index_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docqa"))
        .arg("--provider")
        .arg("hash")
        .arg("--index-dir")
        .arg(index_dir)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run docqa")
}

fn write_pages(dir: &Path) -> String {
    let path = dir.join("report.json");
    std::fs::write(
        &path,
        r#"[
            {"page": 1, "type": "text", "content": "Revenue grew 12%."},
            {"page": 2, "type": "text", "content": "Risks include FX exposure."},
            {"page": 3, "type": "ocr", "content": "Outlook remains positive."}
        ]"#,
    )
    .unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_ingest_search_remove() {
    let dir = tempdir().unwrap();
    let index_dir = dir.path().join("vector_store");
    let pages = write_pages(dir.path());

    let output = docqa(&index_dir, &["ingest", "--pages", &pages, "--name", "report.pdf"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let ingest: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(ingest["chunks"], 3);
    assert_eq!(ingest["reused"], false);
    let id = ingest["document_id"].as_str().unwrap().to_string();
    assert!(id.starts_with("report-"));

    assert!(index_dir.join(format!("{id}.vidx")).is_file());
    assert!(index_dir.join(format!("{id}_meta.json")).is_file());

    let output = docqa(
        &index_dir,
        &[
            "search",
            "--document",
            &id,
            "--query",
            "What risks exist?",
            "-k",
            "2",
            "--format",
            "json",
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let hits: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(hits.as_array().unwrap().len(), 2);
    assert_eq!(hits[0]["page"], 2);
    assert_eq!(hits[0]["content"], "Risks include FX exposure.");

    let output = docqa(&index_dir, &["list"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains(&id));

    let output = docqa(&index_dir, &["remove", "--document", &id]);
    assert!(output.status.success());
    assert!(!index_dir.join(format!("{id}.vidx")).exists());

    let output = docqa(&index_dir, &["search", "--document", &id, "--query", "risks"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No index found"));
}

#[test]
fn test_ask_prints_page_cited_context() {
    let dir = tempdir().unwrap();
    let pages = write_pages(dir.path());

    let output = docqa(
        &dir.path().join("vector_store"),
        &["ask", "--pages", &pages, "--query", "What risks exist?", "-k", "2"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim_end(),
        "(Page 2) Risks include FX exposure.\n\n(Page 1) Revenue grew 12%."
    );
}

#[test]
fn test_invalid_top_k_is_reported() {
    let dir = tempdir().unwrap();
    let pages = write_pages(dir.path());

    let output = docqa(
        &dir.path().join("vector_store"),
        &["ask", "--pages", &pages, "--query", "risks", "-k", "0"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("top_k must be positive"));
}

#[test]
fn test_hash_provider_records_hash_model_name() {
    let dir = tempdir().unwrap();
    let index_dir = dir.path().join("vector_store");
    let pages = write_pages(dir.path());

    let output = docqa(&index_dir, &["ingest", "--pages", &pages]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let ingest: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let id = ingest["document_id"].as_str().unwrap().to_string();

    let output = docqa(&index_dir, &["info", "--document", &id, "--format", "json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let headers: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(headers[0]["model"]["model_name"], "feature-hash-384");
    assert_eq!(headers[0]["model"]["provider"], "hash");
}

#[test]
fn test_list_skips_unreadable_index() {
    let dir = tempdir().unwrap();
    let index_dir = dir.path().join("vector_store");
    let pages = write_pages(dir.path());

    let output = docqa(&index_dir, &["ingest", "--pages", &pages]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let ingest: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let id = ingest["document_id"].as_str().unwrap().to_string();

    std::fs::write(index_dir.join("junk-0000000000000000.vidx"), b"not an index").unwrap();
    std::fs::write(index_dir.join("junk-0000000000000000_meta.json"), b"[]").unwrap();

    let output = docqa(&index_dir, &["list", "--format", "json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let headers: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = headers
        .as_array()
        .unwrap()
        .iter()
        .map(|header| header["document_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![id.as_str()]);
    assert!(String::from_utf8_lossy(&output.stderr).contains("junk-0000000000000000"));
}
