use std::env;
use std::path::PathBuf;
use std::process::Command;

use chrono::Utc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    println!("cargo:warning=OUT_DIR: {}", out_dir.display());

    // Every service contract lives in proto/, one file per service
    let proto_dir = PathBuf::from("proto");
    let mut proto_files: Vec<PathBuf> = Vec::new();

    for entry in std::fs::read_dir(&proto_dir)? {
        let path = entry?.path();
        if path.extension().map(|ext| ext == "proto").unwrap_or(false) {
            proto_files.push(path);
        }
    }
    proto_files.sort();

    if proto_files.is_empty() {
        return Err(format!("no .proto files found in {}", proto_dir.display()).into());
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&proto_files, &["proto"])?;

    println!("cargo:rerun-if-changed=proto");

    let git_hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", git_hash.trim());
    println!("cargo:rustc-env=BUILD_TIME={}", Utc::now().to_rfc3339());

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads");

    Ok(())
}
