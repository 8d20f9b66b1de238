#![allow(dead_code)]

use csvflow::AppConfig;
use polars::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

pub const MATERIALS: [&str; 4] = ["Bronze", "jade", "BRONZE", "lacquer"];

/// `rows` artefact records with flow levels, written as `<name>.csv` in `dir`.
pub fn write_collection_csv(dir: &Path, name: &str, rows: usize) -> PathBuf {
    let mut df = df!(
        "id" => (0..rows as i64).collect::<Vec<_>>(),
        "title" => (0..rows)
            .map(|i| format!("{} vessel {}", MATERIALS[i % MATERIALS.len()], i))
            .collect::<Vec<_>>(),
        "url" => (0..rows).map(|i| format!("https://example.org/item/{}", i)).collect::<Vec<_>>(),
        "imageUrl_s" => (0..rows).map(|i| format!("https://example.org/img/{}.jpg", i)).collect::<Vec<_>>(),
        "sk1" => (0..rows).map(|i| if i % 2 == 0 { "Asia" } else { "Europe" }).collect::<Vec<_>>(),
        "sk2" => (0..rows).map(|i| if i % 3 == 0 { "China" } else { "Japan" }).collect::<Vec<_>>(),
        "sk3" => (0..rows).map(|i| if i % 5 == 0 { None } else { Some("Vessel") }).collect::<Vec<_>>()
    )
    .unwrap();
    let path = dir.join(format!("{}.csv", name));
    let mut file = File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(&mut df).unwrap();
    path
}

/// Config resolving bare names in `dir`, exporting into `dir/out`, without streaming.
pub fn config_for(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.source.data_dir = Some(dir.path().display().to_string());
    config.source.remote_base = None;
    config.export.dir = Some(dir.path().join("out").display().to_string());
    config.export.scratch_path = Some(dir.path().join("scratch.csv").display().to_string());
    config.performance.polars_streaming = false;
    config
}

/// Serve `(path, status, body)` routes over HTTP on 127.0.0.1. Unknown paths get a 404.
/// Returns the base URL and the number of requests served so far.
pub fn serve_http(routes: Vec<(&'static str, u16, Vec<u8>)>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            counter.fetch_add(1, Ordering::SeqCst);
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            let _ = reader.read_line(&mut request_line);
            loop {
                let mut header = String::new();
                match reader.read_line(&mut header) {
                    Ok(0) | Err(_) => break,
                    Ok(_) if header.trim().is_empty() => break,
                    Ok(_) => {}
                }
            }
            let path = request_line.split_whitespace().nth(1).unwrap_or("/");
            let (status, body) = routes
                .iter()
                .find(|(p, _, _)| *p == path)
                .map(|(_, status, body)| (*status, body.clone()))
                .unwrap_or((404, b"not found".to_vec()));
            let reason = if status == 200 { "OK" } else { "Not Found" };
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                reason,
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
        }
    });
    (base, hits)
}

pub fn request_count(hits: &Arc<AtomicUsize>) -> usize {
    hits.load(Ordering::SeqCst)
}
