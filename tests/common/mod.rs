//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread::JoinHandle;

/// Minimal valid PDF with one text line per page.
///
/// Builds the body first, then the xref table with correct byte offsets so
/// pdf-extract can parse it. Page text must not contain `(`, `)` or `\`.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut objects: Vec<String> = Vec::new();

    let kids = (0..pages.len())
        .map(|k| format!("{} 0 R", 4 + 2 * k))
        .collect::<Vec<_>>()
        .join(" ");
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids,
        pages.len()
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    for (k, text) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >>",
            5 + 2 * k
        ));
        let stream = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Length {} >> stream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, obj).as_bytes());
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

pub fn write_pdf(path: &Path, pages: &[&str]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, pdf_with_pages(pages)).unwrap();
}

/// Config using the offline hash embedder and a language model on a port
/// nothing listens on.
pub fn offline_config(data_dir: &Path, store_dir: &Path) -> String {
    config_with_llm(data_dir, store_dir, "http://127.0.0.1:9")
}

/// Config using the offline hash embedder and an Ollama-compatible chat
/// endpoint at `llm_url`.
pub fn config_with_llm(data_dir: &Path, store_dir: &Path, llm_url: &str) -> String {
    format!(
        r#"[paths]
data_dir = "{}"
store_dir = "{}"

[embedding]
provider = "hash"
dims = 128
batch_size = 4

[llm]
provider = "ollama"
url = "{}"
timeout_secs = 5
"#,
        data_dir.display().to_string().replace('\\', "/"),
        store_dir.display().to_string().replace('\\', "/"),
        llm_url
    )
}

/// Serve a single Ollama `/api/chat` request with `answer`.
///
/// Returns the base URL and a handle that yields the raw request once the
/// response has been written.
pub fn ollama_chat_once(answer: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let body = serde_json::json!({
        "model": "llama3.2:3b",
        "message": {"role": "assistant", "content": answer},
        "done": true
    })
    .to_string();

    let handle = std::thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let request = read_http_request(&mut socket);
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).unwrap();
        socket.flush().unwrap();
        request
    });
    (url, handle)
}

fn read_http_request(socket: &mut impl Read) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.trim()
                        .eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}
