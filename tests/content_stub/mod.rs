use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

#[derive(Debug, Clone, Default)]
pub struct ContentStubConfig {
    /// The first N content queries answer 500.
    pub fail_first: usize,
    /// Documents of type `livro`; the list query returns them all.
    pub works: Vec<Value>,
    pub author_page: Option<Value>,
    /// Served at `/obras.json`.
    pub fallback: Option<Value>,
}

/// A stand-in for the content query endpoint and for an http-hosted fallback file.
pub struct ContentStub {
    pub base_url: String,
    queries: Arc<AtomicUsize>,
    fallback_hits: Arc<AtomicUsize>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl ContentStub {
    pub fn spawn(config: ContentStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start content stub server");
        let base_url = format!("http://{}", server.server_addr());

        let queries = Arc::new(AtomicUsize::new(0));
        let fallback_hits = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread_queries = Arc::clone(&queries);
        let thread_fallback_hits = Arc::clone(&fallback_hits);
        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = url::Url::parse(&format!("http://stub{}", request.url()))
                    .expect("parse request url");

                if url.path() == "/obras.json" {
                    thread_fallback_hits.fetch_add(1, Ordering::SeqCst);
                    let response = match &config.fallback {
                        Some(body) => json_response(200, body),
                        None => json_response(404, &json!({"error": "not found"})),
                    };
                    let _ = request.respond(response);
                    continue;
                }

                if !url.path().contains("/data/query/") {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let seen = thread_queries.fetch_add(1, Ordering::SeqCst);
                if seen < config.fail_first {
                    let _ = request.respond(json_response(
                        500,
                        &json!({"error": {"description": "stub outage"}}),
                    ));
                    continue;
                }

                let param = |name: &str| {
                    url.query_pairs()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| value.into_owned())
                };
                let query = param("query").unwrap_or_default();

                let result = if query.contains(r#"_type == "authorPage""#) {
                    config.author_page.clone().unwrap_or(Value::Null)
                } else if query.contains(r#"_type == "author""#) {
                    Value::Null
                } else if let Some(slug) = param("$obra") {
                    let slug: String = serde_json::from_str(&slug).expect("$obra is JSON");
                    config
                        .works
                        .iter()
                        .find(|w| w["slug"] == slug.as_str())
                        .cloned()
                        .unwrap_or(Value::Null)
                } else {
                    Value::Array(config.works.clone())
                };

                let _ = request.respond(json_response(200, &json!({ "result": result })));
            }
        });

        Self {
            base_url,
            queries,
            fallback_hits,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn fallback_url(&self) -> String {
        format!("{}/obras.json", self.base_url)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn fallback_hits(&self) -> usize {
        self.fallback_hits.load(Ordering::SeqCst)
    }
}

impl Drop for ContentStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn json_response(status: u16, body: &Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("content-type header");
    tiny_http::Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header)
}

/// A published `livro` document as the list query projects it.
#[allow(dead_code)]
pub fn livro(title: &str, slug: &str, category: &str, date: &str) -> Value {
    json!({
        "_id": format!("id-{slug}"),
        "titulo": title,
        "slug": slug,
        "sinopse": format!("Sinopse de {title}"),
        "dataLancamento": date,
        "categorias": [category],
        "status": "Publicado",
    })
}
