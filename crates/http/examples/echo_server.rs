//! Small server showing the handler API.
//!
//! ```text
//! cargo run --example echo_server -- 127.0.0.1:8080
//! curl -v http://127.0.0.1:8080/echo -d 'hello'
//! curl -v http://127.0.0.1:8080/status/418
//! ```

use http::{HeaderValue, StatusCode, header};
use scratch_http::connection::ResponseWriter;
use scratch_http::handler::Handler;
use scratch_http::protocol::Request;
use scratch_http::server::Server;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

struct Routes;

impl Handler for Routes {
    async fn call(&self, req: &mut Request<'_>, resp: &mut ResponseWriter<'_>) {
        info!(method = %req.method(), target = req.target(), remote = ?req.remote_addr(), "receive request");

        let path = req.path().to_owned();
        let result = match path.as_str() {
            "/echo" => echo(req, resp).await,
            "/echo/chunked" => echo_chunked(req, resp).await,
            "/headers" => headers(req, resp).await,
            "/nothing" => Ok(()),
            p if p.starts_with("/status/") => status(&p["/status/".len()..], resp).await,
            _ => {
                resp.write_header(StatusCode::NOT_FOUND);
                resp.write(b"not found\n").await.map(|_| ())
            }
        };

        if let Err(e) = result {
            warn!(cause = %e, "failed to write response");
        }
    }
}

/// Reads the whole body and answers with a declared content length.
async fn echo(req: &mut Request<'_>, resp: &mut ResponseWriter<'_>) -> std::io::Result<()> {
    let body = match req.body_mut().bytes().await {
        Ok(body) => body,
        Err(e) => {
            resp.write_header(e.status_code());
            return Ok(());
        }
    };

    resp.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    resp.write(&body).await.map(|_| ())
}

/// Streams the body back piece by piece, chunk encoded.
async fn echo_chunked(req: &mut Request<'_>, resp: &mut ResponseWriter<'_>) -> std::io::Result<()> {
    loop {
        match req.body_mut().chunk().await {
            Ok(Some(chunk)) => {
                resp.write(&chunk).await?;
                resp.flush().await?;
            }
            Ok(None) => return Ok(()),
            Err(e) => {
                resp.write_header(e.status_code());
                return Ok(());
            }
        }
    }
}

async fn headers(req: &mut Request<'_>, resp: &mut ResponseWriter<'_>) -> std::io::Result<()> {
    let mut lines = String::new();
    for (name, value) in req.headers() {
        lines.push_str(&format!("{name}: {}\n", String::from_utf8_lossy(value.as_bytes())));
    }
    resp.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    resp.write(lines.as_bytes()).await.map(|_| ())
}

async fn status(code: &str, resp: &mut ResponseWriter<'_>) -> std::io::Result<()> {
    match code.parse::<u16>().ok().and_then(|code| StatusCode::from_u16(code).ok()) {
        Some(status) => resp.write_header(status),
        None => {
            resp.write_header(StatusCode::BAD_REQUEST);
            resp.write(b"invalid status code\n").await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let address = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:8080".to_owned());

    let server = match Server::builder().address(address.as_str()).build() {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, %address, "invalid server address");
            return;
        }
    };

    if let Err(e) = server.serve(Routes).await {
        error!(cause = %e, "server stopped");
    }
}
