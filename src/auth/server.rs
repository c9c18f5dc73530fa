//! Local listener standing in for the client root during sign-in.
//!
//! The API finishes its OAuth round trip by redirecting the browser to
//! `http://localhost:{port}/?token=...`. The listener takes the token,
//! redirects the browser to the same address without it, then serves a
//! success page.

use super::AuthError;
use super::session::Session;
use std::io::Cursor;
use std::time::{Duration, Instant};
use tiny_http::{Header, Request, Response, Server, StatusCode};
use url::Url;

/// How long to wait for the browser to follow the token-stripping redirect
/// once the credential is stored.
const FOLLOW_UP_GRACE: Duration = Duration::from_secs(5);

type HtmlResponse = Response<Cursor<Vec<u8>>>;

/// What to do with one incoming request.
#[derive(Debug)]
enum Route {
    /// Token consumed; send the browser to the cleaned address.
    Redirect(String),
    Success,
    Failed(AuthError),
    NotFound,
}

pub struct CallbackServer {
    server: Server,
    port: u16,
}

impl CallbackServer {
    /// Bind on `127.0.0.1:{port}`. Port 0 picks a free port.
    pub fn bind(port: u16) -> Result<Self, AuthError> {
        let server = Server::http(("127.0.0.1", port)).map_err(|e| AuthError::Bind {
            port,
            reason: e.to_string(),
        })?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| AuthError::Bind {
                port,
                reason: "unable to determine bound port".into(),
            })?;
        Ok(Self { server, port })
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The address the API should redirect to after sign-in.
    #[must_use]
    pub fn client_root(&self) -> String {
        format!("http://localhost:{}/", self.port)
    }

    /// Serve requests until the browser delivers a token, fails, or
    /// `timeout` elapses. Blocking.
    pub fn wait_for_credential(self, session: &Session, timeout: Duration) -> Result<(), AuthError> {
        let start = Instant::now();
        let mut received_at: Option<Instant> = None;

        loop {
            let deadline = match received_at {
                Some(at) => at + FOLLOW_UP_GRACE,
                None => start + timeout,
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                // The browser never came back for the success page; the
                // credential is stored either way.
                return if received_at.is_some() {
                    Ok(())
                } else {
                    Err(AuthError::Timeout)
                };
            }

            let Some(request) = self.server.recv_timeout(remaining)? else {
                continue;
            };

            let route = route(session, request.url(), received_at.is_some());
            tracing::debug!(?route, "callback request");
            match route {
                Route::Redirect(location) => {
                    respond(request, redirect(&location));
                    received_at = Some(Instant::now());
                }
                Route::Success => {
                    respond(request, html(200, SUCCESS_PAGE.to_string()));
                    return Ok(());
                }
                Route::Failed(error) => {
                    respond(request, html(400, failure_page(&error.to_string())));
                    return Err(error);
                }
                Route::NotFound => {
                    respond(request, Response::from_string("Not Found").with_status_code(StatusCode(404)));
                }
            }
        }
    }
}

fn route(session: &Session, raw_url: &str, received: bool) -> Route {
    let Ok(mut url) = Url::parse(&format!("http://localhost{raw_url}")) else {
        return Route::NotFound;
    };
    if url.path() != "/" {
        return Route::NotFound;
    }

    match session.consume_credential_from_callback(&mut url) {
        Ok(Some(_)) => {
            let location = match url.query() {
                Some(query) => format!("/?{query}"),
                None => "/".to_string(),
            };
            Route::Redirect(location)
        }
        Ok(None) if received => Route::Success,
        Ok(None) => match url.query_pairs().find(|(k, _)| k == "error") {
            Some((_, error)) => Route::Failed(AuthError::Provider(format!("Sign-in failed: {error}"))),
            None => Route::Failed(AuthError::MissingToken),
        },
        Err(e) => Route::Failed(e),
    }
}

fn respond(request: Request, response: HtmlResponse) {
    if let Err(e) = request.respond(response) {
        tracing::debug!("failed to answer callback request: {e}");
    }
}

fn redirect(location: &str) -> HtmlResponse {
    let mut response = Response::from_data(Vec::new()).with_status_code(StatusCode(302));
    if let Ok(header) = Header::from_bytes(&b"Location"[..], location.as_bytes()) {
        response.add_header(header);
    }
    response
}

fn html(status: u16, body: String) -> HtmlResponse {
    let mut response = Response::from_string(body).with_status_code(StatusCode(status));
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]) {
        response.add_header(header);
    }
    response
}

const SUCCESS_PAGE: &str = r"<!DOCTYPE html>
<html>
<head>
    <title>Welcome!</title>
    <style>
        body { font-family: system-ui, sans-serif; text-align: center; padding: 50px; }
        h1 { color: #2563eb; }
    </style>
</head>
<body>
    <h1>Welcome!</h1>
    <p>You've been successfully logged in. You can close this tab and return to shoplist.</p>
</body>
</html>";

fn failure_page(reason: &str) -> String {
    format!(
        r"<!DOCTYPE html>
<html>
<head>
    <title>Login Failed</title>
    <style>
        body {{ font-family: system-ui, sans-serif; text-align: center; padding: 50px; }}
        h1 {{ color: #ef4444; }}
    </style>
</head>
<body>
    <h1>Login Failed</h1>
    <p>{}</p>
    <p>Please try again.</p>
</body>
</html>",
        html_escape(reason)
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
