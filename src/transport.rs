//! HTTP transport seam
//!
//! Every network call goes through [`Transport`], so tests can swap in a
//! fake and callers can wrap the real one with retries or timeouts.

use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use url::Url;

use crate::error::TransportError;

/// Cooperative cancellation shared by every call of one invocation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying flag, for wiring to signal handlers.
    pub fn shared_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }

    /// Fail with [`TransportError::Cancelled`] once cancelled.
    pub fn check(&self) -> Result<(), TransportError> {
        if self.is_cancelled() {
            Err(TransportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A fully built request, ready to send.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
        }
    }
}

/// Response status plus an unread body.
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }

    /// Read the whole body as sent.
    pub fn bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read the whole body, replacing invalid UTF-8.
    pub fn text(&mut self) -> io::Result<String> {
        let buf = self.bytes()?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Sends requests. Implementations must refuse to send once `cancel` is set,
/// and should abort a call that is still waiting when it is set.
pub trait Transport {
    fn send(
        &self,
        request: HttpRequest,
        cancel: &CancelToken,
    ) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(TransportError::Request)?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    /// The exchange runs on a worker thread while the caller polls `cancel`.
    /// A cancelled call returns at once and the worker is left to finish.
    fn send(
        &self,
        request: HttpRequest,
        cancel: &CancelToken,
    ) -> Result<HttpResponse, TransportError> {
        cancel.check()?;

        tracing::debug!(method = %request.method, url = %request.url, "request");
        let pending = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("swagger-cmd-http".to_owned())
            .spawn(move || {
                let result = pending
                    .send()
                    .map(|resp| (resp.status(), BufferedBody::drain(resp)));
                // Nobody is listening once the call was cancelled.
                let _ = tx.send(result);
            })?;

        loop {
            match rx.recv_timeout(CANCEL_POLL) {
                Ok(result) => {
                    let (status, body) = result.map_err(TransportError::Request)?;
                    return Ok(HttpResponse::new(status, body));
                }
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled() {
                        tracing::debug!("request cancelled in flight");
                        return Err(TransportError::Cancelled);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TransportError::Io(io::Error::other(
                        "request worker exited without a response",
                    )));
                }
            }
        }
    }
}

const CANCEL_POLL: Duration = Duration::from_millis(25);

/// A body read to the end on the worker thread. A read failure is replayed
/// to the first reader.
struct BufferedBody {
    data: Cursor<Vec<u8>>,
    error: Option<io::Error>,
}

impl BufferedBody {
    fn drain(mut resp: Response) -> Self {
        let mut data = Vec::new();
        let error = resp.read_to_end(&mut data).err();
        Self {
            data: Cursor::new(data),
            error,
        }
    }
}

impl Read for BufferedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.error.take() {
            Some(err) => Err(err),
            None => self.data.read(buf),
        }
    }
}

/// Join a base URL and a path with exactly one `/` between them.
pub fn endpoint(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.is_empty() || path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, ACCEPT};
    use std::net::TcpListener;
    use std::time::Instant;

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(endpoint("http://h:1/", "/a"), "http://h:1/a");
        assert_eq!(endpoint("http://h:1", "a"), "http://h:1/a");
        assert_eq!(endpoint("http://h:1/api", "/a/b"), "http://h:1/api/a/b");
        assert_eq!(endpoint("http://h:1", ""), "http://h:1");
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());

        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(TransportError::Cancelled)));
    }

    #[test]
    fn reqwest_transport_sends_request_with_headers() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/ping")
            .match_header("accept", "text/plain")
            .with_status(202)
            .with_body("pong")
            .create();

        let url = Url::parse(&endpoint(&server.url(), "/ping")).unwrap();
        let mut request = HttpRequest::new(Method::GET, url);
        request
            .headers
            .insert(ACCEPT, HeaderValue::from_static("text/plain"));

        let transport = ReqwestTransport::new(Some(Duration::from_secs(5))).unwrap();
        let mut response = transport.send(request, &CancelToken::new()).unwrap();

        assert_eq!(response.status, StatusCode::ACCEPTED);
        assert_eq!(response.text().unwrap(), "pong");
        mock.assert();
    }

    #[test]
    fn reqwest_transport_refuses_cancelled_requests() {
        let mut server = mockito::Server::new();
        let mock = server.mock("GET", "/ping").expect(0).create();

        let url = Url::parse(&endpoint(&server.url(), "/ping")).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let transport = ReqwestTransport::new(None).unwrap();
        let result = transport.send(HttpRequest::new(Method::GET, url), &cancel);

        assert!(matches!(result, Err(TransportError::Cancelled)));
        mock.assert();
    }

    #[test]
    fn http_response_text_replaces_invalid_utf8() {
        let mut response = HttpResponse::new(StatusCode::OK, &b"ok \xff"[..]);
        assert_eq!(response.text().unwrap(), "ok \u{fffd}");
    }

    #[test]
    fn reqwest_transport_aborts_hung_request_on_cancel() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            // Accept, then never answer.
            let _held: Vec<_> = listener.incoming().take(1).collect();
            thread::sleep(Duration::from_secs(30));
        });

        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });

        let url = Url::parse(&format!("http://{addr}/hang")).unwrap();
        let started = Instant::now();
        let result = ReqwestTransport::new(None)
            .unwrap()
            .send(HttpRequest::new(Method::GET, url), &cancel);

        assert!(matches!(result, Err(TransportError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancel_token_shares_its_flag() {
        let token = CancelToken::new();
        token.shared_flag().store(true, Ordering::SeqCst);
        assert!(token.is_cancelled());
    }

    #[test]
    fn http_response_bytes_are_verbatim() {
        let mut response = HttpResponse::new(StatusCode::OK, &b"ok \xff\n"[..]);
        assert_eq!(response.bytes().unwrap(), b"ok \xff\n");
    }

    #[test]
    fn buffered_body_replays_read_error_first() {
        let mut body = BufferedBody {
            data: Cursor::new(b"partial".to_vec()),
            error: Some(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        };
        let mut buf = Vec::new();

        let err = body.read_to_end(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
