//! Spec download and health probe

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use url::Url;

use crate::error::FetchError;
use crate::trace::Tracer;
use crate::transport::{endpoint, CancelToken, HttpRequest, HttpResponse, Transport};

/// Everything needed to talk to the remote before any command exists.
pub struct Remote<'a> {
    pub transport: &'a dyn Transport,
    pub tracer: &'a dyn Tracer,
    pub cancel: &'a CancelToken,
    pub user_agent: &'a str,
}

impl Remote<'_> {
    /// `GET <base><spec_path>` and return the body. Non-2xx is an error.
    pub fn fetch_spec(&self, base_url: &str, spec_path: &str) -> Result<String, FetchError> {
        let url = endpoint(base_url, spec_path);
        let mut response = self.get("swagger", &url)?;
        response
            .text()
            .map_err(|source| FetchError::Body { url, source })
    }

    /// `GET <base><health_path>` expecting any 2xx. An empty path skips the probe.
    pub fn check_health(&self, base_url: &str, health_path: &str) -> Result<(), FetchError> {
        if health_path.is_empty() {
            return Ok(());
        }
        self.get("health", &endpoint(base_url, health_path))
            .map(|_| ())
    }

    fn get(&self, span_name: &'static str, url: &str) -> Result<HttpResponse, FetchError> {
        let span = self.tracer.start_span(span_name);

        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_owned(),
            source,
        })?;
        let mut request = HttpRequest::new(Method::GET, parsed);
        request.headers = self.headers();
        self.tracer.inject(&span, &mut request.headers);

        let response = self
            .transport
            .send(request, self.cancel)
            .map_err(|source| FetchError::Transport {
                url: url.to_owned(),
                source,
            })?;

        if !response.status.is_success() {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status: response.status,
            });
        }
        Ok(response)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        match HeaderValue::from_str(self.user_agent) {
            Ok(value) => {
                headers.insert(USER_AGENT, value);
            }
            Err(_) => tracing::warn!(user_agent = self.user_agent, "invalid user agent, omitting"),
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::trace::{NoopTracer, W3cTracer};
    use crate::transport::ReqwestTransport;

    fn fetch(server: &mockito::Server, path: &str) -> Result<String, FetchError> {
        let transport = ReqwestTransport::new(None).unwrap();
        let remote = Remote {
            transport: &transport,
            tracer: &W3cTracer::new(),
            cancel: &CancelToken::new(),
            user_agent: "swagger-cmd",
        };
        remote.fetch_spec(&server.url(), path)
    }

    #[test]
    fn fetch_spec_returns_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/swagger.json")
            .match_header("accept", "application/json")
            .match_header("user-agent", "swagger-cmd")
            .match_header(
                "traceparent",
                mockito::Matcher::Regex("^00-[0-9a-f]{32}-[0-9a-f]{16}-01$".into()),
            )
            .with_status(200)
            .with_body(r#"{"paths":{}}"#)
            .create();

        assert_eq!(fetch(&server, "/swagger.json").unwrap(), r#"{"paths":{}}"#);
        mock.assert();
    }

    #[test]
    fn fetch_spec_rejects_non_success_status() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/swagger.json")
            .with_status(404)
            .with_body("not found")
            .create();

        let err = fetch(&server, "/swagger.json").unwrap_err();
        assert!(
            matches!(err, FetchError::Status { status, .. } if status.as_u16() == 404),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn fetch_spec_rejects_invalid_base_url() {
        let transport = ReqwestTransport::new(None).unwrap();
        let remote = Remote {
            transport: &transport,
            tracer: &NoopTracer,
            cancel: &CancelToken::new(),
            user_agent: "swagger-cmd",
        };

        let err = remote.fetch_spec("not a url", "/swagger.json").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn fetch_spec_reports_cancellation() {
        let transport = ReqwestTransport::new(None).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let remote = Remote {
            transport: &transport,
            tracer: &NoopTracer,
            cancel: &cancel,
            user_agent: "swagger-cmd",
        };

        let err = remote
            .fetch_spec("http://127.0.0.1:9", "/swagger.json")
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Transport {
                source: TransportError::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn check_health_is_skipped_for_empty_path() {
        let mut server = mockito::Server::new();
        let mock = server.mock("GET", mockito::Matcher::Any).expect(0).create();

        let transport = ReqwestTransport::new(None).unwrap();
        let remote = Remote {
            transport: &transport,
            tracer: &NoopTracer,
            cancel: &CancelToken::new(),
            user_agent: "swagger-cmd",
        };

        assert!(remote.check_health(&server.url(), "").is_ok());
        mock.assert();
    }

    #[test]
    fn check_health_fails_on_server_error() {
        let mut server = mockito::Server::new();
        let ok = server.mock("GET", "/healthz").with_status(204).create();
        let down = server.mock("GET", "/down").with_status(503).create();

        let transport = ReqwestTransport::new(None).unwrap();
        let remote = Remote {
            transport: &transport,
            tracer: &NoopTracer,
            cancel: &CancelToken::new(),
            user_agent: "swagger-cmd",
        };

        assert!(remote.check_health(&server.url(), "/healthz").is_ok());
        let err = remote.check_health(&server.url(), "/down").unwrap_err();
        assert!(matches!(err, FetchError::Status { status, .. } if status.as_u16() == 503));
        ok.assert();
        down.assert();
    }
}
