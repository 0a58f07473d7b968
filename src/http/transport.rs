// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Send step: turns a [`Request`] into a [`Response`]

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, COOKIE};
use reqwest::redirect::Policy;
use reqwest::{Certificate, Client, Identity};

use super::pool::{ClientSettings, DEFAULT_POOLSIZE};
use super::request::{Body, ClientCert, Request, Verify};
use super::response::{DeferredBody, Response};
use crate::error::{Error, ErrorContext, Result};

/// Redirect cap when `config.max_redirects` is absent
pub const DEFAULT_MAX_REDIRECTS: usize = 30;

/// Send capability used by sessions
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request. With `prefetch` the body is read before returning.
    async fn send(&self, request: &Request, prefetch: bool) -> Result<Response>;
}

/// Transport backed by reqwest, reusing connections from the request's pool
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    /// Create the transport
    pub fn new() -> Self {
        Self
    }

    fn settings(request: &Request) -> ClientSettings {
        let max_redirects = if request.allow_redirects() {
            let cap = request
                .config_u64("max_redirects")
                .map(|n| n as usize)
                .unwrap_or(DEFAULT_MAX_REDIRECTS);
            Some(cap)
        } else {
            None
        };

        ClientSettings {
            verify: request.verify().clone(),
            cert: request.cert().cloned(),
            proxies: request
                .proxies()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            max_redirects,
        }
    }

    fn build_client(settings: &ClientSettings, maxsize: usize) -> Result<Client> {
        let redirect = match settings.max_redirects {
            Some(max) => Policy::limited(max),
            None => Policy::none(),
        };

        let mut builder = Client::builder()
            .redirect(redirect)
            .pool_max_idle_per_host(if maxsize == 0 { DEFAULT_POOLSIZE } else { maxsize })
            .cookie_store(false); // Cookies are handled by the session jar

        builder = match &settings.verify {
            Verify::Enabled => builder,
            Verify::Disabled => builder.danger_accept_invalid_certs(true),
            Verify::CaBundle(path) => {
                let pem = std::fs::read(path).context("reading CA bundle")?;
                let cert = Certificate::from_pem(&pem)
                    .map_err(|e| Error::config(format!("Invalid CA bundle {}: {}", path.display(), e)))?;
                builder.add_root_certificate(cert)
            }
        };

        if let Some(cert) = &settings.cert {
            let pem = match cert {
                ClientCert::Pem(path) => std::fs::read(path).context("reading client certificate")?,
                ClientCert::Pair { cert, key } => {
                    let mut pem = std::fs::read(cert)?;
                    pem.push(b'\n');
                    pem.extend(std::fs::read(key)?);
                    pem
                }
            };
            let identity = Identity::from_pem(&pem)
                .map_err(|e| Error::config(format!("Invalid client certificate: {}", e)))?;
            builder = builder.identity(identity);
        }

        for (scheme, proxy_url) in &settings.proxies {
            let proxy = match scheme.as_str() {
                "http" => reqwest::Proxy::http(proxy_url),
                "https" => reqwest::Proxy::https(proxy_url),
                "all" => reqwest::Proxy::all(proxy_url),
                other => {
                    tracing::debug!(scheme = other, "Ignoring proxy for unsupported scheme");
                    continue;
                }
            }
            .map_err(|e| Error::config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| Error::config(format!("Invalid client settings: {}", e)))
    }
}

/// Map reqwest failures onto the transport error family. Builder errors
/// come from the request itself and stay input errors.
fn transport_error(err: reqwest::Error, url: &str, request: &Request) -> Error {
    if err.is_builder() {
        return Error::type_error(format!("Invalid request for {}: {}", url, err));
    }
    if err.is_timeout() {
        let ms = request.timeout().map(|t| t.as_millis() as u64).unwrap_or(0);
        return Error::timeout_with_url("send", ms, url);
    }
    Error::Http(err)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &Request, prefetch: bool) -> Result<Response> {
        let start = Instant::now();
        let url = request.full_url();

        let connection = request.pool().acquire(&url).await.with_url(url.as_str())?;
        let settings = Self::settings(request);
        let client = connection.client_for(&settings, Self::build_client)?;

        let mut headers = request.header_map()?;
        if let Some(cookie_header) = request.cookies().get_cookie_header(&url) {
            let value = HeaderValue::from_str(&cookie_header)
                .map_err(|_| Error::Cookie("cookie values are not valid header text".into()))?;
            headers.insert(COOKIE, value);
        }
        if let Some(auth) = request.auth() {
            auth.apply(&url, &mut headers)?;
        }

        let mut builder = client
            .request(request.method().clone(), url.clone())
            .headers(headers);

        if let Some(timeout) = request.timeout() {
            builder = builder.timeout(timeout);
        }

        if request.files().is_empty() {
            builder = match request.body().clone() {
                Body::Empty => builder,
                Body::Bytes(b) => builder.body(b),
                Body::Text(s) => builder.body(s),
                Body::Form(fields) => builder.form(&fields),
                Body::Json(value) => builder.json(&value),
            };
        } else {
            let mut form = reqwest::multipart::Form::new();
            if let Body::Form(fields) = request.body() {
                for (name, value) in fields {
                    form = form.text(name.clone(), value.clone());
                }
            }
            for file in request.files() {
                let mut part = reqwest::multipart::Part::bytes(file.content.to_vec())
                    .file_name(file.file_name.clone());
                if let Some(mime) = &file.mime {
                    part = part.mime_str(mime).map_err(|e| {
                        Error::type_error(format!("Invalid MIME type {:?} for {}: {}", mime, file.field, e))
                    })?;
                }
                form = form.part(file.field.clone(), part);
            }
            builder = builder.multipart(form);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, url.as_str(), request))?;

        let final_url = response.url().clone();
        let redirected = final_url != url;
        let status = response.status();
        let headers = response.headers().clone();

        let response = if prefetch {
            let body = response
                .bytes()
                .await
                .map_err(|e| transport_error(e, url.as_str(), request))?;
            drop(connection);
            Response::new(
                status,
                headers,
                body,
                final_url,
                redirected,
                start.elapsed().as_millis() as u64,
            )
        } else {
            Response::deferred(
                status,
                headers,
                DeferredBody::new(response, connection),
                final_url,
                redirected,
                start.elapsed().as_millis() as u64,
            )
        };

        tracing::debug!(
            method = %request.method(),
            url = %url,
            status = %status,
            time_ms = response.response_time_ms,
            "Transport response"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::FileField;
    use crate::session::{RequestOptions, Session};
    use serde_json::json;
    use wiremock::matchers::{
        body_string, body_string_contains, header, header_exists, method, path, query_param,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> Session {
        Session::builder()
            .header("X-Session", "yes")
            .cookie("sid", "abc")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_merged_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("page", "2"))
            .and(header("x-session", "yes"))
            .and(header("x-call", "1"))
            .and(header("cookie", "sid=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let s = session();
        let resp = s
            .get(
                &format!("{}/items", server.uri()),
                RequestOptions::new().param("page", "2").header("X-Call", "1"),
            )
            .await
            .unwrap()
            .into_response()
            .unwrap();

        assert!(resp.is_success());
        assert_eq!(resp.text().unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_unset_session_header_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_exists("x-secret"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/plain"))
            .and(header("x-other", "kept"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let s = Session::builder()
            .header("X-Other", "kept")
            .header("X-Secret", "token")
            .build()
            .unwrap();
        let outcome = s
            .get(
                &format!("{}/plain", server.uri()),
                RequestOptions::new().unset_header("x-secret"),
            )
            .await
            .unwrap();

        let resp = outcome.into_response().unwrap();
        assert_eq!(resp.status_code(), Some(204));
    }

    #[tokio::test]
    async fn test_set_cookie_persists_into_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_string("user=me"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("set-cookie", "token=t1; Path=/"),
            )
            .mount(&server)
            .await;

        let s = Session::new().unwrap();
        let resp = s
            .post(&format!("{}/login", server.uri()), "user=me", RequestOptions::new())
            .await
            .unwrap()
            .into_response()
            .unwrap();

        assert_eq!(resp.cookies.get("token").as_deref(), Some("t1"));
        assert_eq!(s.cookies().get("token").as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_redirects_follow_allow_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", format!("{}/new", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302))
            .mount(&server)
            .await;

        let s = Session::new().unwrap();
        let url = format!("{}/old", server.uri());

        let followed = s.get(&url, RequestOptions::new()).await.unwrap().into_response().unwrap();
        assert_eq!(followed.status_code(), Some(200));
        assert!(followed.redirected);

        let head = s.head(&url, RequestOptions::new()).await.unwrap().into_response().unwrap();
        assert_eq!(head.status_code(), Some(302));
        assert!(!head.redirected);
    }

    #[tokio::test]
    async fn test_json_body_and_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/doc"))
            .and(header("authorization", "Bearer tok"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"saved": true})))
            .expect(1)
            .mount(&server)
            .await;

        let s = Session::builder().auth(crate::http::Auth::bearer("tok")).build().unwrap();
        let resp = s
            .put(&format!("{}/doc", server.uri()), json!({"a": 1}), RequestOptions::new())
            .await
            .unwrap()
            .into_response()
            .unwrap();

        let body: serde_json::Value = resp.json().unwrap();
        assert_eq!(body["saved"], true);
    }

    #[tokio::test]
    async fn test_deferred_body_is_loaded_on_demand() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lazy"))
            .respond_with(ResponseTemplate::new(200).set_body_string("later"))
            .mount(&server)
            .await;

        let s = Session::new().unwrap();
        let mut resp = s
            .get(&format!("{}/lazy", server.uri()), RequestOptions::new().prefetch(false))
            .await
            .unwrap()
            .into_response()
            .unwrap();

        assert!(!resp.is_loaded());
        assert_eq!(resp.load().await.unwrap().as_ref(), b"later");
        assert!(resp.is_loaded());
    }

    #[tokio::test]
    async fn test_multipart_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(body_string_contains("filename=\"a.txt\""))
            .and(body_string_contains("hello"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let s = Session::new().unwrap();
        let resp = s
            .post(
                &format!("{}/upload", server.uri()),
                crate::http::Body::Empty,
                RequestOptions::new().file(FileField::new("doc", "a.txt", "hello").mime("text/plain")),
            )
            .await
            .unwrap()
            .into_response()
            .unwrap();
        assert_eq!(resp.status_code(), Some(201));
    }

    #[tokio::test]
    async fn test_safe_mode_keeps_invalid_mime_as_input_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let s = Session::builder().safe_mode(true).build().unwrap();
        let err = s
            .post(
                &format!("{}/upload", server.uri()),
                crate::http::Body::Empty,
                RequestOptions::new().file(FileField::new("doc", "a.txt", "hello").mime("nonsense")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Type(ref msg) if msg.contains("nonsense")));
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn test_deferred_body_holds_its_pool_slot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lazy"))
            .respond_with(ResponseTemplate::new(200).set_body_string("later"))
            .mount(&server)
            .await;

        let s = Session::builder()
            .config("pool_maxsize", 1)
            .config("pool_block", true)
            .build()
            .unwrap();
        let url = url::Url::parse(&format!("{}/lazy", server.uri())).unwrap();
        let mut resp = s
            .get(url.as_str(), RequestOptions::new().prefetch(false))
            .await
            .unwrap()
            .into_response()
            .unwrap();

        assert_eq!(s.pool().stats().active_connections, 1);
        let waiting =
            tokio::time::timeout(std::time::Duration::from_millis(100), s.pool().acquire(&url)).await;
        assert!(waiting.is_err());

        assert_eq!(resp.load().await.unwrap().as_ref(), b"later");
        assert_eq!(s.pool().stats().active_connections, 0);
        let next =
            tokio::time::timeout(std::time::Duration::from_secs(1), s.pool().acquire(&url)).await;
        assert!(matches!(next, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let s = Session::new().unwrap();
        let err = s
            .get("http://127.0.0.1:9/", RequestOptions::new().timeout(std::time::Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_missing_ca_bundle_fails_before_send() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("missing-ca.pem");

        let s = Session::builder().verify(bundle).build().unwrap();
        let err = s
            .get("https://example.com/", RequestOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Other(ref msg) if msg.starts_with("reading CA bundle")));
        assert!(!err.is_transport());
    }

    async fn built(s: &Session, opts: RequestOptions) -> Request {
        s.get("https://example.com/", opts.return_response(false))
            .await
            .unwrap()
            .into_request()
            .unwrap()
    }

    #[tokio::test]
    async fn test_settings_respect_redirect_cap() {
        let s = Session::builder().config("max_redirects", json!(3)).build().unwrap();
        let req = built(&s, RequestOptions::new()).await;
        assert_eq!(ReqwestTransport::settings(&req).max_redirects, Some(3));

        let req = built(&s, RequestOptions::new().allow_redirects(false)).await;
        assert_eq!(ReqwestTransport::settings(&req).max_redirects, None);

        let req = built(&s, RequestOptions::new().proxy("https", "http://proxy:3128").verify(false)).await;
        let settings = ReqwestTransport::settings(&req);
        assert_eq!(settings.proxies, vec![("https".to_string(), "http://proxy:3128".to_string())]);
        assert_eq!(settings.verify, Verify::Disabled);
    }
}
