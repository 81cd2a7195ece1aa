use crate::{RemoteConfig, RemoteError, ResourceApi, AUTH_HEADER};
use serde_json::Value;
use std::io::Read;

/// ureq-backed [`ResourceApi`].
///
/// Every request carries `Accept: application/json` and, when configured,
/// the `X-Auth-Token` header. 404 maps to `RemoteError::NotFound`, other
/// error statuses to `RemoteError::Status`, connection failures to
/// `RemoteError::Http`.
pub struct HttpApi {
    config: RemoteConfig,
    agent: ureq::Agent,
}

type BodyRequest = ureq::RequestBuilder<ureq::typestate::WithBody>;
type BodylessRequest = ureq::RequestBuilder<ureq::typestate::WithoutBody>;
type Response = ureq::http::Response<ureq::Body>;

impl HttpApi {
    pub fn new(config: RemoteConfig) -> Self {
        let agent = ureq::Agent::new_with_defaults();
        Self { config, agent }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url, path)
    }

    fn with_body_headers(&self, mut req: BodyRequest) -> BodyRequest {
        req = req
            .header("Accept", "application/json")
            .header("Content-Type", "application/json");
        if let Some(ref token) = self.config.auth_token {
            req = req.header(AUTH_HEADER, token);
        }
        req
    }

    fn with_headers(&self, mut req: BodylessRequest) -> BodylessRequest {
        req = req.header("Accept", "application/json");
        if let Some(ref token) = self.config.auth_token {
            req = req.header(AUTH_HEADER, token);
        }
        req
    }

    fn do_send(&self, req: BodyRequest, url: &str, body: &Value) -> Result<Value, RemoteError> {
        let data = serde_json::to_vec(body).map_err(|e| RemoteError::Serialization(e.to_string()))?;
        let resp = self
            .with_body_headers(req)
            .send(&data[..])
            .map_err(|e| map_ureq_error(url, e))?;
        read_json(url, resp)
    }

    fn do_call(&self, req: BodylessRequest, url: &str) -> Result<Value, RemoteError> {
        let resp = self
            .with_headers(req)
            .call()
            .map_err(|e| map_ureq_error(url, e))?;
        read_json(url, resp)
    }
}

fn map_ureq_error(url: &str, err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::StatusCode(404) => RemoteError::NotFound(url.to_owned()),
        ureq::Error::StatusCode(code) => RemoteError::Status {
            code,
            url: url.to_owned(),
        },
        e => RemoteError::Http(e.to_string()),
    }
}

fn read_json(url: &str, resp: Response) -> Result<Value, RemoteError> {
    let code = resp.status().as_u16();
    if code == 404 {
        return Err(RemoteError::NotFound(url.to_owned()));
    }
    if code >= 400 {
        return Err(RemoteError::Status {
            code,
            url: url.to_owned(),
        });
    }

    let mut reader = resp.into_body().into_reader();
    let mut body = Vec::new();
    reader
        .read_to_end(&mut body)
        .map_err(|e| RemoteError::Http(e.to_string()))?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&body)
        .map_err(|e| RemoteError::Serialization(format!("invalid JSON from {url}: {e}")))
}

impl ResourceApi for HttpApi {
    fn create(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        let url = self.url(path);
        tracing::debug!("POST {url}");
        self.do_send(self.agent.post(&url), &url, body)
    }

    fn get(&self, path: &str) -> Result<Value, RemoteError> {
        let url = self.url(path);
        tracing::debug!("GET {url}");
        self.do_call(self.agent.get(&url), &url)
    }

    fn update(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        let url = self.url(path);
        tracing::debug!("PUT {url}");
        self.do_send(self.agent.put(&url), &url, body)
    }

    fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let url = self.url(path);
        tracing::debug!("DELETE {url}");
        self.do_call(self.agent.delete(&url), &url).map(|_| ())
    }
}
