//! In-memory fake of the key-manager (`/v1`) and networking (`/v2.0`) APIs.
//!
//! Resources converge the way the real services do, only faster and on
//! demand: new secrets and containers answer `PENDING` for a configurable
//! number of reads, IPSec policy deletes can be made to conflict, and
//! deleted port forwardings linger as `DOWN`. See [`ServerOptions`].
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

mod store;

pub use store::{ServerOptions, Store, FAILING_NAME_PREFIX};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use settle_schema::{
    ContainerCreate, IpsecPolicyCreate, IpsecPolicyUpdate, PortForwardingCreate,
    PortForwardingUpdate, SecretCreate, SecretMetadata, SecretPayloadUpdate,
};
use std::sync::Arc;
use thiserror::Error;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("authentication required")]
    Unauthorized,
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::NotFound => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::Conflict(_) => 409,
            ApiError::MethodNotAllowed => 405,
            ApiError::Unauthorized => 401,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Health,
    Secrets,
    Secret(&'a str),
    SecretMetadata(&'a str),
    Containers,
    Container(&'a str),
    IpsecPolicies,
    IpsecPolicy(&'a str),
    PortForwardings(&'a str),
    PortForwarding(&'a str, &'a str),
}

/// Parse a request URL into a route. Query strings are ignored.
pub fn parse_route(url: &str) -> Option<Route<'_>> {
    let path = url.split('?').next().unwrap_or(url).trim_end_matches('/');
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    let route = match segments[..] {
        ["health"] => Route::Health,
        ["v1", "secrets"] => Route::Secrets,
        ["v1", "secrets", id] => Route::Secret(id),
        ["v1", "secrets", id, "metadata"] => Route::SecretMetadata(id),
        ["v1", "containers"] => Route::Containers,
        ["v1", "containers", id] => Route::Container(id),
        ["v2.0", "vpn", "ipsecpolicies"] => Route::IpsecPolicies,
        ["v2.0", "vpn", "ipsecpolicies", id] => Route::IpsecPolicy(id),
        ["v2.0", "floatingips", fip, "port_forwardings"] => Route::PortForwardings(fip),
        ["v2.0", "floatingips", fip, "port_forwardings", id] => Route::PortForwarding(fip, id),
        _ => return None,
    };
    let empty_id = match route {
        Route::Secret(id)
        | Route::SecretMetadata(id)
        | Route::Container(id)
        | Route::IpsecPolicy(id)
        | Route::PortForwardings(id) => id.is_empty(),
        Route::PortForwarding(fip, id) => fip.is_empty() || id.is_empty(),
        _ => false,
    };
    if empty_id {
        None
    } else {
        Some(route)
    }
}

/// A response ready to send: status code and optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Option<Value>,
}

impl Reply {
    fn json(status: u16, body: impl Serialize) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::BadRequest(format!("unserializable response: {e}")))?;
        Ok(Self {
            status,
            body: Some(body),
        })
    }

    fn no_content() -> Result<Self, ApiError> {
        Ok(Self {
            status: 204,
            body: None,
        })
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8], envelope: Option<&str>) -> Result<T, ApiError> {
    let mut value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;
    if let Some(key) = envelope {
        value = value
            .get_mut(key)
            .map(Value::take)
            .ok_or_else(|| ApiError::BadRequest(format!("body must be wrapped in '{key}'")))?;
    }
    serde_json::from_value(value).map_err(|e| ApiError::BadRequest(format!("invalid body: {e}")))
}

fn found<T>(value: Option<T>) -> Result<T, ApiError> {
    value.ok_or(ApiError::NotFound)
}

fn removed(existed: bool) -> Result<Reply, ApiError> {
    if existed {
        Reply::no_content()
    } else {
        Err(ApiError::NotFound)
    }
}

/// Route one request against the store.
#[allow(clippy::too_many_lines)]
pub fn dispatch(
    store: &Store,
    method: &Method,
    route: Route<'_>,
    body: &[u8],
) -> Result<Reply, ApiError> {
    const IPSEC: Option<&str> = Some("ipsecpolicy");
    const PF: Option<&str> = Some("port_forwarding");

    match (route, method) {
        (Route::Health, Method::Get) => Reply::json(200, json!({"status": "ok"})),

        (Route::Secrets, Method::Post) => {
            let secret_ref = store.create_secret(parse_body::<SecretCreate>(body, None)?)?;
            info!("created secret {secret_ref}");
            Reply::json(201, json!({ "secret_ref": secret_ref }))
        }
        (Route::Secret(id), Method::Get) => Reply::json(200, found(store.get_secret(id))?),
        (Route::Secret(id), Method::Put) => {
            store.update_secret_payload(id, parse_body::<SecretPayloadUpdate>(body, None)?)?;
            Reply::no_content()
        }
        (Route::Secret(id), Method::Delete) => removed(store.delete_secret(id)),
        (Route::SecretMetadata(id), Method::Get) => {
            Reply::json(200, found(store.get_secret_metadata(id))?)
        }
        (Route::SecretMetadata(id), Method::Put) => {
            let SecretMetadata { metadata } = parse_body(body, None)?;
            Reply::json(201, store.put_secret_metadata(id, metadata)?)
        }

        (Route::Containers, Method::Post) => {
            let container_ref = store.create_container(parse_body::<ContainerCreate>(body, None)?)?;
            info!("created container {container_ref}");
            Reply::json(201, json!({ "container_ref": container_ref }))
        }
        (Route::Container(id), Method::Get) => Reply::json(200, found(store.get_container(id))?),
        (Route::Container(id), Method::Delete) => removed(store.delete_container(id)),

        (Route::IpsecPolicies, Method::Post) => {
            let policy = store.create_ipsec_policy(parse_body::<IpsecPolicyCreate>(body, IPSEC)?);
            info!("created ipsec policy {}", policy.id);
            Reply::json(201, json!({ "ipsecpolicy": policy }))
        }
        (Route::IpsecPolicy(id), Method::Get) => {
            Reply::json(200, json!({ "ipsecpolicy": found(store.get_ipsec_policy(id))? }))
        }
        (Route::IpsecPolicy(id), Method::Put) => {
            let update = parse_body::<IpsecPolicyUpdate>(body, IPSEC)?;
            let policy = store.update_ipsec_policy(id, update)?;
            Reply::json(200, json!({ "ipsecpolicy": policy }))
        }
        (Route::IpsecPolicy(id), Method::Delete) => {
            store.delete_ipsec_policy(id)?;
            Reply::no_content()
        }

        (Route::PortForwardings(fip), Method::Post) => {
            let request = parse_body::<PortForwardingCreate>(body, PF)?;
            let pf = store.create_port_forwarding(fip, request)?;
            info!("created port forwarding {} on {fip}", pf.id);
            Reply::json(201, json!({ "port_forwarding": pf }))
        }
        (Route::PortForwarding(fip, id), Method::Get) => Reply::json(
            200,
            json!({ "port_forwarding": found(store.get_port_forwarding(fip, id))? }),
        ),
        (Route::PortForwarding(fip, id), Method::Put) => {
            let update = parse_body::<PortForwardingUpdate>(body, PF)?;
            let pf = store.update_port_forwarding(fip, id, update)?;
            Reply::json(200, json!({ "port_forwarding": pf }))
        }
        (Route::PortForwarding(fip, id), Method::Delete) => {
            store.delete_port_forwarding(fip, id)?;
            Reply::no_content()
        }

        _ => Err(ApiError::MethodNotAllowed),
    }
}

fn authorized(store: &Store, req: &tiny_http::Request) -> bool {
    let Some(expected) = store.options().auth_token.as_deref() else {
        return true;
    };
    req.headers()
        .iter()
        .any(|h| h.field.equiv("X-Auth-Token") && h.value.as_str() == expected)
}

fn read_body(req: &mut tiny_http::Request) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    if req.as_reader().read_to_end(&mut body).is_ok() {
        Some(body)
    } else {
        None
    }
}

fn respond(req: tiny_http::Request, reply: Reply) {
    let status = reply.status;
    let result = match reply.body {
        Some(body) => {
            let header =
                Header::from_bytes("Content-Type", "application/json").expect("valid header");
            req.respond(
                Response::from_string(body.to_string())
                    .with_status_code(StatusCode(status))
                    .with_header(header),
            )
        }
        None => req.respond(Response::empty(StatusCode(status))),
    };
    if let Err(e) = result {
        error!("failed to write {status} response: {e}");
    }
}

fn respond_err(req: tiny_http::Request, err: &ApiError) {
    let status = err.status();
    respond(
        req,
        Reply {
            status,
            body: Some(json!({ "code": status, "title": err.to_string() })),
        },
    );
}

/// Handle a single HTTP request, dispatching to the appropriate route handler.
pub fn handle_request(store: &Store, mut req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let Some(route) = parse_route(&url) else {
        respond_err(req, &ApiError::NotFound);
        return;
    };
    if route != Route::Health && !authorized(store, &req) {
        respond_err(req, &ApiError::Unauthorized);
        return;
    }
    let Some(body) = read_body(&mut req) else {
        respond_err(req, &ApiError::BadRequest("unreadable body".to_owned()));
        return;
    };
    match dispatch(store, &method, route, &body) {
        Ok(reply) => respond(req, reply),
        Err(e) => {
            debug!("{method} {url}: {} {e}", e.status());
            respond_err(req, &e);
        }
    }
}

/// Start the server loop, blocking the current thread.
pub fn run_server(
    store: &Store,
    addr: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = Server::http(addr)?;
    for request in server.incoming_requests() {
        handle_request(store, request);
    }
    Ok(())
}

/// A test helper that starts a settle-server on a random port in a background thread.
///
/// The server listens on `127.0.0.1:{port}`. Dropping the `TestServer`
/// stops it.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub store: Arc<Store>,
    server: Arc<Server>,
    _handle: std::thread::JoinHandle<()>,
}

impl TestServer {
    /// Binds to `127.0.0.1:0` (random port).
    pub fn start(options: ServerOptions) -> Self {
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let store = Arc::new(Store::new(url.clone(), options));
        let srv = Arc::clone(&server);
        let st = Arc::clone(&store);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                handle_request(&st, request);
            }
        });

        Self {
            url,
            port,
            store,
            server,
            _handle: handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}
