//! HTTP-level tests against an in-process `settle-server`.

use settle_server::{ServerOptions, TestServer};
use std::io::Read;

fn body_json(resp: ureq::http::Response<ureq::Body>) -> serde_json::Value {
    let mut body = Vec::new();
    resp.into_body()
        .into_reader()
        .read_to_end(&mut body)
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post(url: &str, body: &str) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    ureq::post(url)
        .header("Content-Type", "application/json")
        .send(body.as_bytes())
}

#[test]
fn health_endpoint() {
    let server = TestServer::start(ServerOptions::default());
    let resp = ureq::get(&format!("{}/health", server.url)).call().unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(body_json(resp)["status"], "ok");
}

#[test]
fn unknown_route_is_404() {
    let server = TestServer::start(ServerOptions::default());
    let err = ureq::get(&format!("{}/v3/nothing", server.url))
        .call()
        .unwrap_err();
    assert!(matches!(err, ureq::Error::StatusCode(404)));
}

#[test]
fn secret_reference_points_at_server() {
    let server = TestServer::start(ServerOptions {
        pending_reads: 0,
        ..Default::default()
    });
    let resp = post(&format!("{}/v1/secrets", server.url), r#"{"name": "db"}"#).unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let secret_ref = body_json(resp)["secret_ref"].as_str().unwrap().to_owned();
    assert!(secret_ref.starts_with(&server.url));

    let resp = ureq::get(&secret_ref).call().unwrap();
    let secret = body_json(resp);
    assert_eq!(secret["name"], "db");
    assert_eq!(secret["status"], "ACTIVE");
}

#[test]
fn auth_token_enforced_when_configured() {
    let server = TestServer::start(ServerOptions {
        auth_token: Some("tok".to_owned()),
        ..Default::default()
    });
    let url = format!("{}/v1/secrets", server.url);

    let err = post(&url, r#"{"name": "db"}"#).unwrap_err();
    assert!(matches!(err, ureq::Error::StatusCode(401)));

    let resp = ureq::post(&url)
        .header("X-Auth-Token", "tok")
        .send(r#"{"name": "db"}"#.as_bytes())
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    // health stays open
    ureq::get(&format!("{}/health", server.url)).call().unwrap();
}

#[test]
fn ipsec_policy_create_and_conflicting_delete() {
    let server = TestServer::start(ServerOptions {
        ipsec_delete_conflicts: 1,
        ..Default::default()
    });
    let resp = post(
        &format!("{}/v2.0/vpn/ipsecpolicies", server.url),
        r#"{"ipsecpolicy": {"name": "p", "pfs": "group14"}}"#,
    )
    .unwrap();
    let policy = body_json(resp);
    let id = policy["ipsecpolicy"]["id"].as_str().unwrap().to_owned();
    assert_eq!(policy["ipsecpolicy"]["pfs"], "group14");

    let url = format!("{}/v2.0/vpn/ipsecpolicies/{id}", server.url);
    let err = ureq::delete(&url).call().unwrap_err();
    assert!(matches!(err, ureq::Error::StatusCode(409)));
    let resp = ureq::delete(&url).call().unwrap();
    assert_eq!(resp.status().as_u16(), 204);
    assert!(server.store.get_ipsec_policy(&id).is_none());
}

#[test]
fn invalid_body_is_400() {
    let server = TestServer::start(ServerOptions::default());
    let err = post(&format!("{}/v1/containers", server.url), "not json").unwrap_err();
    assert!(matches!(err, ureq::Error::StatusCode(400)));
}
