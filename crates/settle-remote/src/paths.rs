//! Request paths, relative to the configured endpoint.

pub const SECRETS: &str = "/v1/secrets";
pub const CONTAINERS: &str = "/v1/containers";
pub const IPSEC_POLICIES: &str = "/v2.0/vpn/ipsecpolicies";

pub fn secret(id: &str) -> String {
    format!("{SECRETS}/{id}")
}

pub fn secret_metadata(id: &str) -> String {
    format!("{SECRETS}/{id}/metadata")
}

pub fn container(id: &str) -> String {
    format!("{CONTAINERS}/{id}")
}

pub fn ipsec_policy(id: &str) -> String {
    format!("{IPSEC_POLICIES}/{id}")
}

pub fn port_forwardings(floating_ip_id: &str) -> String {
    format!("/v2.0/floatingips/{floating_ip_id}/port_forwardings")
}

pub fn port_forwarding(floating_ip_id: &str, id: &str) -> String {
    format!("{}/{id}", port_forwardings(floating_ip_id))
}
