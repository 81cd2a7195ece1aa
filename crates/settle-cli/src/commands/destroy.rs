use super::{
    describe_error, json_pretty, load_config, make_provisioner, parse_kind, require_parent,
    settled_json, spin_fail, spin_ok, spinner, RemoteArgs, EXIT_SUCCESS,
};
use settle_core::{resolve_reference, CancelToken, Settled};
use settle_remote::{HttpApi, ProvisionError, Provisioner};
use settle_schema::ResourceKind;

pub fn run(
    kind: &str,
    id: &str,
    floating_ip: Option<&str>,
    remote: &RemoteArgs<'_>,
    cancel: &CancelToken,
    json: bool,
) -> Result<u8, String> {
    let kind = parse_kind(kind)?;
    if kind == ResourceKind::SecretMetadata {
        return Err("secret metadata is deleted with its secret".to_owned());
    }
    let fip = require_parent(kind, floating_ip)?;
    let id = resolve_reference(id);

    let config = load_config(remote)?;
    let provisioner = make_provisioner(&config, cancel);

    let pb = spinner(&format!("deleting {kind} {id}, waiting for it to disappear…"));
    let settled = delete(&provisioner, kind, fip, id).map_err(|e| {
        spin_fail(&pb, &format!("{kind} {id} was not confirmed deleted"));
        describe_error(&e)
    })?;
    spin_ok(&pb, &format!("{kind} {id} deleted"));

    if json {
        let payload = match &settled {
            Some(s) => settled_json(kind, id, s),
            None => serde_json::json!({ "kind": kind, "id": id, "state": "DELETED", "polls": 0 }),
        };
        println!("{}", json_pretty(&payload)?);
    } else {
        match settled {
            Some(s) => println!("deleted {kind} {id} after {} poll(s)", s.polls),
            None => println!("{kind} {id} was already gone"),
        }
    }
    Ok(EXIT_SUCCESS)
}

/// `None` when the remote reported the resource absent before any wait.
fn delete(
    provisioner: &Provisioner<HttpApi>,
    kind: ResourceKind,
    floating_ip: &str,
    id: &str,
) -> Result<Option<Settled<()>>, ProvisionError> {
    match kind {
        ResourceKind::Secret => provisioner.delete_secret(id).map(Some),
        ResourceKind::Container => provisioner.delete_container(id).map(Some),
        ResourceKind::IpsecPolicy => provisioner.delete_ipsec_policy(id).map(Some),
        ResourceKind::PortForwarding => provisioner.delete_port_forwarding(floating_ip, id),
        ResourceKind::SecretMetadata => Ok(None),
    }
}
