use super::{
    colorize_state, describe_error, json_pretty, load_config, make_provisioner, parse_kind,
    require_parent, RemoteArgs, EXIT_SUCCESS,
};
use serde_json::Value;
use settle_core::{resolve_reference, CancelToken};
use settle_remote::{HttpApi, ProvisionError, Provisioner};
use settle_schema::ResourceKind;

pub fn run(
    kind: &str,
    id: &str,
    floating_ip: Option<&str>,
    remote: &RemoteArgs<'_>,
    json: bool,
) -> Result<u8, String> {
    let kind = parse_kind(kind)?;
    let fip = require_parent(kind, floating_ip)?;
    let id = resolve_reference(id);

    let config = load_config(remote)?;
    let provisioner = make_provisioner(&config, &CancelToken::new());
    let resource = fetch(&provisioner, kind, fip, id).map_err(|e| describe_error(&e))?;

    if json {
        println!("{}", json_pretty(&resource)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("{kind} {id}");
    if let Value::Object(fields) = &resource {
        for (key, value) in fields {
            let rendered = match value {
                Value::String(s) if key == "status" => colorize_state(s),
                Value::String(s) => s.clone(),
                Value::Null => continue,
                other => other.to_string(),
            };
            println!("  {key}: {rendered}");
        }
    }
    Ok(EXIT_SUCCESS)
}

fn fetch(
    provisioner: &Provisioner<HttpApi>,
    kind: ResourceKind,
    floating_ip: &str,
    id: &str,
) -> Result<Value, ProvisionError> {
    let value = match kind {
        ResourceKind::Secret => to_value(&provisioner.get_secret(id)?),
        ResourceKind::SecretMetadata => to_value(&provisioner.get_secret_metadata(id)?),
        ResourceKind::Container => to_value(&provisioner.get_container(id)?),
        ResourceKind::IpsecPolicy => to_value(&provisioner.get_ipsec_policy(id)?),
        ResourceKind::PortForwarding => {
            to_value(&provisioner.get_port_forwarding(floating_ip, id)?)
        }
    };
    Ok(value)
}

fn to_value(resource: &impl serde::Serialize) -> Value {
    serde_json::to_value(resource).unwrap_or(Value::Null)
}
