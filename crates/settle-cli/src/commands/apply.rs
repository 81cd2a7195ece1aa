use super::{
    colorize_state, describe_error, json_pretty, load_config, make_provisioner, spin_fail, spin_ok,
    spinner, RemoteArgs, EXIT_SUCCESS,
};
use serde_json::{json, Value};
use settle_core::CancelToken;
use settle_remote::{HttpApi, ProvisionError, Provisioner};
use settle_schema::{parse_manifest_file, ResourceKind, ResourceManifest, ResourceSpec};
use std::path::Path;

/// What `apply` created, ready for printing.
struct Applied {
    kind: ResourceKind,
    id: String,
    status: Option<String>,
    resource: Value,
}

pub fn run(
    manifest_path: &Path,
    remote: &RemoteArgs<'_>,
    cancel: &CancelToken,
    json: bool,
) -> Result<u8, String> {
    let manifest = load_manifest(manifest_path)?;
    let kind = manifest.resource.kind();

    let mut config = load_config(remote)?;
    let overridden = config.timeouts.for_kind(kind).overridden_by(&manifest.timeouts);
    *config.timeouts.for_kind_mut(kind) = overridden;
    let provisioner = make_provisioner(&config, cancel);

    let pb = spinner(&format!("creating {kind}, waiting for it to settle…"));
    let applied = create(&provisioner, &manifest.resource).map_err(|e| {
        spin_fail(&pb, &format!("{kind} did not settle"));
        describe_error(&e)
    })?;
    spin_ok(&pb, &format!("{kind} created"));

    if json {
        let payload = json!({
            "kind": applied.kind,
            "id": applied.id,
            "resource": applied.resource,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        match applied.status.as_deref() {
            Some(status) => {
                println!("{} {} {}", applied.kind, applied.id, colorize_state(status));
            }
            None => println!("{} {}", applied.kind, applied.id),
        }
    }
    Ok(EXIT_SUCCESS)
}

fn load_manifest(path: &Path) -> Result<ResourceManifest, String> {
    let manifest = parse_manifest_file(path).map_err(|e| format!("manifest error: {e}"))?;
    manifest
        .validate()
        .map_err(|e| format!("manifest error: {e}"))?;
    Ok(manifest)
}

fn create(
    provisioner: &Provisioner<HttpApi>,
    spec: &ResourceSpec,
) -> Result<Applied, ProvisionError> {
    let kind = spec.kind();
    let applied = match spec {
        ResourceSpec::Secret(s) => {
            let created = provisioner.create_secret(&s.to_request(), &s.metadata)?;
            Applied {
                kind,
                status: Some(created.secret.status.clone()),
                resource: json!({
                    "secret": to_value(&created.secret),
                    "metadata": created.metadata,
                }),
                id: created.id,
            }
        }
        ResourceSpec::Container(c) => {
            let created = provisioner.create_container(&c.to_request())?;
            Applied {
                kind,
                status: Some(created.resource.status.clone()),
                resource: to_value(&created.resource),
                id: created.id,
            }
        }
        ResourceSpec::IpsecPolicy(p) => {
            let request = p.to_request(provisioner.mapping_compat());
            let created = provisioner.create_ipsec_policy(&request)?;
            Applied {
                kind,
                status: None,
                resource: to_value(&created.resource),
                id: created.id,
            }
        }
        ResourceSpec::PortForwarding(pf) => {
            let created =
                provisioner.create_port_forwarding(&pf.floating_ip_id, &pf.to_request())?;
            Applied {
                kind,
                status: created.resource.status.clone(),
                resource: to_value(&created.resource),
                id: created.id,
            }
        }
    };
    Ok(applied)
}

fn to_value(resource: &impl serde::Serialize) -> Value {
    serde_json::to_value(resource).unwrap_or(Value::Null)
}
