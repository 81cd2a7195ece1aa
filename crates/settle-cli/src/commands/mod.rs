pub mod apply;
pub mod destroy;
pub mod resolve;
pub mod show;
pub mod vocab;

use indicatif::{ProgressBar, ProgressStyle};
use settle_core::{CancelToken, Settled};
use settle_remote::{HttpApi, ProvisionError, Provisioner, RemoteConfig};
use settle_schema::ResourceKind;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
/// The resource may or may not have reached its target state.
pub const EXIT_TIMEOUT: u8 = 3;
pub const EXIT_CANCELLED: u8 = 4;

/// Remote overrides given on the command line.
#[derive(Debug, Default)]
pub struct RemoteArgs<'a> {
    pub url: Option<&'a str>,
    pub token: Option<&'a str>,
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_state(state: &str) -> String {
    use console::Style;
    match state {
        "ACTIVE" => Style::new().green().apply_to(state).to_string(),
        "PENDING" => Style::new().yellow().apply_to(state).to_string(),
        "DELETED" => Style::new().dim().apply_to(state).to_string(),
        "DOWN" => Style::new().blue().apply_to(state).to_string(),
        "ERROR" => Style::new().red().bold().apply_to(state).to_string(),
        other => other.to_owned(),
    }
}

/// Resource kinds that can be addressed on the command line.
pub fn parse_kind(name: &str) -> Result<ResourceKind, String> {
    ResourceKind::from_name(name).ok_or_else(|| {
        format!(
            "unknown resource kind '{name}', expected one of: \
             secret, secret-metadata, container, ipsec-policy, port-forwarding"
        )
    })
}

/// The floating IP a port forwarding lives under, required for that kind only.
pub fn require_parent<'a>(
    kind: ResourceKind,
    floating_ip: Option<&'a str>,
) -> Result<&'a str, String> {
    match floating_ip {
        Some(fip) if !fip.is_empty() => Ok(fip),
        _ if kind.needs_parent() => Err(format!("{kind} needs --floating-ip")),
        _ => Ok(""),
    }
}

/// Saved remote config with command-line overrides applied.
pub fn load_config(remote: &RemoteArgs<'_>) -> Result<RemoteConfig, String> {
    let saved = RemoteConfig::load_default();
    let mut config = match (remote.url, saved) {
        (Some(url), Ok(saved)) => RemoteConfig {
            url: RemoteConfig::new(url).url,
            ..saved
        },
        (Some(url), Err(_)) => RemoteConfig::new(url),
        (None, Ok(saved)) => saved,
        (None, Err(e)) => return Err(format!("no --remote and no config: {e}")),
    };
    if let Some(token) = remote.token {
        config = config.with_token(token);
    }
    Ok(config)
}

pub fn make_provisioner(config: &RemoteConfig, cancel: &CancelToken) -> Provisioner<HttpApi> {
    Provisioner::new(HttpApi::new(config.clone()), config).with_cancel(cancel.clone())
}

/// Render a lifecycle failure with the prefix `main` maps to an exit code.
pub fn describe_error(err: &ProvisionError) -> String {
    if err.is_timeout() {
        format!("timed out: {err}")
    } else if err.is_cancelled() {
        format!("cancelled: {err}")
    } else {
        err.to_string()
    }
}

pub fn settled_json<T>(kind: ResourceKind, id: &str, settled: &Settled<T>) -> serde_json::Value {
    serde_json::json!({
        "kind": kind,
        "id": id,
        "state": settled.state.as_str(),
        "polls": settled.polls,
        "elapsed_secs": settled.elapsed.as_secs_f64(),
    })
}
