mod commands;

use clap::{Parser, Subcommand};
use commands::{EXIT_CANCELLED, EXIT_FAILURE, EXIT_MANIFEST_ERROR, EXIT_TIMEOUT};
use settle_core::CancelToken;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "settle",
    version,
    about = "Provision remote resources and wait until they settle"
)]
struct Cli {
    /// Base URL of the remote API. Overrides the saved remote config.
    #[arg(long, global = true)]
    remote: Option<String>,

    /// Auth token sent as X-Auth-Token. Overrides the saved remote config.
    #[arg(long, global = true)]
    token: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the resource a manifest describes and wait until it is ACTIVE.
    Apply {
        /// Path to manifest TOML file.
        #[arg(default_value = "settle.toml")]
        manifest: PathBuf,
    },
    /// Delete a resource and wait until the remote confirms it is gone.
    Destroy {
        /// secret, container, ipsec-policy or port-forwarding.
        kind: String,
        /// Resource id or reference URL.
        id: String,
        /// Floating IP owning a port forwarding.
        #[arg(long)]
        floating_ip: Option<String>,
    },
    /// Read a resource once, without waiting.
    Show {
        /// secret, secret-metadata, container, ipsec-policy or port-forwarding.
        kind: String,
        /// Resource id or reference URL.
        id: String,
        /// Floating IP owning a port forwarding.
        #[arg(long)]
        floating_ip: Option<String>,
    },
    /// Print the canonical id of a resource reference.
    Resolve { reference: String },
    /// List vocabularies, or map an input through one.
    Vocab {
        /// Vocabulary name, e.g. auth_algorithm. Omit to list all.
        kind: Option<String>,
        /// Input to map. Omit to list the accepted values.
        input: Option<String>,
        /// Use the historical auth-algorithm mapping.
        #[arg(long, default_value_t = false)]
        legacy: bool,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SETTLE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    let cancel = CancelToken::new();
    install_signal_handler(&cancel);

    let remote = commands::RemoteArgs {
        url: cli.remote.as_deref(),
        token: cli.token.as_deref(),
    };
    let json_output = cli.json;

    let result = match cli.command {
        Commands::Apply { manifest } => {
            commands::apply::run(&manifest, &remote, &cancel, json_output)
        }
        Commands::Destroy {
            kind,
            id,
            floating_ip,
        } => commands::destroy::run(
            &kind,
            &id,
            floating_ip.as_deref(),
            &remote,
            &cancel,
            json_output,
        ),
        Commands::Show {
            kind,
            id,
            floating_ip,
        } => commands::show::run(&kind, &id, floating_ip.as_deref(), &remote, json_output),
        Commands::Resolve { reference } => commands::resolve::run(&reference, json_output),
        Commands::Vocab {
            kind,
            input,
            legacy,
        } => commands::vocab::run(kind.as_deref(), input.as_deref(), legacy, json_output),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("manifest error:")
                || msg.starts_with("failed to parse manifest")
                || msg.starts_with("failed to read manifest")
            {
                EXIT_MANIFEST_ERROR
            } else if msg.starts_with("timed out:") {
                EXIT_TIMEOUT
            } else if msg.starts_with("cancelled:") {
                EXIT_CANCELLED
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

/// First Ctrl-C cancels the running wait at its next suspension point; a
/// second one exits immediately.
fn install_signal_handler(cancel: &CancelToken) {
    let cancel = cancel.clone();
    let _ = ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            std::process::exit(i32::from(EXIT_CANCELLED));
        }
        cancel.cancel();
        eprintln!("\ncancel requested, stopping at the next poll...");
    });
}
