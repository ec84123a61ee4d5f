use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use nu_ansi_term::Color;
use pingcheck::{AppConfig, DispatchFault, Dispatcher, ProbeOutcome, Prober};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pingcheck")]
#[command(
    about = "Check whether a host is reachable and how long it takes to answer",
    long_about = None
)]
struct Args {
    /// Host name or IP address to check (defaults to the configured host)
    host: Option<String>,

    /// Path to a JSON config file (overrides PINGCHECK_CONFIG)
    #[arg(long)]
    config: Option<String>,

    /// TCP port to connect to
    #[arg(long)]
    port: Option<u16>,

    /// Timeout for each network step, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print the outcome as JSON and log in JSON
    #[arg(long, short = 'j')]
    json: bool,
}

fn init_tracing(log_level: tracing::Level, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("pingcheck={}", log_level.as_str().to_lowercase()).parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn paint(color: Color, text: String, colored: bool) -> String {
    if colored {
        color.paint(text).to_string()
    } else {
        text
    }
}

fn render(delivered: &Result<ProbeOutcome, DispatchFault>, colored: bool) -> String {
    match delivered {
        Ok(outcome) => match (outcome.elapsed_ms(), outcome.error_message()) {
            (Some(ms), _) => {
                let text = format!("✓ Connection OK, response time: {}ms", ms);
                paint(Color::Green, text, colored)
            }
            (None, reason) => {
                let reason = reason.unwrap_or_else(|| "unknown".to_string());
                let text = format!("✗ Connection failed: {}", reason);
                paint(Color::LightRed, text, colored)
            }
        },
        Err(fault) => {
            let text = format!("✗ Critical error during check: {}", fault);
            paint(Color::Red, text, colored)
        }
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let mut app_config = AppConfig::load(args.config.as_deref()).await?;
    if let Some(port) = args.port {
        app_config.probe.port = port;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        app_config.probe.timeout_ms = timeout_ms;
    }
    app_config.validate()?;

    init_tracing(app_config.get_tracing_level()?, args.json)?;

    let config = Arc::new(app_config.probe);
    let dispatcher = Dispatcher::current(Prober::system())?;

    let colored = std::io::stdout().is_terminal();
    let host_arg = args.host.as_deref().map(str::trim);
    let host = host_arg.unwrap_or(&config.default_host);
    if !args.json {
        let text = format!("Checking connection to {}...", host);
        println!("{}", paint(Color::Yellow, text, colored));
    }

    let delivered = dispatcher
        .probe_async(host_arg, config.clone())
        .await
        .map_err(|_| anyhow::anyhow!("probe task ended without delivering a result"))?;

    if args.json {
        let report = match &delivered {
            Ok(outcome) => serde_json::to_value(outcome.report())?,
            Err(fault) => serde_json::json!({ "success": false, "fault": fault.message }),
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{}", render(&delivered, colored));
    }

    let success = matches!(&delivered, Ok(outcome) if outcome.is_success());
    Ok(if success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
