use clap::Parser;
use ipinformer::config::{parse_key_entry, Settings};
use ipinformer::geo::{Aggregator, FailurePolicy, Field, Registry, Report, RunOutcome};
use ipinformer::server;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// ipinformer: multi-provider IP geolocation.
///
/// Queries every configured provider for one IP address or hostname and
/// resolves each field from the highest-priority provider that supplied it.
///
/// Examples:
///   ipinformer 8.8.8.8
///   ipinformer 2001:4860:4860::8888 --lang german
///   ipinformer --field city --exclude ip-api.com 1.1.1.1
///   ipinformer --key ipwhois.app=SECRET --abort-on-transport-error
///   ipinformer --serve --port 8080
#[derive(Parser)]
#[command(name = "ipinformer", version, about, long_about = None)]
struct Cli {
    /// IP address or hostname. Omit to look up your own address.
    #[arg(index = 1)]
    target: Option<String>,

    /// Response language: name (german), code (pt-BR) or id (0-7).
    #[arg(long)]
    lang: Option<String>,

    /// Query only the first N providers. 0 means all.
    #[arg(long)]
    providers: Option<usize>,

    /// Never query this provider (name or id). Repeatable.
    #[arg(long)]
    exclude: Vec<String>,

    /// API key as PROVIDER=KEY. Repeatable.
    #[arg(long = "key", env = "IPINFORMER_KEYS", value_delimiter = ',', hide_env_values = true)]
    keys: Vec<String>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Stop at the first transport failure instead of trying the remaining providers.
    #[arg(long)]
    abort_on_transport_error: bool,

    /// Print a single field with its source provider.
    #[arg(long)]
    field: Option<String>,

    /// List the registered providers and exit.
    #[arg(long)]
    list_providers: bool,

    /// Settings file (default: ~/.ipinformer/config.json or $IPINFORMER_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run the HTTP API instead of a single lookup.
    #[arg(long)]
    serve: bool,

    /// Address for --serve.
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port for --serve.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Debug logging.
    #[arg(long, short = 'v')]
    verbose: bool,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,ipinformer=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> CliResult<ExitCode> {
    if cli.list_providers {
        print_providers(&Registry::builtin());
        return Ok(ExitCode::SUCCESS);
    }

    let settings = load_settings(&cli)?;

    if cli.serve {
        server::start(&cli.bind, cli.port, settings).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let field: Option<Field> = cli.field.as_deref().map(|f| f.parse::<Field>()).transpose()?;

    let mut agg = Aggregator::builtin(settings.timeout());
    settings.apply_to(&mut agg)?;
    agg.set_host(cli.target.as_deref().unwrap_or(""));

    let summary = agg
        .run_until(async {
            // A failed handler install only means Ctrl+C cannot cancel.
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await;

    if let RunOutcome::Aborted { provider } = &summary.outcome {
        eprintln!("  Run stopped after a transport failure at {}", provider);
    }

    match field {
        Some(field) => {
            let resolved = agg.resolve_value(field);
            match (&resolved.value, &resolved.source) {
                (Some(value), Some(source)) => eprintln!("  {}: {} [{}]", field, value, source),
                _ => eprintln!("  {}: unresolved ({})", field, resolved.description),
            }
            println!("{}", serde_json::to_string_pretty(&resolved)?);
            Ok(if resolved.resolved { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        None => {
            let report = agg.report();
            eprint!("{}", render_report(&report));
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.resolved().next().is_some() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

/// Settings file first, then command-line overrides.
fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    if let Some(lang) = &cli.lang {
        settings.language = Some(lang.clone());
    }
    if let Some(cap) = cli.providers {
        settings.provider_cap = cap;
    }
    if let Some(secs) = cli.timeout {
        settings.timeout_secs = Some(secs);
    }
    if cli.abort_on_transport_error {
        settings.on_transport_error = FailurePolicy::AbortRun;
    }
    settings.exclude.extend(cli.exclude.iter().cloned());
    for entry in cli.keys.iter().filter(|e| !e.trim().is_empty()) {
        let (provider, key) = parse_key_entry(entry)?;
        settings.api_keys.insert(provider, key);
    }
    Ok(settings)
}

// ─── Output ─────────────────────────────────────────────────────

fn render_report(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n  Target: {}\n\n", report.target));

    for (field, resolved) in report.resolved() {
        let value = resolved.value.as_ref().map(|v| v.to_string()).unwrap_or_default();
        let source = resolved.source.as_deref().unwrap_or("-");
        out.push_str(&format!("  {:<20} {:<36} {}\n", field.name(), value, source));
    }

    out.push('\n');
    for status in &report.providers {
        let state = if status.excluded {
            "excluded".to_string()
        } else if !status.attempted {
            "not queried".to_string()
        } else if status.error.is_error() {
            status.error.to_string()
        } else {
            format!("ok, {} fields", status.parsed_fields)
        };
        out.push_str(&format!("  [{}] {:<14} {}\n", status.id, status.name, state));
    }
    out.push('\n');
    out
}

fn print_providers(registry: &Registry) {
    for provider in registry.providers() {
        let languages: Vec<&str> = provider.languages.iter().map(|(_, code)| *code).collect();
        let fields: Vec<&str> = Field::ALL
            .iter()
            .filter(|f| provider.supports(**f))
            .map(|f| f.name())
            .collect();
        println!("[{}] {}  {}", provider.id, provider.name, provider.base_url);
        println!("    languages: {}", languages.join(", "));
        println!("    fields:    {}", fields.join(", "));
    }
}
