mod calendar_commands;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    calmcp_caldav::{CalendarService, register_calendar_tools},
    calmcp_config::{CalMcpConfig, Severity},
    calmcp_mcp::{McpServer, ServerInfo},
    calmcp_tools::ToolRegistry,
    clap::{Parser, Subcommand},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "calmcp", about = "calmcp: personal calendar tools over MCP", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and ~/.config/calmcp/).
    #[arg(long, global = true, env = "CALMCP_CONFIG")]
    config: Option<PathBuf>,
    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Serve MCP over HTTP (default when no subcommand is provided).
    Serve,
    /// Serve MCP over stdin/stdout.
    Stdio,
    /// Print the calendars visible to the configured account.
    Calendars,
    /// Create, find and delete a throwaway event on the configured server.
    SelfTest,
}

/// Logs always go to stderr so stdout stays free for MCP stdio and command
/// output.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Config from `--config` or discovery, with env and CLI overrides applied.
fn load_settings(cli: &Cli) -> anyhow::Result<CalMcpConfig> {
    let mut config = match cli.config {
        Some(ref path) => {
            let mut config = calmcp_config::load_config(path)?;
            calmcp_config::apply_env_overrides(&mut config);
            config
        },
        None => calmcp_config::discover_and_load(),
    };

    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

/// Log every diagnostic and refuse to continue on errors.
fn check_config(config: &CalMcpConfig) -> anyhow::Result<()> {
    let report = calmcp_config::validate(config);
    for diagnostic in &report.diagnostics {
        match diagnostic.severity {
            Severity::Error => error!(path = %diagnostic.path, "{}", diagnostic.message),
            Severity::Warning => warn!(path = %diagnostic.path, "{}", diagnostic.message),
        }
    }
    if report.has_errors() {
        anyhow::bail!(
            "invalid configuration: {} error(s), see log above",
            report.count(Severity::Error)
        );
    }
    Ok(())
}

fn build_server(config: &CalMcpConfig, service: Arc<CalendarService>) -> Arc<McpServer> {
    let mut tools = ToolRegistry::new();
    register_calendar_tools(&mut tools, service);
    info!(tools = ?tools.tool_names(), "registered tools");

    Arc::new(McpServer::new(
        ServerInfo {
            name: config.mcp.name.clone(),
            version: env!("CARGO_PKG_VERSION").into(),
            title: config.mcp.title.clone(),
        },
        tools,
    ))
}

async fn resolve_addr(bind: &str, port: u16) -> anyhow::Result<SocketAddr> {
    tokio::net::lookup_host((bind, port))
        .await
        .with_context(|| format!("failed to resolve bind address '{bind}'"))?
        .next()
        .with_context(|| format!("no address found for '{bind}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "calmcp starting");

    let config = load_settings(&cli)?;
    check_config(&config)?;
    let service = Arc::new(CalendarService::from_config(&config.caldav));

    match cli.command {
        // Default: serve over HTTP when no subcommand is provided
        None | Some(Commands::Serve) => {
            let addr = resolve_addr(&config.server.bind, config.server.port).await?;
            let server = build_server(&config, service);
            calmcp_mcp::http::serve(server, addr).await?;
            Ok(())
        },
        Some(Commands::Stdio) => {
            let server = build_server(&config, service);
            calmcp_mcp::stdio::serve_stdio(server).await?;
            Ok(())
        },
        Some(Commands::Calendars) => calendar_commands::print_calendars(&service).await,
        Some(Commands::SelfTest) => calendar_commands::self_test(&service).await,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory, std::io::Write};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommand_is_optional() {
        let cli = Cli::try_parse_from(["calmcp"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["calmcp", "self-test", "--port", "9000"]).unwrap();
        assert_eq!(cli.command, Some(Commands::SelfTest));
        assert_eq!(cli.port, Some(9000));
    }

    #[test]
    fn cli_flags_override_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nbind = \"0.0.0.0\"\nport = 8100\n\n[caldav]\nusername = \"me@example.com\"\npassword = \"app-pass\"\n"
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let cli = Cli::try_parse_from(["calmcp", "--config", path, "--port", "9001"]).unwrap();
        let config = load_settings(&cli).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.caldav.username.as_deref(), Some("me@example.com"));
    }

    #[test]
    fn missing_credentials_fail_the_check() {
        let err = check_config(&CalMcpConfig::default()).unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn server_exposes_calendar_tools() {
        let config = CalMcpConfig::default();
        let service = Arc::new(CalendarService::from_config(&config.caldav));
        let server = build_server(&config, service);
        assert_eq!(server.tool_count(), 5);
        assert_eq!(server.info().name, config.mcp.name);
    }
}
