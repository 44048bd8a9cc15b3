use std::{net::SocketAddr, path::Path};

use clap::{Parser, Subcommand};
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use nado::{
    BuiltinDeps, GracefulShutdown, RouteTable, build_app_with, builtin_registry,
    config::{
        ServerConfig, ServerConfigValidator,
        loader::{STARTER_CONFIG, load_config},
    },
    tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Configuration file (TOML, YAML or JSON by extension)
    #[clap(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Port to listen on, overriding the configured listen address's port
    #[clap(short, long, env = "NADO_PORT", global = true)]
    port: Option<u16>,

    /// Process identity used in logs; defaults to the host name
    #[clap(long, env = "NADO_IDENTITY", global = true)]
    identity: Option<String>,

    /// Debug-level logging
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Development mode: human-readable console logs
    #[clap(long, global = true)]
    develop: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the server (default)
    Serve,
    /// Validate the configuration file and exit
    Validate,
    /// Print the compiled route table in evaluation order
    Routes,
    /// Write a starter configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command.as_ref().unwrap_or(&Commands::Serve) {
        Commands::Init => init_config_command(&args.config).await,
        Commands::Validate => validate_config_command(&args).await,
        Commands::Routes => routes_command(&args).await,
        Commands::Serve => serve(&args).await,
    }
}

fn host_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}

/// Load the config file and apply command line overrides.
async fn load(args: &Args) -> Result<ServerConfig> {
    let mut config = load_config(&args.config)
        .await
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(identity) = &args.identity {
        config.identity = Some(identity.clone());
    }
    if config.identity.is_none() {
        config.identity = Some(host_name());
    }
    if args.develop {
        config.logging.json = false;
    }
    Ok(config)
}

async fn serve(args: &Args) -> Result<()> {
    let config = load(args).await?;

    tracing_setup::init_tracing(&config.logging, args.verbose)
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    let deps = BuiltinDeps::in_memory(&config)?;
    let registry = builtin_registry(deps.clone());

    ServerConfigValidator::validate(&config, &registry)
        .map_err(|e| eyre!("Invalid configuration in {}: {}", args.config, e))?;

    // A route table that cannot be built aborts here, before binding.
    let app = build_app_with(&config, &deps, &registry)?;

    let identity = config.identity.clone().unwrap_or_default();
    let addr: SocketAddr = config
        .effective_listen_addr()
        .parse()
        .context("Failed to parse listen address")?;

    tracing::info!(
        identity = %identity,
        routes = app.table.len(),
        "Route table ready"
    );
    for entry in app.table.entries() {
        tracing::debug!(
            pattern = %entry.pattern,
            handler = %entry.handler_name,
            visibility = %entry.visibility,
            "Configured route"
        );
    }

    let graceful_shutdown = GracefulShutdown::new();
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        signal_handler_shutdown.run_signal_handler().await;
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!(identity = %identity, "Nado listening on {}", addr);

    axum::serve(
        listener,
        app.router
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let reason = graceful_shutdown.wait_for_shutdown().await;
        tracing::info!(?reason, "Draining in-flight requests");
    })
    .await
    .context("Server error")?;

    tracing::info!("Graceful shutdown completed");
    Ok(())
}

/// Validate configuration file and exit
async fn validate_config_command(args: &Args) -> Result<()> {
    let config_path = &args.config;
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load(args).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    let deps = BuiltinDeps::in_memory(&config)?;
    let registry = builtin_registry(deps);

    if let Err(e) = ServerConfigValidator::validate(&config, &registry) {
        eprintln!("❌ Configuration validation failed:");
        eprintln!("{e}");
        println!();
        println!("💡 Common fixes:");
        println!("   • Route patterns must start with '/' and be valid regular expressions");
        println!("   • Public overlay patterns must use named captures, e.g. (?P<id>\\w+)");
        println!("   • Handler names: {}", registry.names().join(", "));
        std::process::exit(1);
    }

    let table = RouteTable::build(&config.routes, &registry)
        .context("Route table construction failed")?;

    println!("✅ Configuration validation: OK");
    println!();
    println!("📋 Configuration Summary:");
    println!("   • Listen Address: {}", config.effective_listen_addr());
    println!("   • Declared Routes: {}", config.routes.len());
    println!("   • Table Entries: {}", table.len());
    println!("   • Login URL: {}", config.auth.login_url);
    Ok(())
}

/// Print the compiled route table in evaluation order
async fn routes_command(args: &Args) -> Result<()> {
    let config = load(args).await?;
    let deps = BuiltinDeps::in_memory(&config)?;
    let table = RouteTable::build(&config.routes, &builtin_registry(deps))
        .context("Route table construction failed")?;

    let unreachable = table.unreachable();
    for (index, entry) in table.entries().iter().enumerate() {
        let mut flags = Vec::new();
        if unreachable.contains(&index) {
            flags.push("unreachable".to_string());
        }
        if !entry.authenticated {
            flags.push("anonymous".to_string());
        }
        if entry.browser {
            flags.push("browser".to_string());
        }
        if entry.session_fallback {
            flags.push("session-fallback".to_string());
        }
        if let Some(source) = &entry.derived_from {
            flags.push(format!("from {source}"));
        }
        println!(
            "{index:>4}  {:<8} {:<48} {:<16} {}",
            entry.visibility.to_string(),
            entry.pattern.as_str(),
            entry.handler_name,
            flags.join(", ")
        );
    }
    Ok(())
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    tokio::fs::write(path, STARTER_CONFIG)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'nado serve --config {config_path}' to start the server");
    Ok(())
}
