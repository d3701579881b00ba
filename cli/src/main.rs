// onionmesh — onion routing overlay CLI
//
// Runs the node registry, onion routers and users as HTTP services, either
// one per process or all together, and drives them from the command line.

mod api;
mod config;
mod server;

use anyhow::{Context, Result};
use api::HttpTransport;
use clap::{Parser, Subcommand};
use colored::*;
use futures::FutureExt;
use onionmesh_core::relay::protocol::{ROUTE_LAST_CIRCUIT, ROUTE_LAST_RECEIVED, STATUS_LIVE};
use onionmesh_core::{Directory, LocalNetwork, NodeRegistry, OnionRouter, User};
use server::ServerFuture;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "onionmesh")]
#[command(about = "onionmesh — layered encryption over a registry of relays", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node registry
    Registry,
    /// Run one onion router
    Router {
        #[arg(long)]
        id: u32,
    },
    /// Run one user endpoint
    User {
        #[arg(long)]
        id: u32,
    },
    /// Run the registry, routers and users in one process
    Launch {
        #[arg(long, default_value = "5")]
        routers: u32,
        #[arg(long, default_value = "2")]
        users: u32,
    },
    /// Ask a running user to send a message through a fresh circuit
    Send {
        #[arg(long)]
        from: u32,
        #[arg(long)]
        to: u32,
        message: String,
    },
    /// Show registry and relay status
    Status,
    /// Trace one message through an in-process network
    Simulate {
        #[arg(long, default_value = "5")]
        routers: u32,
        message: String,
    },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    match cli.command {
        Commands::Registry => cmd_registry(config).await,
        Commands::Router { id } => cmd_router(config, id).await,
        Commands::User { id } => cmd_user(config, id).await,
        Commands::Launch { routers, users } => cmd_launch(config, routers, users).await,
        Commands::Send { from, to, message } => cmd_send(config, from, to, message).await,
        Commands::Status => cmd_status(config).await,
        Commands::Simulate { routers, message } => cmd_simulate(config, routers, message).await,
        Commands::Config { action } => cmd_config(config, action).await,
    }
}

fn http_transport(config: &config::Config) -> Arc<HttpTransport> {
    Arc::new(HttpTransport::new(&config.host, &config.layout()))
}

/// Serve until any server fails or Ctrl+C
async fn serve_until_shutdown(servers: Vec<ServerFuture>) -> Result<()> {
    println!();
    println!("Press {} to stop", "Ctrl+C".bright_yellow());

    tokio::select! {
        result = futures::future::try_join_all(servers) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("{}", "Shutting down...".dimmed());
        }
    }
    Ok(())
}

async fn cmd_registry(config: config::Config) -> Result<()> {
    let (_registry, server) = server::start_registry(&config)?;

    println!("{}", "Node registry".bold());
    println!("  Listening: {}", server::socket_addr(&config.host, config.layout().registry())?.to_string().bright_cyan());

    serve_until_shutdown(vec![server]).await
}

async fn cmd_router(config: config::Config, id: u32) -> Result<()> {
    println!("{}", format!("Onion router {}", id).bold());
    println!("  {} Generating RSA-2048 key pair...", "•".dimmed());

    let transport = http_transport(&config);
    let (router, server) = server::start_router(id, &config, transport.clone()).await?;

    println!("  {} Address: {}", "✓".green(), router.address().to_string().bright_cyan());
    println!("  {} Registry: {}", "✓".green(), transport.registry_address().to_string().bright_cyan());

    serve_until_shutdown(vec![server]).await
}

async fn cmd_user(config: config::Config, id: u32) -> Result<()> {
    let (user, server) = server::start_user(id, &config, http_transport(&config))?;

    println!("{}", format!("User {}", id).bold());
    println!("  {} Address: {}", "✓".green(), user.address().to_string().bright_cyan());

    serve_until_shutdown(vec![server]).await
}

async fn cmd_launch(config: config::Config, routers: u32, users: u32) -> Result<()> {
    println!("{}", "Launching onion network...".bold());
    println!();

    let transport = http_transport(&config);
    let layout = config.layout();

    // The registry must be serving before routers register
    let (_registry, registry_server) = server::start_registry(&config)?;
    let registry_task = tokio::spawn(registry_server);
    println!("  {} Registry   {}", "✓".green(), layout.registry().to_string().bright_cyan());

    let mut servers = Vec::new();
    for id in 0..routers {
        let (router, server) = server::start_router(id, &config, transport.clone()).await?;
        println!("  {} Router {:<3} {}", "✓".green(), id, router.address().to_string().bright_cyan());
        servers.push(server);
    }

    for id in 0..users {
        let (user, server) = server::start_user(id, &config, transport.clone())?;
        println!("  {} User {:<5} {}", "✓".green(), id, user.address().to_string().bright_cyan());
        servers.push(server);
    }

    servers.push(async move { registry_task.await.context("Registry task failed")? }.boxed());

    if users >= 2 {
        println!();
        println!("Try: {}", "onionmesh send --from 0 --to 1 \"hello\"".bright_green());
    }

    serve_until_shutdown(servers).await
}

async fn cmd_send(config: config::Config, from: u32, to: u32, message: String) -> Result<()> {
    let layout = config.layout();
    let transport = http_transport(&config);
    let sender = layout.user(from)?;

    transport
        .send_message(sender, &message, to)
        .await
        .with_context(|| format!("User {} could not send", from))?;

    println!("{} Sent from user {} to user {}", "✓".green(), from, to);

    let circuit: Vec<u32> = transport.result(sender, ROUTE_LAST_CIRCUIT).await?;
    let path: Vec<String> = circuit.iter().map(|id| format!("router {}", id)).collect();
    println!("  Circuit: {}", path.join(" → ").bright_cyan());

    // The recipient may live in another process that is not running
    match transport.result::<Option<String>>(layout.user(to)?, ROUTE_LAST_RECEIVED).await {
        Ok(Some(received)) => println!("  Recipient last received: {}", received.bright_white()),
        Ok(None) => println!("  {}", "Recipient has not received anything yet".yellow()),
        Err(e) => println!("  {} {}", "Recipient unreachable:".yellow(), e),
    }

    Ok(())
}

async fn cmd_status(config: config::Config) -> Result<()> {
    let layout = config.layout();
    let transport = http_transport(&config);
    let registry = transport.registry_address();

    println!("{}", "Network Status".bold());
    println!();

    match transport.status(registry).await {
        Ok(status) if status == STATUS_LIVE => {
            println!("  Registry {}  {}", registry.to_string().bright_cyan(), "live".green())
        }
        Ok(other) => println!("  Registry {}  {}", registry.to_string().bright_cyan(), other.yellow()),
        Err(_) => {
            println!("  Registry {}  {}", registry.to_string().bright_cyan(), "offline".red());
            return Ok(());
        }
    }

    let nodes = Directory::list_nodes(transport.as_ref()).await?;
    if nodes.is_empty() {
        println!("  {}", "No routers registered".dimmed());
        return Ok(());
    }

    println!();
    println!("{}", "Registered routers:".bold());
    for node in nodes {
        let address = layout.router(node.node_id)?;
        let state = match transport.status(address).await {
            Ok(_) => "live".green(),
            Err(_) => "unreachable".red(),
        };
        println!("  {:<4} {}  {}", node.node_id, address.to_string().bright_cyan(), state);
    }

    Ok(())
}

async fn cmd_simulate(config: config::Config, routers: u32, message: String) -> Result<()> {
    let layout = config.layout();
    let registry = NodeRegistry::new();
    let network = LocalNetwork::new();

    println!("{}", "Simulating onion routing (in-process)".bold());
    println!();

    let mut relays = Vec::new();
    for id in 0..routers {
        let router = tokio::task::spawn_blocking(move || OnionRouter::new(id, &layout))
            .await
            .context("Key generation task failed")??;
        let router = Arc::new(router);
        router.register(&registry).await?;
        network.attach_router(router.clone());
        relays.push(router);
    }
    println!("  {} {} routers registered", "✓".green(), registry.len());

    let alice = Arc::new(User::new(0, layout)?.with_circuit_length(config.circuit_length));
    let bob = Arc::new(User::new(1, layout)?);
    network.attach_user(alice.clone());
    network.attach_user(bob.clone());

    let circuit = alice.send_to_user(&message, bob.user_id(), &registry, &network).await?;

    if circuit.is_degraded(config.circuit_length) {
        println!(
            "  {} Only {} of {} hops available",
            "!".yellow(),
            circuit.len(),
            config.circuit_length
        );
    }
    println!();

    println!("{}", "Circuit:".bold());
    for (hop, node_id) in circuit.node_ids().into_iter().enumerate() {
        let Some(router) = relays.iter().find(|r| r.node_id() == node_id) else {
            continue;
        };
        let received = router.last_received_encrypted_message().map_or(0, |m| m.len());
        let next = router
            .last_message_destination()
            .map_or_else(|| "-".to_string(), |a| a.to_string());
        println!(
            "  {}. router {:<3} received {:>6} chars → forwarded to {}",
            hop + 1,
            node_id,
            received,
            next.bright_cyan()
        );
    }
    println!();

    match bob.last_received_message() {
        Some(received) if received == message => {
            println!("{} User {} received: {}", "✓".green(), bob.user_id(), received.bright_white())
        }
        Some(received) => println!("{} User {} received garbled: {}", "✗".red(), bob.user_id(), received),
        None => println!("{} Message was lost in the circuit", "✗".red()),
    }

    Ok(())
}

async fn cmd_config(mut config: config::Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value.bright_yellow());
        }
        ConfigAction::Get { key } => match config.get(&key) {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("Unknown config key: {}", key),
        },
        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            for (key, value) in config.list() {
                println!("  {:<18} {}", key.bright_cyan(), value);
            }
        }
        ConfigAction::Path => {
            println!("{}", config.path()?.display());
        }
    }

    Ok(())
}
