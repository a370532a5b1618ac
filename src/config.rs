use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "livebubbles",
    author,
    version,
    about = "Signaling server for shared live-bubble transcripts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the signaling server (the default).
    Serve,
    /// Join a session as a debug client and log every signaling event.
    Join {
        /// Signaling socket URL.
        #[arg(long, env = "LIVEBUBBLES_URL", default_value = "ws://127.0.0.1:9000/ws")]
        url: String,
        #[arg(long)]
        session: String,
        #[arg(long)]
        username: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    /// Address to bind the HTTP and websocket listener to.
    #[arg(long, env = "LIVEBUBBLES_LISTEN_ADDR", default_value = "0.0.0.0:9000")]
    pub listen_addr: String,

    /// How long a session may stay empty before it is removed.
    #[arg(long, env = "LIVEBUBBLES_EMPTY_SESSION_TTL_SECS", default_value_t = 3600)]
    pub empty_session_ttl_secs: u64,

    /// How often idle sessions are looked for.
    #[arg(long, env = "LIVEBUBBLES_REAP_INTERVAL_SECS", default_value_t = 60)]
    pub reap_interval_secs: u64,

    /// Grace period applied during shutdown.
    #[arg(long, env = "LIVEBUBBLES_SHUTDOWN_GRACE_SECS", default_value_t = 1)]
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub empty_session_ttl: Duration,
    pub reap_interval: Duration,
    pub shutdown_grace: Duration,
}

impl TryFrom<ServerArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: ServerArgs) -> Result<Self, Self::Error> {
        let listen_addr: SocketAddr = args
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address: {}", args.listen_addr))?;
        anyhow::ensure!(
            args.reap_interval_secs > 0,
            "reap interval must be at least one second"
        );
        Ok(ServerConfig {
            listen_addr,
            empty_session_ttl: Duration::from_secs(args.empty_session_ttl_secs),
            reap_interval: Duration::from_secs(args.reap_interval_secs),
            shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
        })
    }
}
