//! Command line entry point: flag parsing, logging setup, endpoint
//! construction and the shutdown signal loop.

use std::path::PathBuf;
use std::time::Duration;
use std::{error, fmt, fs};

use clap::Parser;

use crate::client::Client;
use crate::config::Config;
use crate::server::Server;

#[derive(Parser, Debug)]
#[command(
    name = "shadowtunnel",
    version,
    about = "Forwards TCP traffic through an encrypted, multiplexed tunnel"
)]
pub struct Args {
    /// path to config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// server mode
    #[arg(long)]
    pub server: bool,

    /// pre-shared password used to establish encryption
    #[arg(long, default_value = "")]
    pub password: String,

    /// listen on local endpoint
    #[arg(long, default_value = "")]
    pub listen: String,

    /// connect to remote endpoint
    #[arg(long, default_value = "")]
    pub connect: String,

    /// connect timeout
    #[arg(long, default_value = "2s")]
    pub timeout: String,

    /// compress tunnel traffic
    #[arg(long)]
    pub compress: bool,

    /// log level
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// log line format, full or compact
    #[arg(long, default_value = "full")]
    pub log_format: String,
}

#[derive(Debug)]
pub enum Error {
    InvalidArgument,
    Config(String),
    Endpoint(std::io::Error),
    Signal(ctrlc::Error),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Endpoint(e) => Some(e),
            Error::Signal(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidArgument => write!(f, "invalid argument"),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::Endpoint(e) => write!(f, "endpoint error: {}", e),
            Error::Signal(e) => write!(f, "signal handler error: {}", e),
        }
    }
}

fn configure_logging(level: &str, format: &str) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(level);
    if format == "compact" {
        builder.format_timestamp(None);
        builder.format_target(false);
    } else {
        builder.format_timestamp_millis();
    }
    let _ = builder.try_init();
}

fn load_config(args: &Args) -> Result<Config, Error> {
    match &args.config {
        Some(path) => {
            let data = fs::read_to_string(path).map_err(|e| {
                log::error!("failed to load configuration from {}: {}", path.display(), e);
                Error::Config(e.to_string())
            })?;
            Config::parse(&data).map_err(|e| {
                log::error!("failed to parse configuration from {}: {}", path.display(), e);
                Error::Config(e.to_string())
            })
        }
        None => {
            let timeout = humantime::parse_duration(&args.timeout).map_err(|e| {
                log::error!("failed to parse timeout \"{}\": {}", args.timeout, e);
                Error::Config(e.to_string())
            })?;
            Ok(Config::simple(
                args.server,
                &args.listen,
                &args.connect,
                &args.password,
                args.compress,
                timeout,
            ))
        }
    }
}

fn validate(listen: &str, connect: &str, password: &str) -> Result<(), Error> {
    if listen.is_empty() {
        log::error!("listen endpoint not specified");
        return Err(Error::InvalidArgument);
    }
    if connect.is_empty() {
        log::error!("connect endpoint not specified");
        return Err(Error::InvalidArgument);
    }
    if password.is_empty() {
        log::error!("pre-shared password not specified");
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

fn start_endpoints(config: &Config) -> Result<(Vec<Server>, Vec<Client>), Error> {
    for entry in &config.servers {
        validate(&entry.listen, &entry.connect, &entry.password)?;
    }
    for entry in &config.clients {
        validate(&entry.listen, &entry.connect, &entry.password)?;
    }

    let mut servers = Vec::with_capacity(config.servers.len());
    let mut clients = Vec::with_capacity(config.clients.len());

    for entry in &config.servers {
        match Server::new(
            entry.password.as_bytes(),
            &entry.listen,
            &entry.connect,
            entry.compress,
            entry.timeout,
        ) {
            Ok(server) => {
                log::info!("listening on {} in server mode", entry.listen);
                servers.push(server);
            }
            Err(e) => {
                log::error!("failed to create server on endpoint \"{}\": {}", entry.listen, e);
                close_endpoints(&mut servers, &mut clients);
                return Err(Error::Endpoint(e));
            }
        }
    }

    for entry in &config.clients {
        match Client::new(
            entry.password.as_bytes(),
            &entry.listen,
            &entry.connect,
            entry.compress,
            entry.timeout,
        ) {
            Ok(client) => {
                log::info!("listening on {} in client mode", entry.listen);
                clients.push(client);
            }
            Err(e) => {
                log::error!("failed to create client on endpoint \"{}\": {}", entry.listen, e);
                close_endpoints(&mut servers, &mut clients);
                return Err(Error::Endpoint(e));
            }
        }
    }

    Ok((servers, clients))
}

// reverse construction order: clients were started last
fn close_endpoints(servers: &mut Vec<Server>, clients: &mut Vec<Client>) {
    for client in clients.iter_mut().rev() {
        client.close();
    }
    for server in servers.iter_mut().rev() {
        server.close();
    }
}

fn wait_for_interrupt() -> Result<(), Error> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .map_err(|e| {
        log::error!("failed to install signal handler: {}", e);
        Error::Signal(e)
    })?;

    let ticker = crossbeam_channel::tick(Duration::from_secs(30));
    loop {
        crossbeam_channel::select! {
            recv(rx) -> _ => break,
            recv(ticker) -> _ => {
                // reserved for scavenging idle sessions
            }
        }
    }
    Ok(())
}

pub fn run(args: Args) -> Result<(), Error> {
    configure_logging(&args.log_level, &args.log_format);

    let config = load_config(&args)?;
    log::info!("configuration loaded:\n{}", config);

    let (mut servers, mut clients) = start_endpoints(&config)?;

    let result = wait_for_interrupt();

    log::info!("exiting ...");
    close_endpoints(&mut servers, &mut clients);
    result
}
