//! Configuration structures.

use std::fmt;
use std::time::Duration;

use serde_derive::{Deserialize, Serialize};

fn default_timeout() -> Duration {
    Duration::from_secs(2)
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ServerConfig {
    // local endpoint to listen on, for example :2020
    pub listen: String,

    // remote endpoint accepted substreams are forwarded to
    pub connect: String,

    // pre-shared password for encryption
    pub password: String,

    // whether to compress the tunnel
    #[serde(default)]
    pub compress: bool,

    // timeout while connecting
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ClientConfig {
    // local endpoint to listen on, for example 127.0.0.1:1080
    pub listen: String,

    // remote tunnel endpoint to connect to
    pub connect: String,

    // pre-shared password for encryption
    pub password: String,

    // whether to compress the tunnel
    #[serde(default)]
    pub compress: bool,

    // timeout while connecting
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
}

/// The whole daemon configuration: any non-empty combination of server
/// and client endpoints is valid.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clients: Vec<ClientConfig>,
}

impl Config {
    pub fn parse(data: &str) -> Result<Config, serde_yaml::Error> {
        serde_yaml::from_str(data)
    }

    /// Builds a single-endpoint configuration from command line flags.
    pub fn simple(
        server: bool,
        listen: &str,
        connect: &str,
        password: &str,
        compress: bool,
        timeout: Duration,
    ) -> Config {
        let mut config = Config::default();
        if server {
            config.servers.push(ServerConfig {
                listen: listen.to_string(),
                connect: connect.to_string(),
                password: password.to_string(),
                compress,
                timeout,
            });
        } else {
            config.clients.push(ClientConfig {
                listen: listen.to_string(),
                connect: connect.to_string(),
                password: password.to_string(),
                compress,
                timeout,
            });
        }
        config
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rendered = serde_yaml::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}
