#![forbid(unsafe_code)]

//! A bidirectional TCP tunneling daemon. One endpoint terminates local
//! TCP connections and forwards each through a shared encrypted,
//! multiplexed session to its peer; the other end demultiplexes the
//! session and opens a fresh connection to the configured destination
//! for every substream. A pre-shared password authenticates the peers
//! and seeds the per-session cipher.

pub mod cli;
pub mod client;
pub mod config;
pub mod server;

mod net;
mod relay;

pub use self::client::Client;
pub use self::config::Config;
pub use self::server::Server;
