pub mod config;
pub mod error;
pub mod db;
pub mod loader;
pub mod graph;
pub mod deadline;
pub mod paths;
pub mod subgraph;
pub mod intro;
pub mod cache;
pub mod service;
pub mod http;
pub mod watch;

pub use config::Config;
pub use error::{Result, WarmgraphError};
pub use service::NetworkService;
