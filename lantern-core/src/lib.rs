//! Lantern proxy discovery engine
//!
//! Classifies peers and servers announced over the signaling channel, keeps
//! rotating pools of usable proxies and runs the certificate exchange between
//! trusted peers. See [`core_discovery::DiscoveryEngine`] for the entry point.

pub mod config;
pub mod core_discovery;
pub mod logging;
pub mod shutdown;
pub mod test_utils;

pub use config::{Config, ConfigError};
pub use core_discovery::{
    Collaborators, DiscoveryEngine, DiscoveryError, DiscoveryResult, InboundEvent, PoolSizes,
};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
pub use shutdown::{ShutdownCoordinator, ShutdownListener, ShutdownState};
