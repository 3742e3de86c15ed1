use std::{env, net::{IpAddr, Ipv4Addr, SocketAddr}};

use reqwest::Url;

use crate::errors::GenerationError;

pub const DEFAULT_UPSTREAM_URL: &str = "https://ai.twoblk.workers.dev/generate";
pub const DEFAULT_PLATFORM: &str = "imageeditor";

/// Everything the service needs, read once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub address: SocketAddr,
    pub proxy: ProxyConfig,
    pub generator: GeneratorConfig,
}

/// Where the forwarding endpoint sends requests and how it identifies itself.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub upstream_url: Url,
    pub platform: String,
}

/// Where the generation adapter submits its multipart requests.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub endpoint: Url,
}

impl Config {
    pub fn from_env() -> Result<Config, GenerationError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Config, GenerationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let address = var("ADDRESS")
            .ok_or_else(|| GenerationError::Config("ADDRESS must be set! Check your .env file!".into()))?;
        let address: SocketAddr = address
            .parse()
            .map_err(|_| GenerationError::Config(format!("ADDRESS is not a socket address: {}", address)))?;

        let upstream_url = var("UPSTREAM_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_URL.into());
        let platform = var("PLATFORM").unwrap_or_else(|| DEFAULT_PLATFORM.into());
        let proxy = ProxyConfig::new(&upstream_url, platform)?;

        let generator = match var("GENERATE_ENDPOINT") {
            Some(endpoint) => GeneratorConfig::new(&endpoint)?,
            None => GeneratorConfig::local(address)?,
        };

        Ok(Config { address, proxy, generator })
    }
}

impl ProxyConfig {
    pub fn new(upstream_url: &str, platform: impl Into<String>) -> Result<ProxyConfig, GenerationError> {
        let platform = platform.into();
        if platform.trim().is_empty() {
            return Err(GenerationError::Config("PLATFORM must not be empty!".into()))
        }

        Ok(ProxyConfig {
            upstream_url: parse_url("UPSTREAM_URL", upstream_url)?,
            platform,
        })
    }
}

impl GeneratorConfig {
    pub fn new(endpoint: &str) -> Result<GeneratorConfig, GenerationError> {
        Ok(GeneratorConfig {
            endpoint: parse_url("GENERATE_ENDPOINT", endpoint)?,
        })
    }

    /// The proxy route on this very server. A wildcard bind address is
    /// reached through loopback.
    pub fn local(address: SocketAddr) -> Result<GeneratorConfig, GenerationError> {
        let ip = match address.ip() {
            ip if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            ip => ip,
        };

        Self::new(&format!("http://{}/api/generate", SocketAddr::new(ip, address.port())))
    }
}

fn parse_url(name: &str, value: &str) -> Result<Url, GenerationError> {
    Url::parse(value).map_err(|err| GenerationError::Config(format!("{} is not a valid URL ({}): {}", name, value, err)))
}
