use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_WORKERS: usize = 2;
const DEFAULT_HOST: &str = "0.0.0.0";

#[derive(PartialEq, Deserialize, Serialize, Debug, Clone)]
pub struct Port(u16);
#[derive(PartialEq, Deserialize, Serialize, Debug, Clone)]
pub struct Host(String);
#[derive(PartialEq, Deserialize, Serialize, Debug, Clone)]
pub struct Workers(usize);

#[derive(PartialEq, Deserialize, Serialize, Clone, Debug, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub port: Port,
    #[serde(default)]
    pub host: Host,
    #[serde(default)]
    pub workers: Workers,
}

impl Default for Port {
    fn default() -> Self {
        Port(DEFAULT_PORT)
    }
}

impl From<Port> for u16 {
    fn from(value: Port) -> Self {
        value.0
    }
}

impl From<u16> for Port {
    fn from(value: u16) -> Self {
        Port(value)
    }
}

impl Default for Host {
    fn default() -> Self {
        Host(String::from(DEFAULT_HOST))
    }
}

impl Default for Workers {
    fn default() -> Self {
        Workers(DEFAULT_WORKERS)
    }
}

impl From<Workers> for usize {
    fn from(value: Workers) -> Self {
        value.0.max(1)
    }
}

impl Display for Port {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for Host {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
