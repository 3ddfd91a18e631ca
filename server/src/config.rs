/// Runtime settings for the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Single origin allowed by the CORS policy
    pub allowed_origin: String,
    /// Capacity of the broadcast queue
    pub broadcast_capacity: usize,
    /// Capacity of each connection's outbound queue
    pub outbound_capacity: usize,
    /// Finished games kept in memory; `None` keeps them all
    pub max_finished_games: Option<usize>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origin: "http://localhost:3000".to_string(),
            broadcast_capacity: 256,
            outbound_capacity: 64,
            max_finished_games: None,
        }
    }
}
