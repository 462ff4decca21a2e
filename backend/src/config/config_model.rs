#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub auth: Auth,
    pub razorpay: Razorpay,
    pub plans: Plans,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// seconds
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Auth {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Razorpay {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
    /// seconds
    pub timeout: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Plans {
    pub catalog_path: Option<String>,
}
