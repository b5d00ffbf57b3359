/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// Base URL of the raster/time-series query service.
    pub raster_api_url: String,
    pub raster_api_token: Option<String>,
    /// Upper bound for a single raster query and for each collector run.
    pub source_timeout_secs: u64,
    /// How many farms a batch run analyses at once.
    pub batch_concurrency: usize,
    pub smtp: SmtpConfig,
}

/// Outbound mail relay settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// `None` disables delivery; every send reports a notification failure.
    pub password: Option<String>,
    pub sender: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let sender = std::env::var("EMAIL_SENDER")
            .unwrap_or_else(|_| "reports@cropwatch.local".to_string());

        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
            raster_api_url: std::env::var("RASTER_API_URL")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            raster_api_token: std::env::var("RASTER_API_TOKEN").ok(),
            source_timeout_secs: std::env::var("SOURCE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .expect("SOURCE_TIMEOUT_SECS must be a valid number of seconds"),
            batch_concurrency: std::env::var("BATCH_CONCURRENCY")
                .unwrap_or_else(|_| "1".to_string())
                .parse::<usize>()
                .expect("BATCH_CONCURRENCY must be a positive integer")
                .max(1),
            smtp: SmtpConfig {
                host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
                port: std::env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .expect("SMTP_PORT must be a valid u16"),
                username: std::env::var("SMTP_USERNAME").unwrap_or_else(|_| sender.clone()),
                password: std::env::var("SMTP_PASSWORD").ok(),
                sender,
            },
        }
    }
}
