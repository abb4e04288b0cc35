use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    /// Where the hosted checkout redirects customers after payment.
    pub success_url: String,
    /// Where the hosted checkout redirects customers who abandon payment.
    pub cancel_url: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    /// Resend API key. None disables outbound email (logged, not fatal).
    pub resend_api_key: Option<String>,
    pub email_from: String,
    /// Destination for internal sale alerts. None disables the alert.
    pub admin_email: Option<String>,
    /// Bearer key for catalog management endpoints. None disables them.
    pub admin_api_key: Option<String>,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("MIDIMART_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));
        let success_url =
            env::var("SUCCESS_URL").unwrap_or_else(|_| format!("{}/success", base_url));
        let cancel_url = env::var("CANCEL_URL").unwrap_or_else(|_| format!("{}/cart", base_url));

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "midimart.db".to_string()),
            base_url,
            success_url,
            cancel_url,
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            resend_api_key: env::var("RESEND_API_KEY").ok(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "orders@midimart.local".to_string()),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_api_key: env::var("ADMIN_API_KEY").ok(),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
