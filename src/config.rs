use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    // Server
    pub host: String,
    pub port: u16,
    pub cors_origins: String,

    // Identity provider (federated sign-in tokens)
    pub identity_jwt_secret: String,

    // Object storage (profile photos)
    pub storage_dir: String,
    pub storage_public_url: String,
    pub max_upload_size_bytes: u64,

    // External video platform
    pub youtube_api_key: String,
    pub youtube_timeout_secs: u64,
    pub embed_domain: String,

    // Presence
    pub presence_window_secs: u64,
    pub presence_sample_size: usize,
    pub presence_poll_secs: u64,

    // Private chats
    pub max_private_chats: usize,

    // Message feed
    pub author_cache_ttl_secs: u64,

    // Local session file (replaces browser local storage)
    pub session_path: String,

    // Moderation
    pub moderator_uids: Vec<String>,
    pub admin_uids: Vec<String>,
}

impl AppConfig {
    /// Config with test-appropriate defaults (no env vars needed).
    pub fn test_default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: "*".into(),
            identity_jwt_secret: "test-identity-secret-that-is-long-enough".into(),
            storage_dir: "/tmp/kpop-companion-test-storage".into(),
            storage_public_url: "http://localhost:8080/files".into(),
            max_upload_size_bytes: 5_000_000,
            youtube_api_key: String::new(),
            youtube_timeout_secs: 5,
            embed_domain: "localhost".into(),
            presence_window_secs: 4500,
            presence_sample_size: 25,
            presence_poll_secs: 60,
            max_private_chats: 5,
            author_cache_ttl_secs: 60,
            session_path: "/tmp/kpop-companion-test-session.json".into(),
            moderator_uids: vec!["moderator".into()],
            admin_uids: vec!["admin".into()],
        }
    }

    pub fn from_env() -> Self {
        Self {
            host: env::var("COMPANION_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("COMPANION_PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .expect("COMPANION_PORT must be a valid u16"),
            cors_origins: env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".into()),

            identity_jwt_secret: env::var("IDENTITY_JWT_SECRET")
                .expect("IDENTITY_JWT_SECRET must be set"),

            storage_dir: env::var("STORAGE_DIR")
                .unwrap_or_else(|_| "./data/uploads".into()),
            storage_public_url: env::var("STORAGE_PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8080/files".into()),
            max_upload_size_bytes: env::var("MAX_UPLOAD_SIZE_BYTES")
                .unwrap_or_else(|_| "5242880".into()) // 5MB
                .parse()
                .unwrap_or(5_242_880),

            youtube_api_key: env::var("YOUTUBE_API_KEY").unwrap_or_default(),
            youtube_timeout_secs: env::var("YOUTUBE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".into())
                .parse()
                .unwrap_or(5),
            embed_domain: env::var("EMBED_DOMAIN").unwrap_or_else(|_| "localhost".into()),

            // 5 * 60 * 15000 ms, the cutoff the live site has always used
            presence_window_secs: env::var("PRESENCE_WINDOW_SECS")
                .unwrap_or_else(|_| "4500".into())
                .parse()
                .unwrap_or(4500),
            presence_sample_size: env::var("PRESENCE_SAMPLE_SIZE")
                .unwrap_or_else(|_| "25".into())
                .parse()
                .unwrap_or(25),
            presence_poll_secs: env::var("PRESENCE_POLL_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),

            max_private_chats: env::var("MAX_PRIVATE_CHATS")
                .unwrap_or_else(|_| "5".into())
                .parse()
                .unwrap_or(5),

            author_cache_ttl_secs: env::var("AUTHOR_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),

            session_path: env::var("SESSION_PATH")
                .unwrap_or_else(|_| "./data/session.json".into()),

            moderator_uids: split_list(&env::var("MODERATOR_UIDS").unwrap_or_default()),
            admin_uids: split_list(&env::var("ADMIN_UIDS").unwrap_or_default()),
        }
    }

    pub fn presence_window(&self) -> Duration {
        Duration::from_secs(self.presence_window_secs)
    }

    pub fn presence_poll_interval(&self) -> Duration {
        Duration::from_secs(self.presence_poll_secs)
    }

    pub fn author_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.author_cache_ttl_secs)
    }

    pub fn is_moderator(&self, uid: &str) -> bool {
        self.moderator_uids.iter().any(|m| m == uid) || self.is_admin(uid)
    }

    pub fn is_admin(&self, uid: &str) -> bool {
        self.admin_uids.iter().any(|a| a == uid)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
