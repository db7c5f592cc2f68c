use clap::Parser;
use std::time::Duration;

use crate::error::ConfigError;
use crate::rate_limit::RateLimitPolicy;
use crate::scheduler::MAX_INTERVAL_SECS;

// listRecords accepts at most 100 per page
const MAX_PAGE_LIMIT: usize = 100;

// CLI arguments; every setting can also come from the environment or .env
#[derive(Parser, Debug, Clone)]
#[command(name = "ollama-bsky-bot")]
#[command(about = "Generates posts in the voice of one Bluesky account with Ollama and posts them to another")]
pub struct Args {
    // Account whose posts are imitated
    #[arg(long, env = "SOURCE_HANDLE")]
    pub source_handle: Option<String>,

    #[arg(long, env = "SRC_APP_PASS", hide_env_values = true)]
    pub source_password: Option<String>,

    // Account that receives generated posts
    #[arg(long, env = "DESTINATION_HANDLE")]
    pub destination_handle: Option<String>,

    #[arg(long, env = "DST_APP_PASS", hide_env_values = true)]
    pub destination_password: Option<String>,

    #[arg(long, env = "BSKY_HOST_URL", default_value = "https://bsky.social")]
    pub host_url: String,

    #[arg(long, env = "CHAR_LIMIT", default_value_t = 280)]
    pub char_limit: usize,

    #[arg(long, env = "MIN_LENGTH", default_value_t = 10)]
    pub min_length: usize,

    // Ollama model to use
    #[arg(short, long, env = "OLLAMA_MODEL", default_value = "llama3.2")]
    pub model: String,

    #[arg(long, env = "OLLAMA_URL", default_value = "http://localhost:11434")]
    pub ollama_url: String,

    // Publish budget per trailing hour / day
    #[arg(long, env = "HOURLY_LIMIT", default_value_t = 100)]
    pub hourly_limit: usize,

    #[arg(long, env = "DAILY_LIMIT", default_value_t = 500)]
    pub daily_limit: usize,

    // skip: drop the cycle when over budget, wait: block until a slot frees
    #[arg(long, env = "RATE_POLICY", value_enum, default_value_t = RateLimitPolicy::Skip)]
    pub rate_policy: RateLimitPolicy,

    // Seconds between cycles, plus up to jitter_secs of random delay
    #[arg(long, env = "INTERVAL_SECS", default_value_t = 3600)]
    pub interval_secs: u64,

    #[arg(long, env = "JITTER_SECS", default_value_t = 900)]
    pub jitter_secs: u64,

    #[arg(long, env = "PAGE_LIMIT", default_value_t = 100)]
    pub page_limit: usize,

    #[arg(long, env = "MAX_PAGES", default_value_t = 10)]
    pub max_pages: usize,

    // Source posts included in the prompt
    #[arg(long, env = "SAMPLE_SIZE", default_value_t = 20)]
    pub sample_size: usize,

    #[arg(long, env = "POST_LANGS", value_delimiter = ',', default_value = "en")]
    pub langs: Vec<String>,

    // Generate and validate without posting
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,

    // Serve /health and /metrics on this port
    #[arg(long, env = "STATUS_PORT")]
    pub status_port: Option<u16>,

    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub handle: String,
    pub password: String,
}

/// Validated settings; construction fails before the loop ever starts.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: Credentials,
    pub destination_handle: String,
    /// `None` in dry-run mode.
    pub destination: Option<Credentials>,
    pub host_url: String,
    pub char_limit: usize,
    pub min_length: usize,
    pub model: String,
    pub ollama_url: String,
    pub hourly_limit: usize,
    pub daily_limit: usize,
    pub rate_policy: RateLimitPolicy,
    pub interval: Duration,
    pub jitter: Duration,
    pub page_limit: usize,
    pub max_pages: usize,
    pub sample_size: usize,
    pub languages: Vec<String>,
    pub dry_run: bool,
    pub status_port: Option<u16>,
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingSetting(name))
}

fn invalid(setting: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        setting,
        reason: reason.into(),
    }
}

impl TryFrom<Args> for Settings {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let source_handle = required(args.source_handle, "SOURCE_HANDLE")?;
        let destination_handle = required(args.destination_handle, "DESTINATION_HANDLE")?;
        let source = Credentials {
            handle: source_handle,
            password: required(args.source_password, "SRC_APP_PASS")?,
        };
        let destination = if args.dry_run {
            None
        } else {
            Some(Credentials {
                handle: destination_handle.clone(),
                password: required(args.destination_password, "DST_APP_PASS")?,
            })
        };

        if args.char_limit == 0 {
            return Err(invalid("CHAR_LIMIT", "must be positive"));
        }
        if args.min_length > args.char_limit {
            return Err(invalid(
                "MIN_LENGTH",
                format!("{} exceeds CHAR_LIMIT {}", args.min_length, args.char_limit),
            ));
        }
        if args.hourly_limit == 0 {
            return Err(invalid("HOURLY_LIMIT", "must be positive"));
        }
        if args.daily_limit == 0 {
            return Err(invalid("DAILY_LIMIT", "must be positive"));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&args.page_limit) {
            return Err(invalid(
                "PAGE_LIMIT",
                format!("must be between 1 and {MAX_PAGE_LIMIT}"),
            ));
        }
        if args.interval_secs.saturating_add(args.jitter_secs) > MAX_INTERVAL_SECS {
            return Err(invalid(
                "INTERVAL_SECS",
                format!("interval plus jitter must not exceed {MAX_INTERVAL_SECS} seconds"),
            ));
        }
        if args.max_pages == 0 {
            return Err(invalid("MAX_PAGES", "must be positive"));
        }
        if args.sample_size == 0 {
            return Err(invalid("SAMPLE_SIZE", "must be positive"));
        }

        let languages: Vec<String> = args
            .langs
            .iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if languages.is_empty() {
            return Err(invalid("POST_LANGS", "at least one language is required"));
        }

        Ok(Settings {
            source,
            destination_handle,
            destination,
            host_url: args.host_url,
            char_limit: args.char_limit,
            min_length: args.min_length,
            model: args.model,
            ollama_url: args.ollama_url,
            hourly_limit: args.hourly_limit,
            daily_limit: args.daily_limit,
            rate_policy: args.rate_policy,
            interval: Duration::from_secs(args.interval_secs),
            jitter: Duration::from_secs(args.jitter_secs),
            page_limit: args.page_limit,
            max_pages: args.max_pages,
            sample_size: args.sample_size,
            languages,
            dry_run: args.dry_run,
            status_port: args.status_port,
        })
    }
}
