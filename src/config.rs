use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use reqwest::Url;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";
pub const DEFAULT_SCORING_URL: &str = "http://127.0.0.1:5000/predict";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;

#[derive(Debug, Clone, Default, Args)]
pub struct ScoringArgs {
    /// Scoring service endpoint [env: SCORING_SERVICE_URL]
    #[arg(long)]
    pub scoring_url: Option<String>,
    /// Deadline for one scoring call, 0 to wait indefinitely [env: SCORING_TIMEOUT_SECS]
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Address to accept requests on [env: PLACEMENT_LISTEN]
    #[arg(long)]
    pub listen: Option<String>,
    #[command(flatten)]
    pub scoring: ScoringArgs,
    /// How long a stored result stays readable; unset keeps it for the session [env: RESULT_TTL_SECS]
    #[arg(long)]
    pub result_ttl_secs: Option<u64>,
    /// Drop sessions untouched for this long [env: SESSION_IDLE_SECS] [default: 3600]
    #[arg(long)]
    pub session_idle_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub url: Url,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub listen: SocketAddr,
    pub scoring: ScoringConfig,
    pub result_ttl: Option<chrono::Duration>,
    pub session_idle: chrono::Duration,
}

fn flag_or_env<T: Clone>(
    flag: &Option<T>,
    name: &str,
    env: &impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(value) = flag {
        return Ok(Some(value.clone()));
    }
    env(name)
        .map(|raw| raw.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("{name} is not valid"))
}

impl ScoringConfig {
    pub fn resolve(
        args: &ScoringArgs,
        env: &impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let raw_url = flag_or_env(&args.scoring_url, "SCORING_SERVICE_URL", env)?
            .unwrap_or_else(|| DEFAULT_SCORING_URL.to_string());
        let url = Url::parse(&raw_url)
            .with_context(|| format!("invalid scoring service URL `{raw_url}`"))?;

        let timeout_secs = flag_or_env(&args.timeout_secs, "SCORING_TIMEOUT_SECS", env)?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        Ok(Self { url, timeout })
    }
}

impl ServeConfig {
    pub fn resolve(args: &ServeArgs, env: &impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let raw_listen = flag_or_env(&args.listen, "PLACEMENT_LISTEN", env)?
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen = raw_listen
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid listen address `{raw_listen}`"))?;

        let result_ttl = flag_or_env(&args.result_ttl_secs, "RESULT_TTL_SECS", env)?
            .map(|secs| seconds(secs, "result TTL"))
            .transpose()?;
        let idle_secs = flag_or_env(&args.session_idle_secs, "SESSION_IDLE_SECS", env)?
            .unwrap_or(DEFAULT_SESSION_IDLE_SECS);

        Ok(Self {
            listen,
            scoring: ScoringConfig::resolve(&args.scoring, env)?,
            result_ttl,
            session_idle: seconds(idle_secs, "session idle timeout")?,
        })
    }
}

fn seconds(secs: u64, what: &str) -> anyhow::Result<chrono::Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .with_context(|| format!("{what} of {secs}s is out of range"))
}

pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_flags_or_env() {
        let config = ServeConfig::resolve(&ServeArgs::default(), &env_of(&[])).unwrap();
        assert_eq!(config.listen, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.scoring.url.as_str(), DEFAULT_SCORING_URL);
        assert_eq!(config.scoring.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.result_ttl, None);
        assert_eq!(config.session_idle, chrono::Duration::hours(1));
    }

    #[test]
    fn flags_win_over_env() {
        let args = ServeArgs {
            listen: Some("0.0.0.0:8080".to_string()),
            scoring: ScoringArgs {
                scoring_url: Some("http://scoring.internal:5000/predict".to_string()),
                timeout_secs: None,
            },
            result_ttl_secs: None,
            session_idle_secs: Some(120),
        };
        let env = env_of(&[
            ("PLACEMENT_LISTEN", "127.0.0.1:9999"),
            ("SCORING_SERVICE_URL", "http://other/predict"),
            ("SCORING_TIMEOUT_SECS", "0"),
            ("RESULT_TTL_SECS", "600"),
            ("SESSION_IDLE_SECS", "60"),
        ]);
        let config = ServeConfig::resolve(&args, &env).unwrap();
        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.scoring.url.host_str(), Some("scoring.internal"));
        assert_eq!(config.scoring.timeout, None);
        assert_eq!(config.result_ttl, Some(chrono::Duration::minutes(10)));
        assert_eq!(config.session_idle, chrono::Duration::minutes(2));
    }

    #[test]
    fn invalid_values_fail_with_context() {
        let err = ServeConfig::resolve(
            &ServeArgs::default(),
            &env_of(&[("SCORING_SERVICE_URL", "not a url")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid scoring service URL"));

        let err = ServeConfig::resolve(
            &ServeArgs::default(),
            &env_of(&[("SCORING_TIMEOUT_SECS", "soon")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("SCORING_TIMEOUT_SECS"));

        let err = ServeConfig::resolve(
            &ServeArgs::default(),
            &env_of(&[("SESSION_IDLE_SECS", "18446744073709551615")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("session idle timeout"));
    }
}
