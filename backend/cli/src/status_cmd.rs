//! `examlens status`: ask a running server for its health.

use anyhow::Result;
use examlens_config::RelayConfig;

/// Health endpoint of the configured server. Wildcard binds are reached
/// through localhost and IPv6 literals are bracketed.
fn health_url(config: &RelayConfig) -> String {
    let host = match config.server.bind.trim_start_matches('[').trim_end_matches(']') {
        "0.0.0.0" | "::" => "localhost".to_string(),
        v6 if v6.contains(':') => format!("[{v6}]"),
        other => other.to_string(),
    };
    format!("http://{}:{}/health", host, config.server.port)
}

pub async fn run(config: &RelayConfig) -> Result<()> {
    let url = health_url(config);

    println!("examlens status: checking {url}");
    match reqwest::Client::new().get(&url).send().await {
        Ok(resp) => {
            let body: serde_json::Value = resp.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Err(_) => {
            println!("examlens is not running on port {}", config.server.port);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bind: &str) -> RelayConfig {
        let mut cfg = RelayConfig::default();
        cfg.server.bind = bind.into();
        cfg.server.port = 3000;
        cfg
    }

    #[test]
    fn ipv6_binds_are_bracketed() {
        assert_eq!(health_url(&config("::1")), "http://[::1]:3000/health");
        assert_eq!(health_url(&config("[::1]")), "http://[::1]:3000/health");
    }

    #[test]
    fn wildcard_binds_use_localhost() {
        assert_eq!(health_url(&config("0.0.0.0")), "http://localhost:3000/health");
        assert_eq!(health_url(&config("::")), "http://localhost:3000/health");
        assert_eq!(health_url(&config("127.0.0.1")), "http://127.0.0.1:3000/health");
    }
}
