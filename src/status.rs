use anyhow::Result;
use serde::Serialize;

use crate::config::Config;

/// Which settings are present and what the services resolve to.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub settings: Vec<SettingStatus>,
    pub search_endpoint: Option<String>,
    pub cache_capacity: usize,
    pub top_k: usize,
    pub healthy: bool,
}

#[derive(Debug, Serialize)]
pub struct SettingStatus {
    pub name: String,
    pub present: bool,
}

pub fn get_status(config: &Config) -> StatusReport {
    let settings: Vec<SettingStatus> = config
        .credentials
        .entries()
        .into_iter()
        .map(|(name, present)| SettingStatus {
            name: name.to_string(),
            present,
        })
        .collect();
    let healthy = settings.iter().all(|s| s.present);
    StatusReport {
        settings,
        search_endpoint: config.search_endpoint(),
        cache_capacity: config.cache.capacity,
        top_k: config.search.top_k,
        healthy,
    }
}

pub fn print_status(config: &Config) -> Result<()> {
    let report = get_status(config);

    println!("{:<24} STATUS", "SETTING");
    for s in &report.settings {
        println!("{:<24} {}", s.name, if s.present { "set" } else { "missing" });
    }
    println!();
    println!(
        "search endpoint: {}",
        report.search_endpoint.as_deref().unwrap_or("NOT CONFIGURED")
    );
    println!("search top_k: {}", report.top_k);
    println!("cache capacity: {}", report.cache_capacity);
    println!("healthy: {}", report.healthy);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_credentials_are_unhealthy() {
        let report = get_status(&Config::default());
        assert_eq!(report.settings.len(), 6);
        assert!(report.settings.iter().all(|s| !s.present));
        assert!(!report.healthy);
        assert!(report.search_endpoint.is_none());
    }

    #[test]
    fn full_credentials_are_healthy() {
        let mut cfg = Config::default();
        let creds = &mut cfg.credentials;
        creds.openai_deployment_name = Some("gpt".into());
        creds.openai_api_key = Some("k".into());
        creds.azure_openai_endpoint = Some("https://o".into());
        creds.azure_search_service = Some("svc".into());
        creds.azure_search_key = Some("k".into());
        creds.azure_search_index = Some("idx".into());
        let report = get_status(&cfg);
        assert!(report.healthy);
        assert_eq!(
            report.search_endpoint.as_deref(),
            Some("https://svc.search.windows.net")
        );
    }
}
