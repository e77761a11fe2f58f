use crate::config::types::{CrawlConfig, PlatformProbeEntry, WaitPolicyEntry};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &CrawlConfig) -> Result<(), ConfigError> {
    validate_limits(config)?;
    validate_user_agent(&config.user_agent)?;
    validate_domain_lists(config)?;
    validate_media_dirs(config)?;
    validate_wait_policies(&config.wait_policies)?;
    validate_platform_probes(&config.platform_probes)?;
    Ok(())
}

/// Validates page limits and timing values
fn validate_limits(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.timeout.is_zero() {
        return Err(ConfigError::Validation(
            "timeout must be greater than zero".to_string(),
        ));
    }

    if config.ai_timeout.is_zero() {
        return Err(ConfigError::Validation(
            "ai_timeout must be greater than zero".to_string(),
        ));
    }

    if config.summary_max_length == 0 {
        return Err(ConfigError::Validation(
            "summary_max_length must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_user_agent(user_agent: &str) -> Result<(), ConfigError> {
    if user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    // Header values cannot carry line breaks
    if user_agent.contains(['\r', '\n']) {
        return Err(ConfigError::Validation(
            "user_agent cannot contain line breaks".to_string(),
        ));
    }

    Ok(())
}

/// Validates allow and deny domain entries
fn validate_domain_lists(config: &CrawlConfig) -> Result<(), ConfigError> {
    for pattern in config.allow_domains.iter().chain(&config.deny_domains) {
        validate_domain_pattern(pattern)?;
    }
    Ok(())
}

fn validate_media_dirs(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.download_images && config.image_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "image_dir cannot be empty when download_images is enabled".to_string(),
        ));
    }

    if config.download_videos && config.video_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "video_dir cannot be empty when download_videos is enabled".to_string(),
        ));
    }

    Ok(())
}

fn validate_wait_policies(entries: &[WaitPolicyEntry]) -> Result<(), ConfigError> {
    for entry in entries {
        validate_domain_pattern(&entry.domain)?;

        if entry.click.iter().any(|selector| selector.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "Wait policy for '{}' has an empty click selector",
                entry.domain
            )));
        }
    }
    Ok(())
}

fn validate_platform_probes(entries: &[PlatformProbeEntry]) -> Result<(), ConfigError> {
    for entry in entries {
        if entry.hosts.is_empty() || entry.endpoints.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Platform probe '{}' needs at least one host and one endpoint",
                entry.name
            )));
        }

        for host in &entry.hosts {
            validate_domain_pattern(host)?;
        }

        for pattern in &entry.id_patterns {
            let regex = regex::Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!(
                    "Platform probe '{}' has an invalid id pattern: {}",
                    entry.name, e
                ))
            })?;
            if regex.captures_len() < 2 {
                return Err(ConfigError::Validation(format!(
                    "Id pattern '{}' of platform probe '{}' has no capture group",
                    pattern, entry.name
                )));
            }
        }

        if let Some(endpoint) = entry.endpoints.iter().find(|e| !e.contains("{id}")) {
            return Err(ConfigError::Validation(format!(
                "Endpoint '{}' of platform probe '{}' has no {{id}} placeholder",
                endpoint, entry.name
            )));
        }
    }
    Ok(())
}

/// Validates a domain pattern (supports wildcards)
pub(crate) fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    // Check if it's a wildcard pattern
    if let Some(domain) = pattern.strip_prefix("*.") {
        validate_domain_string(domain)
    } else {
        validate_domain_string(pattern)
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    // Bare labels are only meaningful for local hosts
    if !domain.contains('.') && domain != "localhost" {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}
