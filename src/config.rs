//! Configuration for Koinonia
//!
//! CLI arguments and environment variable handling using clap. The embedding
//! request layer parses these and hands them to the service constructors.

use clap::Parser;

/// Koinonia - relationship lifecycle and visibility authorization engine
#[derive(Parser, Debug, Clone)]
#[command(name = "koinonia")]
#[command(about = "Relationship lifecycle and visibility authorization engine")]
pub struct Args {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "koinonia")]
    pub mongodb_db: String,

    /// Enable development mode (relaxed validation, verbose errors)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Default page size for relationship listings
    #[arg(long, env = "PAGE_SIZE_DEFAULT", default_value = "20")]
    pub page_size_default: i64,

    /// Maximum page size a caller may request
    #[arg(long, env = "PAGE_SIZE_MAX", default_value = "100")]
    pub page_size_max: i64,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.mongodb_uri.is_empty() {
            return Err("MONGODB_URI must not be empty".to_string());
        }

        if self.page_size_default <= 0 || self.page_size_max <= 0 {
            return Err("page sizes must be positive".to_string());
        }

        if self.page_size_default > self.page_size_max {
            return Err("PAGE_SIZE_DEFAULT must be less than or equal to PAGE_SIZE_MAX".to_string());
        }

        Ok(())
    }

    /// Clamp a requested page size to the configured maximum
    pub fn clamp_page_size(&self, requested: Option<i64>) -> i64 {
        match requested {
            Some(n) if n > 0 => n.min(self.page_size_max),
            _ => self.page_size_default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args::parse_from(["koinonia"])
    }

    #[test]
    fn test_defaults_validate() {
        assert!(args().validate().is_ok());
    }

    #[test]
    fn test_page_size_ordering_enforced() {
        let mut a = args();
        a.page_size_default = 500;
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_clamp_page_size() {
        let a = args();
        assert_eq!(a.clamp_page_size(None), 20);
        assert_eq!(a.clamp_page_size(Some(0)), 20);
        assert_eq!(a.clamp_page_size(Some(50)), 50);
        assert_eq!(a.clamp_page_size(Some(10_000)), 100);
    }
}
