//! USIM identity module
//!
//! Credential handling proper is outside this crate; the stack only needs
//! an identity source that can fail to initialize. A missing or malformed
//! identity aborts `init` before the consumer thread starts.

use rustue_common::config::UsimConfig;
use rustue_common::Error;
use tracing::info;

/// Identity surface the stack reads from the USIM.
pub trait Usim: Send {
    /// International mobile subscriber identity.
    fn imsi(&self) -> &str;

    /// International mobile equipment identity.
    fn imei(&self) -> &str;

    /// Releases the module. Called once during teardown.
    fn stop(&mut self);
}

/// Software USIM backed by configured identities.
pub struct SoftUsim {
    imsi: String,
    imei: String,
}

impl SoftUsim {
    /// Validates the configured identities and builds the module.
    pub fn init(config: &UsimConfig) -> Result<Self, Error> {
        validate_identity("imsi", &config.imsi)?;
        validate_identity("imei", &config.imei)?;
        info!(imsi = %config.imsi, "soft USIM initialized");
        Ok(Self {
            imsi: config.imsi.clone(),
            imei: config.imei.clone(),
        })
    }
}

fn validate_identity(field: &str, value: &str) -> Result<(), Error> {
    if value.len() != 15 || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Identity(format!(
            "{field} must be 15 decimal digits, got '{value}'"
        )));
    }
    Ok(())
}

impl Usim for SoftUsim {
    fn imsi(&self) -> &str {
        &self.imsi
    }

    fn imei(&self) -> &str {
        &self.imei
    }

    fn stop(&mut self) {
        info!("soft USIM stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_with_valid_identities() {
        let usim = SoftUsim::init(&UsimConfig::default()).unwrap();
        assert_eq!(usim.imsi().len(), 15);
        assert_eq!(usim.imei().len(), 15);
    }

    #[test]
    fn test_init_rejects_short_imsi() {
        let config = UsimConfig {
            imsi: "12345".into(),
            ..UsimConfig::default()
        };
        assert!(matches!(
            SoftUsim::init(&config),
            Err(Error::Identity(_))
        ));
    }

    #[test]
    fn test_init_rejects_non_numeric_imsi() {
        let config = UsimConfig {
            imsi: "00101012345678x".into(),
            ..UsimConfig::default()
        };
        assert!(SoftUsim::init(&config).is_err());
    }
}
