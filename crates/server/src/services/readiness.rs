//! Production readiness report.
//!
//! Any failed check makes the deployment `not-ready`; warnings alone make it
//! `ready-with-warnings`.

use serde::Serialize;

use super::ServiceError;
use crate::config::{AppConfig, PayPalMode, check_signing_secret};
use crate::db::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warning,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Ready,
    ReadyWithWarnings,
    NotReady,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
}

impl Check {
    fn new(name: &'static str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name,
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub overall: Verdict,
    pub checks: Vec<Check>,
}

impl ReadinessReport {
    fn from_checks(checks: Vec<Check>) -> Self {
        let overall = if checks.iter().any(|c| c.status == CheckStatus::Fail) {
            Verdict::NotReady
        } else if checks.iter().any(|c| c.status == CheckStatus::Warning) {
            Verdict::ReadyWithWarnings
        } else {
            Verdict::Ready
        };
        Self { overall, checks }
    }
}

pub struct ReadinessService<'a> {
    config: &'a AppConfig,
    store: &'a dyn Store,
}

impl<'a> ReadinessService<'a> {
    #[must_use]
    pub const fn new(config: &'a AppConfig, store: &'a dyn Store) -> Self {
        Self { config, store }
    }

    /// Run every check.
    ///
    /// # Errors
    ///
    /// Never fails today; an unreachable database is reported as a failed
    /// check.
    pub async fn production_check(&self) -> Result<ReadinessReport, ServiceError> {
        let mut checks = vec![self.jwt_secret(), self.https()];
        checks.push(self.database().await);
        checks.push(self.paypal());
        checks.push(self.smtp());

        let report = ReadinessReport::from_checks(checks);
        tracing::info!(overall = ?report.overall, "Production check finished");
        Ok(report)
    }

    fn jwt_secret(&self) -> Check {
        match check_signing_secret(&self.config.jwt_secret, "ATTIREBURG_JWT_SECRET") {
            Ok(()) => Check::new("jwt_secret", CheckStatus::Pass, "JWT secret is strong"),
            Err(e) => Check::new("jwt_secret", CheckStatus::Fail, e.to_string()),
        }
    }

    fn https(&self) -> Check {
        if self.config.base_url.scheme() == "https" {
            Check::new("https", CheckStatus::Pass, "Base URL uses HTTPS")
        } else {
            Check::new(
                "https",
                CheckStatus::Fail,
                format!("Base URL {} does not use HTTPS", self.config.base_url),
            )
        }
    }

    async fn database(&self) -> Check {
        match self.store.ping().await {
            Ok(()) => Check::new("database", CheckStatus::Pass, "Database is reachable"),
            Err(e) => {
                tracing::warn!(error = %e, "Database unreachable during production check");
                Check::new("database", CheckStatus::Fail, "Database is unreachable")
            }
        }
    }

    fn paypal(&self) -> Check {
        match &self.config.paypal {
            Some(paypal) if paypal.mode == PayPalMode::Live => {
                Check::new("paypal", CheckStatus::Pass, "PayPal is configured for live payments")
            }
            Some(_) => Check::new(
                "paypal",
                CheckStatus::Warning,
                "PayPal is in sandbox mode",
            ),
            None => Check::new("paypal", CheckStatus::Warning, "PayPal is not configured"),
        }
    }

    fn smtp(&self) -> Check {
        if self.config.email.is_some() {
            Check::new("smtp", CheckStatus::Pass, "SMTP is configured")
        } else {
            Check::new(
                "smtp",
                CheckStatus::Warning,
                "SMTP is not configured, emails are only logged",
            )
        }
    }
}
