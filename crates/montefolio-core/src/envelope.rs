use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::ValidationError;

pub const SCHEMA_VERSION: &str = "v1.0.0";

/// Response envelope wrapping every machine-readable `montefolio` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub meta: EnvelopeMeta,
    pub data: T,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EnvelopeError>,
}

impl<T> Envelope<T> {
    pub fn success(meta: EnvelopeMeta, data: T) -> Self {
        Self {
            meta,
            data,
            errors: Vec::new(),
        }
    }

    pub fn push_error(&mut self, error: EnvelopeError) -> Result<(), ValidationError> {
        error.validate()?;
        self.errors.push(error);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    pub request_id: String,
    pub schema_version: String,
    /// RFC3339 UTC time the envelope was built.
    pub generated_at: String,
    /// Where the data came from, in processing order (`yfinance`, `warehouse`, ...).
    pub source_chain: Vec<String>,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl EnvelopeMeta {
    pub fn new(
        request_id: impl Into<String>,
        source_chain: Vec<String>,
        latency_ms: u64,
    ) -> Result<Self, ValidationError> {
        let meta = Self {
            request_id: request_id.into(),
            schema_version: String::from(SCHEMA_VERSION),
            generated_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| String::from("<unformattable>")),
            source_chain,
            latency_ms,
            warnings: Vec::new(),
        };
        meta.validate()?;
        Ok(meta)
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.request_id.trim().len() < 8 {
            return Err(ValidationError::InvalidRequestId);
        }
        if !is_valid_schema_version(&self.schema_version) {
            return Err(ValidationError::InvalidSchemaVersion {
                value: self.schema_version.clone(),
            });
        }
        if self.source_chain.is_empty() {
            return Err(ValidationError::EmptySourceChain);
        }
        Ok(())
    }
}

/// Structured error carried by partial or failed responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
}

impl EnvelopeError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let error = Self {
            code: code.into(),
            message: message.into(),
        };
        error.validate()?;
        Ok(error)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.code.trim().is_empty() {
            return Err(ValidationError::EmptyErrorCode);
        }
        if self.message.trim().is_empty() {
            return Err(ValidationError::EmptyErrorMessage);
        }
        Ok(())
    }
}

fn is_valid_schema_version(value: &str) -> bool {
    let Some(version) = value.strip_prefix('v') else {
        return false;
    };
    let parts = version.split('.').collect::<Vec<_>>();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<String> {
        vec![String::from("yfinance")]
    }

    #[test]
    fn builds_meta_with_current_schema() {
        let meta = EnvelopeMeta::new("request-12345", chain(), 3).expect("meta");
        assert_eq!(meta.schema_version, SCHEMA_VERSION);
        assert!(meta.generated_at.ends_with('Z'));
    }

    #[test]
    fn rejects_short_request_id() {
        let err = EnvelopeMeta::new("abc", chain(), 0).expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidRequestId));
    }

    #[test]
    fn rejects_empty_source_chain() {
        let err = EnvelopeMeta::new("request-12345", Vec::new(), 0).expect_err("must fail");
        assert!(matches!(err, ValidationError::EmptySourceChain));
    }

    #[test]
    fn schema_version_shape() {
        assert!(is_valid_schema_version("v1.0.0"));
        assert!(!is_valid_schema_version("1.0.0"));
        assert!(!is_valid_schema_version("v1.0"));
    }

    #[test]
    fn rejects_empty_error_message() {
        let err = EnvelopeError::new("core.validation", " ").expect_err("must fail");
        assert!(matches!(err, ValidationError::EmptyErrorMessage));
    }

    #[test]
    fn warnings_are_omitted_when_empty() {
        let meta = EnvelopeMeta::new("request-12345", chain(), 0).expect("meta");
        let json = serde_json::to_value(Envelope::success(meta, 1)).expect("json");
        assert!(json["meta"].get("warnings").is_none());
        assert!(json.get("errors").is_none());
    }
}
