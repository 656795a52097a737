#![forbid(unsafe_code)]

//! Per-operation signing options.

use chrono::{DateTime, FixedOffset, Utc};
use sri_xades_c14n::C14nMode;
use sri_xades_core::Error;
use sri_xades_crypto::HashAlgorithm;

/// Ecuador's fixed UTC offset (-05:00) in seconds west of UTC.
pub const ECUADOR_UTC_OFFSET_WEST: i32 = 5 * 3600;

/// Format of `SigningTime`: seconds precision with a numeric offset.
pub const SIGNING_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Where the signature was produced (`etsi:SignatureProductionPlace`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionPlace {
    pub city: String,
    pub state_or_province: String,
    pub postal_code: String,
    pub country_name: String,
}

impl ProductionPlace {
    pub fn new(
        city: impl Into<String>,
        state_or_province: impl Into<String>,
        postal_code: impl Into<String>,
        country_name: impl Into<String>,
    ) -> Self {
        Self {
            city: city.into(),
            state_or_province: state_or_province.into(),
            postal_code: postal_code.into(),
            country_name: country_name.into(),
        }
    }
}

impl Default for ProductionPlace {
    fn default() -> Self {
        Self::new("Quito", "Pichincha", "170150", "EC")
    }
}

/// Roles claimed by the signer (`etsi:SignerRole/etsi:ClaimedRoles`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignerRole {
    pub claimed_roles: Vec<String>,
}

impl SignerRole {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            claimed_roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// Options for a single sign operation.
///
/// Unset optional properties are omitted from the signature.
#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    /// Hash used for every digest and for the RSA signature.
    pub algorithm: HashAlgorithm,
    /// How referenced fragments are turned into bytes.
    pub canonicalization: C14nMode,
    pub production_place: Option<ProductionPlace>,
    /// Omitted when `None` or when no role is claimed.
    pub signer_role: Option<SignerRole>,
    /// Fixed signing time; the current time at -05:00 when `None`.
    pub signing_time: Option<DateTime<FixedOffset>>,
}

impl SignOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_canonicalization(mut self, mode: C14nMode) -> Self {
        self.canonicalization = mode;
        self
    }

    pub fn with_production_place(mut self, place: ProductionPlace) -> Self {
        self.production_place = Some(place);
        self
    }

    pub fn with_signer_role(mut self, role: SignerRole) -> Self {
        self.signer_role = Some(role);
        self
    }

    pub fn with_signing_time(mut self, time: DateTime<FixedOffset>) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// The signing time to embed, resolving "now" when unset.
    pub fn resolve_signing_time(&self) -> Result<DateTime<FixedOffset>, Error> {
        match self.signing_time {
            Some(time) => Ok(time),
            None => {
                let offset = FixedOffset::west_opt(ECUADOR_UTC_OFFSET_WEST)
                    .ok_or_else(|| Error::Signing("invalid UTC offset".into()))?;
                Ok(Utc::now().with_timezone(&offset))
            }
        }
    }
}

/// Render a signing time as `YYYY-MM-DDTHH:MM:SS±HH:MM`.
pub fn format_signing_time(time: &DateTime<FixedOffset>) -> String {
    time.format(SIGNING_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SignOptions::default();
        assert_eq!(options.algorithm, HashAlgorithm::Sha1);
        assert_eq!(options.canonicalization, C14nMode::Inclusive);
        assert!(options.production_place.is_none());
        assert!(options.signer_role.is_none());
    }

    #[test]
    fn test_signing_time_format() {
        let time = DateTime::parse_from_rfc3339("2024-03-05T09:08:07.123-05:00").unwrap();
        assert_eq!(format_signing_time(&time), "2024-03-05T09:08:07-05:00");
        let utc = DateTime::parse_from_rfc3339("2024-03-05T14:08:07Z").unwrap();
        assert_eq!(format_signing_time(&utc), "2024-03-05T14:08:07+00:00");
    }

    #[test]
    fn test_default_signing_time_is_ecuador_offset() {
        let time = SignOptions::default().resolve_signing_time().unwrap();
        assert_eq!(time.offset().local_minus_utc(), -ECUADOR_UTC_OFFSET_WEST);
        assert!(format_signing_time(&time).ends_with("-05:00"));
    }

    #[test]
    fn test_builder() {
        let time = DateTime::parse_from_rfc3339("2024-01-01T00:00:00-05:00").unwrap();
        let options = SignOptions::new()
            .with_algorithm(HashAlgorithm::Sha256)
            .with_canonicalization(C14nMode::Direct)
            .with_production_place(ProductionPlace::default())
            .with_signer_role(SignerRole::new(["Emisor"]))
            .with_signing_time(time);
        assert_eq!(options.resolve_signing_time().unwrap(), time);
        assert_eq!(options.production_place.unwrap().city, "Quito");
        assert_eq!(options.signer_role.unwrap().claimed_roles, vec!["Emisor"]);
    }
}
