use crate::document::{Identity, SignatureRecord};
use crate::{Error, ValidationError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::NaiveDate;

/// Who signed, when, and what the signature looked like.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureAttestation {
    /// PNG bytes as produced by the drawing surface.
    pub raster_image: Vec<u8>,
    pub signer_name: String,
    pub signer_email: String,
    /// ISO calendar date, `YYYY-MM-DD`.
    pub signed_date: String,
}

impl SignatureAttestation {
    /// Attestation seeded from a known identity, without a drawing yet.
    pub fn seeded(signer: &Identity, today: NaiveDate) -> Self {
        SignatureAttestation {
            raster_image: Vec::new(),
            signer_name: signer.name.clone(),
            signer_email: signer.email.clone(),
            signed_date: today.format("%Y-%m-%d").to_string(),
        }
    }

    /// Checks the fields required before anything is composed or submitted.
    /// Fields are checked in the order a form shows them.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.raster_image.is_empty() {
            return Err(ValidationError::field(
                "signature",
                "Please draw your signature.",
            ));
        }
        if self.signer_name.trim().is_empty() {
            return Err(ValidationError::field("name", "Full name is required."));
        }
        if self.signer_email.trim().is_empty() {
            return Err(ValidationError::field("email", "Email is required."));
        }
        if self.signed_date.trim().is_empty() {
            return Err(ValidationError::field("date", "Date is required."));
        }
        Ok(())
    }

    /// The date, if it is a valid calendar date.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.signed_date.trim(), "%Y-%m-%d").ok()
    }

    pub fn record(&self) -> SignatureRecord {
        SignatureRecord {
            signer_name: self.signer_name.trim().to_owned(),
            signer_email: self.signer_email.trim().to_owned(),
            signed_date: self.signed_date.trim().to_owned(),
        }
    }
}

/// Decode a `data:image/png;base64,...` url into raw image bytes.
/// Plain base64 without the `data:` prefix is accepted as well.
pub fn raster_from_data_url(data_url: &str) -> Result<Vec<u8>, Error> {
    let data_url = data_url.trim();
    let payload = match data_url.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or_else(|| {
                Error::ImageDecode("Data url has no `,` separator.".to_owned())
            })?;
            if !header.ends_with(";base64") {
                return Err(Error::ImageDecode(format!(
                    "Data url is not base64 encoded: `{}`.",
                    header
                )));
            }
            payload
        }
        None => data_url,
    };
    STANDARD
        .decode(payload)
        .map_err(|err| Error::ImageDecode(format!("Invalid base64 data: {}", err)))
}

/// Encode bytes as a data url of the given mime type.
pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}
