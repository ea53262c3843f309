//! Layout and stamp settings.
//!
//! Every field has a default, so a partial JSON document (or none at all) is
//! enough to configure the crate.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub layout: LayoutPolicy,
    pub stamp: StampStyle,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let config: Config = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            Error::Config(format!(
                "Can not read `{}`: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        Self::from_json_str(&data)
    }

    fn check(&self) -> Result<(), Error> {
        let numbers = [
            ("layout.margin", self.layout.margin),
            ("layout.fallbackWidth", self.layout.fallback_width),
            ("layout.fallbackHeight", self.layout.fallback_height),
            ("layout.detailsHeight", self.layout.details_height),
            ("stamp.labelSize", self.stamp.label_size),
            ("stamp.detailSize", self.stamp.detail_size),
            ("stamp.lineGap", self.stamp.line_gap),
            ("stamp.firstLineOffset", self.stamp.first_line_offset),
            ("stamp.bottomTextLimit", self.stamp.bottom_text_limit),
        ];
        for (name, value) in numbers {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "`{}` must be a positive number, got `{}`.",
                    name, value
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.stamp.text_gray) {
            return Err(Error::Config(format!(
                "`stamp.textGray` must be between 0 and 1, got `{}`.",
                self.stamp.text_gray
            )));
        }
        if self.layout.fallback_width == 0.0 || self.layout.fallback_height == 0.0 {
            return Err(Error::Config(
                "Fallback placement must have a non-zero size.".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Where stamps go when the document declares no regions, and how far they
/// stay from the page edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutPolicy {
    pub margin: f64,
    pub fallback_width: f64,
    pub fallback_height: f64,
    /// Room kept free under the fallback stamp for the attestation lines.
    pub details_height: f64,
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        LayoutPolicy {
            margin: 30.0,
            fallback_width: 100.0,
            fallback_height: 50.0,
            details_height: 25.0,
        }
    }
}

/// How a single stamp is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StampStyle {
    pub label: String,
    pub label_size: f64,
    pub detail_size: f64,
    /// Distance between the baselines of two attestation lines.
    pub line_gap: f64,
    /// Distance between the bottom of the stamp and the first baseline.
    pub first_line_offset: f64,
    /// No attestation baseline is placed below this height.
    pub bottom_text_limit: f64,
    /// Gray level (0 = black, 1 = white) of all stamp text.
    pub text_gray: f64,
}

impl Default for StampStyle {
    fn default() -> Self {
        StampStyle {
            label: "Digital Signature".to_owned(),
            label_size: 7.0,
            detail_size: 5.0,
            line_gap: 6.0,
            first_line_offset: 5.0,
            bottom_text_limit: 10.0,
            text_gray: 0.2,
        }
    }
}
