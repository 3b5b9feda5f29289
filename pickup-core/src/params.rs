//! Validated query parameters.
//!
//! Request layers construct these before calling [`crate::GeoQueryService`],
//! so malformed input is rejected at the boundary and never reaches the
//! store. Lengths count Unicode scalar values.

use std::fmt;

use geo::Coord;
use thiserror::Error;

/// Minimum length of a city suggestion query.
pub const SUGGEST_TEXT_MIN_CHARS: usize = 3;
/// Minimum length of a point code.
pub const POINT_CODE_MIN_CHARS: usize = 3;
/// Maximum length of a point code.
pub const POINT_CODE_MAX_CHARS: usize = 10;

/// Errors raised while validating query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// Suggestion text was shorter than [`SUGGEST_TEXT_MIN_CHARS`].
    #[error("text must be at least {min} characters long, got {found}")]
    TextTooShort {
        /// Required minimum.
        min: usize,
        /// Length supplied.
        found: usize,
    },
    /// A point code fell outside the accepted length range.
    #[error("point code must be between {min} and {max} characters long, got {found}")]
    CodeLength {
        /// Inclusive lower bound.
        min: usize,
        /// Inclusive upper bound.
        max: usize,
        /// Length supplied.
        found: usize,
    },
    /// A coordinate was `NaN` or infinite.
    #[error("{field} must be a finite number")]
    NonFiniteCoordinate {
        /// Name of the offending parameter.
        field: &'static str,
    },
}

/// Free text for city suggestions, at least three characters long.
///
/// # Examples
/// ```
/// use pickup_core::params::SuggestText;
///
/// assert!(SuggestText::new("Mo").is_err());
/// assert_eq!(SuggestText::new("Mos").map(|t| t.as_str().to_owned()), Ok("Mos".to_owned()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestText(String);

impl SuggestText {
    /// Validate suggestion text.
    ///
    /// # Errors
    /// Returns [`ParameterError::TextTooShort`] for fewer than three
    /// characters.
    pub fn new(text: impl Into<String>) -> Result<Self, ParameterError> {
        let owned = text.into();
        let found = owned.chars().count();
        if found < SUGGEST_TEXT_MIN_CHARS {
            return Err(ParameterError::TextTooShort {
                min: SUGGEST_TEXT_MIN_CHARS,
                found,
            });
        }
        Ok(Self(owned))
    }

    /// Borrow the validated text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SuggestText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point code between three and ten characters long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointCode(String);

impl PointCode {
    /// Validate a point code.
    ///
    /// # Errors
    /// Returns [`ParameterError::CodeLength`] when the code is shorter than
    /// three or longer than ten characters.
    pub fn new(code: impl Into<String>) -> Result<Self, ParameterError> {
        let owned = code.into();
        let found = owned.chars().count();
        if !(POINT_CODE_MIN_CHARS..=POINT_CODE_MAX_CHARS).contains(&found) {
            return Err(ParameterError::CodeLength {
                min: POINT_CODE_MIN_CHARS,
                max: POINT_CODE_MAX_CHARS,
                found,
            });
        }
        Ok(Self(owned))
    }

    /// Borrow the validated code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PointCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build a coordinate from separately supplied longitude and latitude.
///
/// `lng_field` and `lat_field` name the parameters in error messages.
///
/// # Errors
/// Returns [`ParameterError::NonFiniteCoordinate`] for `NaN` or infinite
/// values.
pub fn coordinate(
    lng: f64,
    lat: f64,
    lng_field: &'static str,
    lat_field: &'static str,
) -> Result<Coord<f64>, ParameterError> {
    if !lng.is_finite() {
        return Err(ParameterError::NonFiniteCoordinate { field: lng_field });
    }
    if !lat.is_finite() {
        return Err(ParameterError::NonFiniteCoordinate { field: lat_field });
    }
    Ok(Coord { x: lng, y: lat })
}
