//! Coupon code parsing.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PromotionCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PromotionCodeError {
    #[error("promotion code cannot be empty")]
    Empty,
    #[error("promotion code must be at least {min} characters")]
    TooShort { min: usize },
    #[error("promotion code must be at most {max} characters")]
    TooLong { max: usize },
    #[error("promotion code contains invalid character '{0}'")]
    InvalidCharacter(char),
}

/// A normalized coupon code.
///
/// Codes are case-insensitive for customers: input is trimmed and uppercased
/// before it is compared with stored codes.
///
/// ```
/// use marigold_core::promotion::PromotionCode;
///
/// let code = PromotionCode::parse(" summer-10 ").unwrap();
/// assert_eq!(code.as_str(), "SUMMER-10");
/// assert!(PromotionCode::parse("no spaces").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PromotionCode(String);

impl PromotionCode {
    pub const MIN_LENGTH: usize = 3;
    pub const MAX_LENGTH: usize = 32;

    /// Parse and normalize a code.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, outside 3-32
    /// characters, or contains anything other than ASCII letters, digits,
    /// `-` and `_`.
    pub fn parse(s: &str) -> Result<Self, PromotionCodeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PromotionCodeError::Empty);
        }

        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(PromotionCodeError::InvalidCharacter(bad));
        }

        // All characters are ASCII past this point, so len() counts characters.
        if trimmed.len() < Self::MIN_LENGTH {
            return Err(PromotionCodeError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(PromotionCodeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromotionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PromotionCode {
    type Err = PromotionCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PromotionCode {
    type Error = PromotionCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PromotionCode> for String {
    fn from(code: PromotionCode) -> Self {
        code.0
    }
}

impl AsRef<str> for PromotionCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_uppercases() {
        assert_eq!(PromotionCode::parse("welcome_5").unwrap().as_str(), "WELCOME_5");
    }

    #[test]
    fn test_length_bounds() {
        assert_eq!(
            PromotionCode::parse("AB"),
            Err(PromotionCodeError::TooShort { min: 3 })
        );
        assert!(PromotionCode::parse("ABC").is_ok());
        assert!(PromotionCode::parse(&"A".repeat(32)).is_ok());
        assert_eq!(
            PromotionCode::parse(&"A".repeat(33)),
            Err(PromotionCodeError::TooLong { max: 32 })
        );
    }

    #[test]
    fn test_invalid_characters() {
        assert_eq!(
            PromotionCode::parse("SAVE 10"),
            Err(PromotionCodeError::InvalidCharacter(' '))
        );
        assert_eq!(
            PromotionCode::parse("ÉTÉ20"),
            Err(PromotionCodeError::InvalidCharacter('É'))
        );
        assert_eq!(PromotionCode::parse(""), Err(PromotionCodeError::Empty));
    }
}
