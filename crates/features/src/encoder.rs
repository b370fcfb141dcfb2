//! Label encoding for categorical attributes.
//!
//! Classes are the sorted distinct values seen at fit time and a value's
//! code is its position in that list. Codes are therefore only meaningful
//! together with the encoder that produced them; a retrain may renumber.

use crate::error::{FeatureError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on the given values
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut classes: Vec<String> = values.into_iter().map(str::to_string).collect();
        classes.sort_unstable();
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }

    /// Code of a single value. Unseen values are an error.
    pub fn transform(&self, feature: &str, value: &str) -> Result<usize> {
        if !self.is_fitted() {
            return Err(FeatureError::NotFitted("LabelEncoder"));
        }
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map_err(|_| FeatureError::UnknownCategory {
                feature: feature.to_string(),
                value: value.to_string(),
            })
    }

    /// Value for a code, if the code is in range
    pub fn inverse_transform(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_sorted_classes() {
        let enc = LabelEncoder::fit(["Teen", "Everyone", "Mature", "Teen"]);
        assert_eq!(enc.classes(), &["Everyone", "Mature", "Teen"]);
        assert_eq!(enc.transform("esrb", "Everyone").unwrap(), 0);
        assert_eq!(enc.transform("esrb", "Teen").unwrap(), 2);
        assert_eq!(enc.inverse_transform(1), Some("Mature"));
        assert_eq!(enc.inverse_transform(3), None);
    }

    #[test]
    fn test_unseen_value_is_an_error() {
        let enc = LabelEncoder::fit(["Action"]);
        let err = enc.transform("genre", "Racing").unwrap_err();
        assert!(matches!(err, FeatureError::UnknownCategory { .. }));
    }

    #[test]
    fn test_unfitted_encoder() {
        let enc = LabelEncoder::default();
        assert!(matches!(
            enc.transform("genre", "Action"),
            Err(FeatureError::NotFitted(_))
        ));
    }
}
