//! Target label encoding

use serde::{Deserialize, Serialize};

/// Mapping between class indices and risk-category labels.
pub trait LabelCodec: Send + Sync {
    fn classes(&self) -> &[String];

    fn encode(&self, label: &str) -> Option<usize>;

    fn decode(&self, index: usize) -> Option<&str>;
}

/// Label encoder with classes in sorted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEncoder {
    classes: Vec<String>,
}

impl TargetEncoder {
    /// Fit on observed labels; classes become the sorted unique set.
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = labels
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

impl LabelCodec for TargetEncoder {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn encode(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_are_sorted_and_unique() {
        let enc = TargetEncoder::fit(["Low", "Critical", "Medium", "High", "Low"]);
        assert_eq!(enc.classes(), &["Critical", "High", "Low", "Medium"]);
        assert_eq!(enc.encode("Low"), Some(2));
        assert_eq!(enc.decode(3), Some("Medium"));
        assert_eq!(enc.encode("Severe"), None);
        assert_eq!(enc.decode(4), None);
    }

    #[test]
    fn serializes_as_class_list() {
        let enc = TargetEncoder::fit(["High", "Low"]);
        let json = serde_json::to_string(&enc).unwrap();
        assert_eq!(json, r#"{"classes":["High","Low"]}"#);
    }
}
