//! The `pls=<kind>` label that marks everything pls creates.

use std::collections::HashMap;
use std::fmt;

/// Label key applied to every container, network and volume.
pub const INVENTORY_LABEL: &str = "pls";

/// The two kinds of environment pls provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Docker-in-Docker sandboxes.
    Dind,
    /// mitmproxy environments.
    Mitm,
}

impl Kind {
    /// Value of the inventory label for this kind.
    #[must_use]
    pub fn label_value(self) -> &'static str {
        match self {
            Self::Dind => "dind",
            Self::Mitm => "mitm",
        }
    }

    /// Prefix for generated names. Matches the label value.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        self.label_value()
    }

    /// Labels to attach to a newly created resource.
    #[must_use]
    pub fn labels(self) -> HashMap<String, String> {
        HashMap::from([(
            INVENTORY_LABEL.to_string(),
            self.label_value().to_string(),
        )])
    }

    /// Daemon-side filter selecting resources of this kind.
    #[must_use]
    pub fn filters(self) -> HashMap<String, Vec<String>> {
        HashMap::from([(String::from("label"), vec![self.to_string()])])
    }
}

/// Formats as the `key=value` label selector.
impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{INVENTORY_LABEL}={}", self.label_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(
            Kind::Dind.labels().get("pls").map(String::as_str),
            Some("dind")
        );
        assert_eq!(
            Kind::Mitm.labels().get("pls").map(String::as_str),
            Some("mitm")
        );
    }

    #[test]
    fn test_filters_select_by_label() {
        let filters = Kind::Mitm.filters();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters["label"], vec![String::from("pls=mitm")]);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(Kind::Dind.prefix(), "dind");
        assert_eq!(Kind::Mitm.prefix(), "mitm");
    }
}
