//! Namespace-qualified XML names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A namespace-qualified name, as used for WSDL operations and payload elements.
///
/// An empty `namespace` means the name is unqualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QName {
    pub namespace: String,
    pub local: String,
}

impl QName {
    #[must_use]
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// An unqualified name (empty namespace).
    #[must_use]
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(String::new(), local)
    }
}

/// Clark notation: `{namespace}local`, or just `local` when unqualified.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

/// Error returned when a string is not valid Clark notation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid qualified name: {0:?}")]
pub struct ParseQNameError(pub String);

impl FromStr for QName {
    type Err = ParseQNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseQNameError(s.to_string());
        match s.strip_prefix('{') {
            Some(rest) => {
                let (namespace, local) = rest.split_once('}').ok_or_else(invalid)?;
                if local.is_empty() {
                    return Err(invalid());
                }
                Ok(Self::new(namespace, local))
            }
            None if s.is_empty() || s.contains('}') => Err(invalid()),
            None => Ok(Self::local(s)),
        }
    }
}
