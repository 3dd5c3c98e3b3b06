//! Qualified names of schema and data nodes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// A namespace-qualified name.
///
/// Displayed as `(namespace)local`; parsed from and serialized to Clark
/// notation, `{namespace}local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QName {
    namespace: Arc<str>,
    local_name: Arc<str>,
}

impl QName {
    pub fn new(namespace: impl Into<Arc<str>>, local_name: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// A sibling name in the same namespace
    pub fn sibling(&self, local_name: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: Arc::clone(&self.namespace),
            local_name: local_name.into(),
        }
    }

    pub fn matches(&self, namespace: &str, local_name: &str) -> bool {
        &*self.local_name == local_name && &*self.namespace == namespace
    }

    /// Clark notation, `{namespace}local`
    pub fn to_clark(&self) -> String {
        format!("{{{}}}{}", self.namespace, self.local_name)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.namespace, self.local_name)
    }
}

impl FromStr for QName {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix('{').ok_or_else(|| {
            CodecError::invalid_argument(format!("QName '{}' is not in {{namespace}}local form", s))
        })?;
        let (namespace, local_name) = rest.split_once('}').ok_or_else(|| {
            CodecError::invalid_argument(format!("QName '{}' has an unterminated namespace", s))
        })?;
        if local_name.is_empty() {
            return Err(CodecError::invalid_argument(format!(
                "QName '{}' has an empty local name",
                s
            )));
        }
        Ok(QName::new(namespace, local_name))
    }
}

impl TryFrom<String> for QName {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QName> for String {
    fn from(value: QName) -> Self {
        value.to_clark()
    }
}
