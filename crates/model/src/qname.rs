use std::fmt;

/// A qualified name, consisting of an optional prefix and a local part.
///
/// Names are owned and cheap to clone; the engine uses them for element and
/// attribute names, mode names, template names, and parameter names alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    /// A name in no namespace, with no prefix.
    pub fn local(local: impl Into<String>) -> Self {
        QName {
            prefix: None,
            local: local.into(),
        }
    }

    pub fn prefixed(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        QName {
            prefix: Some(prefix.into()),
            local: local.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) => write!(f, "{}:{}", p, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

impl From<&str> for QName {
    fn from(s: &str) -> Self {
        match s.split_once(':') {
            Some((p, l)) => QName::prefixed(p, l),
            None => QName::local(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_prefix() {
        assert_eq!(QName::from("fo:block").to_string(), "fo:block");
        assert_eq!(QName::local("para").to_string(), "para");
    }
}
