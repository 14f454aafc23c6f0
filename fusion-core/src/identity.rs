use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use zeroize::Zeroizing;

/// The authenticated principal behind a request.
///
/// Two identities are equal when their subjects are equal; the group set is
/// carried along for authorization but does not take part in comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Username or client name
    pub subject: String,
    /// Group memberships used for authorization
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl Identity {
    pub fn new<I, G>(subject: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        Self {
            subject: subject.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Placeholder for callers of resources that do not require a session.
    pub fn anonymous() -> Self {
        Self {
            subject: String::new(),
            groups: BTreeSet::new(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.subject.is_empty()
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.subject == other.subject
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subject.hash(state);
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            write!(f, "<anonymous>")
        } else {
            write!(f, "{}", self.subject)
        }
    }
}

/// A username/secret pair presented at login.
///
/// The secret is zeroized on drop and redacted from `Debug` output.
#[derive(Clone)]
pub struct Credential {
    pub username: String,
    pub secret: Zeroizing<String>,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: Zeroizing::new(secret.into()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}
