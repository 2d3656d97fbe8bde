//! Group keys: the routing dimensions a connection can belong to.

use std::fmt;

/// Named set of connections sharing a routing dimension.
///
/// The registry indexes groups by their rendered form (`team:42`), so a
/// caller-named channel that happens to be spelled `team:42` addresses the
/// same group as `GroupKey::Team("42")`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    /// `user:<id>`
    User(String),
    /// `employee:<id>`
    Employee(String),
    /// `role:<name>`
    Role(String),
    /// `team:<id>`
    Team(String),
    /// `department:<id>`
    Department(String),
    /// Arbitrary caller-supplied channel name, used verbatim.
    Channel(String),
}

impl GroupKey {
    /// Index key for this group.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Employee(id) => write!(f, "employee:{id}"),
            Self::Role(name) => write!(f, "role:{name}"),
            Self::Team(id) => write!(f, "team:{id}"),
            Self::Department(id) => write!(f, "department:{id}"),
            Self::Channel(name) => f.write_str(name),
        }
    }
}
