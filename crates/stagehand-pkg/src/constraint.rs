//! Version-constrained dependency expressions.
//!
//! A dependency on another installer package is written as a compact
//! expression such as `extlib>=2.0` or just `extlib`. The expression is
//! kept opaque: the version literal is stored and emitted verbatim, never
//! evaluated against a package repository.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Comparison operator attached to a dependency expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Comparison {
    /// No operator: the dependency names a package without a version bound.
    #[default]
    None,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `=`
    Equal,
    /// `>=`
    GreaterOrEqual,
    /// `>`
    Greater,
}

impl Comparison {
    /// The operator token as it appears in a dependency expression.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Equal => "=",
            Self::GreaterOrEqual => ">=",
            Self::Greater => ">",
        }
    }
}

/// A single dependency edge: a package name with an optional version bound.
///
/// Identity for set membership is the `name` alone. Two constraints on the
/// same package compare equal regardless of operator and value, so inserting
/// both into a set keeps whichever arrived first.
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    /// Name of the referenced package.
    pub name: String,
    /// Comparison operator, `None` when the expression carries no bound.
    pub comparison: Comparison,
    /// Version literal, empty exactly when `comparison` is `None`.
    pub value: String,
}

impl VersionConstraint {
    /// A constraint that names a package without any version bound.
    #[must_use]
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comparison: Comparison::None,
            value: String::new(),
        }
    }

    /// Parse a dependency expression.
    ///
    /// Operators are searched in the order `<=`, `>=`, `<`, `=`, `>`; the
    /// first token found splits the expression into name and version value.
    /// When no token occurs the whole expression is the name, taken verbatim.
    /// The version value is free-form and not validated.
    #[must_use]
    pub fn parse(expression: &str) -> Self {
        const OPERATORS: [(&str, Comparison); 5] = [
            ("<=", Comparison::LessOrEqual),
            (">=", Comparison::GreaterOrEqual),
            ("<", Comparison::Less),
            ("=", Comparison::Equal),
            (">", Comparison::Greater),
        ];

        for (token, comparison) in OPERATORS {
            if let Some(pos) = expression.find(token) {
                return Self {
                    name: expression[..pos].to_string(),
                    comparison,
                    value: expression[pos + token.len()..].to_string(),
                };
            }
        }

        Self::unversioned(expression)
    }

    /// Whether this constraint carries a version bound.
    #[must_use]
    pub fn is_versioned(&self) -> bool {
        self.comparison != Comparison::None
    }
}

impl From<&str> for VersionConstraint {
    fn from(expression: &str) -> Self {
        Self::parse(expression)
    }
}

/// Formats the constraint back into its expression form, the inverse of
/// [`VersionConstraint::parse`] for well-formed single-operator input.
impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comparison == Comparison::None {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}{}{}", self.name, self.comparison.token(), self.value)
        }
    }
}

// Identity is the package name only; operator and value ride along.

impl PartialEq for VersionConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for VersionConstraint {}

impl PartialOrd for VersionConstraint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionConstraint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl Hash for VersionConstraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
