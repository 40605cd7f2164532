//! Function volatility enumeration and related implementations

/// The volatility category of a function
///
/// Tells the planner what it may assume about repeated calls. Stored in the catalog as the
/// single-character `pg_proc.provolatile` code.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Behavior {
    /// The function cannot modify the database and always returns the same result given the
    /// same arguments.
    Immutable,

    /// The function cannot modify the database, and within a single table scan it consistently
    /// returns the same result for the same arguments.
    Stable,

    /// The function value can change even within a single table scan.
    ///
    /// This is the default when no volatility is declared.
    #[default]
    Volatile,
}

impl Behavior {
    /// Convert the [`Behavior`] to its SQL keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immutable => "IMMUTABLE",
            Self::Stable => "STABLE",
            Self::Volatile => "VOLATILE",
        }
    }

    /// Decode the `pg_proc.provolatile` code (`i`, `s` or `v`)
    pub fn from_volatility_code(code: &str) -> Option<Self> {
        match code {
            "i" => Some(Self::Immutable),
            "s" => Some(Self::Stable),
            "v" => Some(Self::Volatile),
            _ => None,
        }
    }
}

impl std::str::FromStr for Behavior {
    type Err = BehaviorFromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            s if s.eq_ignore_ascii_case("IMMUTABLE") => Ok(Self::Immutable),
            s if s.eq_ignore_ascii_case("STABLE") => Ok(Self::Stable),
            s if s.eq_ignore_ascii_case("VOLATILE") => Ok(Self::Volatile),
            _ => Err(BehaviorFromStrError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for Behavior {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for Behavior {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// The string is not one of `IMMUTABLE`, `STABLE` or `VOLATILE`.
#[derive(Debug, thiserror::Error)]
#[error("invalid function behavior '{0}', expected IMMUTABLE, STABLE or VOLATILE")]
pub struct BehaviorFromStrError(String);
