//! Parallel safety enumeration

/// Whether a function may run in parallel mode
///
/// Stored in the catalog as the single-character `pg_proc.proparallel` code.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parallel {
    /// Safe to run in parallel workers without restriction.
    Safe,

    /// May run in parallel mode, but only in the group leader.
    Restricted,

    /// Forces a serial plan. The default when nothing is declared.
    #[default]
    Unsafe,
}

impl Parallel {
    /// Convert the [`Parallel`] safety to its SQL keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Restricted => "RESTRICTED",
            Self::Unsafe => "UNSAFE",
        }
    }

    /// Decode the `pg_proc.proparallel` code (`s`, `r` or `u`)
    pub fn from_parallel_code(code: &str) -> Option<Self> {
        match code {
            "s" => Some(Self::Safe),
            "r" => Some(Self::Restricted),
            "u" => Some(Self::Unsafe),
            _ => None,
        }
    }
}

impl std::str::FromStr for Parallel {
    type Err = ParallelFromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            s if s.eq_ignore_ascii_case("SAFE") => Ok(Self::Safe),
            s if s.eq_ignore_ascii_case("RESTRICTED") => Ok(Self::Restricted),
            s if s.eq_ignore_ascii_case("UNSAFE") => Ok(Self::Unsafe),
            _ => Err(ParallelFromStrError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Parallel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for Parallel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for Parallel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// The string is not one of `SAFE`, `RESTRICTED` or `UNSAFE`.
#[derive(Debug, thiserror::Error)]
#[error("invalid parallel safety '{0}', expected SAFE, RESTRICTED or UNSAFE")]
pub struct ParallelFromStrError(String);
