//! Function language name wrapper
//!
//! The language of a function is an opaque tag (`sql`, `plpgsql`, `plv8`, ...). This crate does
//! not understand function bodies, so the name is only checked for being a usable identifier and
//! otherwise passed through. Names are held as the catalog spells them (`pg_language.lanname`).

use super::ident::parse_ident;

/// A function implementation language, e.g. `sql` or `plpgsql`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Language(String);

impl Language {
    /// Create a new [`Language`], rejecting blank names and names containing NUL bytes.
    ///
    /// The name is read the way `LANGUAGE <name>` would read it: unquoted names fold to
    /// lowercase (`SQL` is `sql`) and double-quoted names keep their case. Anything else is kept
    /// verbatim.
    pub fn new(name: impl Into<String>) -> Result<Self, LanguageError> {
        let name = name.into();
        if name.trim().is_empty() || name.contains('\0') {
            return Err(LanguageError(name));
        }
        Ok(Self(parse_ident(&name).unwrap_or(name)))
    }

    /// Create a [`Language`] from a name read back from the catalog.
    pub(crate) fn from_catalog(name: String) -> Self {
        Self(name)
    }

    /// Get a reference to the inner str
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Language {
    fn default() -> Self {
        Self("sql".to_string())
    }
}

impl std::ops::Deref for Language {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Language {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Debug for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for Language {
    type Err = LanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl serde::Serialize for Language {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Self::new(name).map_err(serde::de::Error::custom)
    }
}

/// The language name is blank or contains a NUL byte.
#[derive(Debug, thiserror::Error)]
#[error("invalid function language '{0}'")]
pub struct LanguageError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_folds_unquoted_names_like_sql_does() {
        assert_eq!(Language::new("SQL").expect("valid").as_str(), "sql");
        assert_eq!(Language::new(" plpgsql ").expect("valid").as_str(), "plpgsql");
        assert_eq!(Language::new("\"PlMine\"").expect("valid").as_str(), "PlMine");
        assert_eq!(Language::new("pl-odd").expect("valid").as_str(), "pl-odd");
    }

    #[test]
    fn new_rejects_blank_names() {
        assert!(Language::new("  ").is_err());
        assert!(Language::new("sq\0l").is_err());
    }

    #[test]
    fn deserialized_names_are_folded() {
        //* When
        let language: Language = serde_json::from_str(r#""PLPGSQL""#).expect("valid name");

        //* Then
        assert_eq!(language.as_str(), "plpgsql");
    }
}
