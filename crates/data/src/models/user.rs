//! Player-level records: identity, group assignment, platform and
//! cheater flags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique player identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(UserId)
    }
}

/// Records that belong to exactly one user.
pub trait UserKeyed {
    fn user_id(&self) -> UserId;
}

/// Experiment arm label.
///
/// Usually `control` or `test`, but any label found in the assignment
/// table is kept so that extra arms can be reported rather than dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group(String);

impl Group {
    pub const CONTROL: &'static str = "control";
    pub const TEST: &'static str = "test";

    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into().trim().to_string())
    }

    #[must_use]
    pub fn control() -> Self {
        Self::new(Self::CONTROL)
    }

    #[must_use]
    pub fn test() -> Self {
        Self::new(Self::TEST)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the `control` arm (case-insensitive).
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.0.eq_ignore_ascii_case(Self::CONTROL)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Gaming platform a player uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Pc,
    PlayStation,
    Xbox,
    Mobile,
}

impl Platform {
    /// Returns the display name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Pc => "PC",
            Platform::PlayStation => "PlayStation",
            Platform::Xbox => "Xbox",
            Platform::Mobile => "Mobile",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown platform '{0}'")]
pub struct ParsePlatformError(pub String);

impl FromStr for Platform {
    type Err = ParsePlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match normalized.as_str() {
            "pc" | "windows" | "steam" => Ok(Platform::Pc),
            "ps" | "ps4" | "ps5" | "playstation" => Ok(Platform::PlayStation),
            "xbox" | "xboxone" | "xboxseries" => Ok(Platform::Xbox),
            "mobile" | "android" | "ios" => Ok(Platform::Mobile),
            _ => Err(ParsePlatformError(s.to_string())),
        }
    }
}

/// One row of the group assignment table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAssignment {
    pub user_id: UserId,
    pub group: Group,
}

/// One row of the platform table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRecord {
    pub user_id: UserId,
    pub platform: Platform,
}

/// One row of the known-cheater table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheaterFlag {
    pub user_id: UserId,
    pub is_cheater: bool,
}

/// Joined view of a player across the user-level tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub group: Group,
    pub platform: Option<Platform>,
    pub is_known_cheater: bool,
}

impl UserKeyed for GroupAssignment {
    fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl UserKeyed for PlatformRecord {
    fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl UserKeyed for CheaterFlag {
    fn user_id(&self) -> UserId {
        self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_parses_with_whitespace() {
        assert_eq!(" 42 ".parse::<UserId>().unwrap(), UserId(42));
        assert!("abc".parse::<UserId>().is_err());
    }

    #[test]
    fn group_is_trimmed_and_detects_control() {
        let group = Group::new(" Control ");
        assert_eq!(group.as_str(), "Control");
        assert!(group.is_control());
        assert!(!Group::test().is_control());
    }

    #[test]
    fn platform_aliases() {
        assert_eq!("PS4".parse::<Platform>().unwrap(), Platform::PlayStation);
        assert_eq!("XBox One".parse::<Platform>().unwrap(), Platform::Xbox);
        assert_eq!("pc".parse::<Platform>().unwrap(), Platform::Pc);
        assert_eq!("iOS".parse::<Platform>().unwrap(), Platform::Mobile);
    }

    #[test]
    fn platform_rejects_unknown() {
        let err = "dreamcast".parse::<Platform>().unwrap_err();
        assert_eq!(err, ParsePlatformError("dreamcast".to_string()));
    }

    #[test]
    fn group_serializes_as_plain_string() {
        let json = serde_json::to_string(&Group::control()).unwrap();
        assert_eq!(json, "\"control\"");
    }
}
