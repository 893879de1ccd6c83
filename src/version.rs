use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::{fmt, str::FromStr, sync::OnceLock};

use crate::error::{Error, Result};

/// A `<major>.<minor>` host runtime version, ordered component-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostVersion {
    pub major: u32,
    pub minor: u32,
}

impl HostVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"^(?P<major>\d+)\.(?P<minor>\d+)$").unwrap());

        let malformed = || Error::MalformedVersion(raw.to_string());
        let caps = re.captures(raw.trim()).ok_or_else(malformed)?;

        let major = caps["major"].parse::<u32>().map_err(|_| malformed())?;
        let minor = caps["minor"].parse::<u32>().map_err(|_| malformed())?;

        Ok(Self { major, minor })
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for HostVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for HostVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_major_minor() {
        assert_eq!(HostVersion::parse("3.9").unwrap(), HostVersion::new(3, 9));
        assert_eq!(HostVersion::parse(" 3.12 ").unwrap(), HostVersion::new(3, 12));
    }

    #[test]
    fn rejects_other_shapes() {
        for raw in ["3", "3.9.1", "v3.9", "3.x", "", "99999999999.1"] {
            assert!(
                matches!(HostVersion::parse(raw), Err(Error::MalformedVersion(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn orders_numerically_not_lexically() {
        assert!(HostVersion::new(3, 10) > HostVersion::new(3, 9));
        assert!(HostVersion::new(4, 0) > HostVersion::new(3, 12));
    }

    #[test]
    fn displays_as_dotted_pair() {
        assert_eq!(HostVersion::new(3, 11).to_string(), "3.11");
    }
}
