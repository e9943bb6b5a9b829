use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Effective permissions of a path, as reported by a storage backend.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Permissions: u32 {
        const READ = 1 << 0;
        const UPDATE = 1 << 1;
        const CREATE = 1 << 2;
        const DELETE = 1 << 3;
        const SHARE = 1 << 4;

        const ALL = Self::READ.bits()
            | Self::UPDATE.bits()
            | Self::CREATE.bits()
            | Self::DELETE.bits()
            | Self::SHARE.bits();
    }
}

impl Permissions {
    /// Parses a comma separated list of permission names (`"read,share"`).
    ///
    /// Unknown names are ignored; `"all"` and `"*"` select every permission.
    #[must_use]
    pub fn from_names(names: &str) -> Self {
        names.split(',').map(str::trim).map(Self::from).fold(Self::empty(), |acc, p| acc | p)
    }
}

impl From<&str> for Permissions {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "read" => Self::READ,
            "update" | "write" => Self::UPDATE,
            "create" => Self::CREATE,
            "delete" => Self::DELETE,
            "share" => Self::SHARE,
            "all" | "*" => Self::ALL,
            _ => Self::empty(),
        }
    }
}

impl From<u32> for Permissions {
    fn from(bits: u32) -> Self {
        Self::from_bits_truncate(bits)
    }
}

impl Serialize for Permissions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}
