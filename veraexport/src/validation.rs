//! Typed values for enumerated CLI parameters
use std::fmt;
use std::str::FromStr;
use veracode_reporting::VeracodeRegion;

/// Veracode region hosting the account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Region {
    #[default]
    Commercial,
    European,
    Federal,
}

impl Region {
    const ALL: [(&'static str, Self); 3] = [
        ("commercial", Self::Commercial),
        ("european", Self::European),
        ("federal", Self::Federal),
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        Self::ALL
            .iter()
            .find_map(|(name, region)| (*region == self).then_some(*name))
            .unwrap_or("commercial")
    }
}

impl FromStr for Region {
    type Err = String;

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s.trim()))
            .map(|(_, region)| *region)
            .ok_or_else(|| {
                format!(
                    "Invalid region '{}'. Valid values: {}",
                    s,
                    valid_values(&Self::ALL)
                )
            })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Region> for VeracodeRegion {
    fn from(region: Region) -> Self {
        match region {
            Region::Commercial => VeracodeRegion::Commercial,
            Region::European => VeracodeRegion::European,
            Region::Federal => VeracodeRegion::Federal,
        }
    }
}

/// Audit action filter accepted by the AUDIT report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Delete,
    Update,
    Error,
    Email,
    Success,
    Failed,
    Locked,
    Unlocked,
    LoggedOut,
    Undelete,
    MaintainSchedule,
    PermanentDelete,
    UpdateForInternalOnly,
}

impl AuditAction {
    const ALL: [(&'static str, Self); 14] = [
        ("Create", Self::Create),
        ("Delete", Self::Delete),
        ("Update", Self::Update),
        ("Error", Self::Error),
        ("Email", Self::Email),
        ("Success", Self::Success),
        ("Failed", Self::Failed),
        ("Locked", Self::Locked),
        ("Unlocked", Self::Unlocked),
        ("Logged out", Self::LoggedOut),
        ("Undelete", Self::Undelete),
        ("Maintain Schedule", Self::MaintainSchedule),
        ("Permanent Delete", Self::PermanentDelete),
        ("Update for Internal Only", Self::UpdateForInternalOnly),
    ];

    /// Value sent to the API
    #[must_use]
    pub fn as_str(self) -> &'static str {
        Self::ALL
            .iter()
            .find_map(|(name, action)| (*action == self).then_some(*name))
            .unwrap_or_default()
    }
}

impl FromStr for AuditAction {
    type Err = String;

    /// Case-sensitive, matching the API's spelling
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, action)| *action)
            .ok_or_else(|| {
                format!(
                    "Invalid audit action '{}'. Valid values: {}",
                    s,
                    valid_values(&Self::ALL)
                )
            })
    }
}

/// Action type filter accepted by the AUDIT report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    LoginAccount,
    Admin,
    Auth,
    Login,
}

impl ActionType {
    const ALL: [(&'static str, Self); 4] = [
        ("Login Account", Self::LoginAccount),
        ("Admin", Self::Admin),
        ("Auth", Self::Auth),
        ("Login", Self::Login),
    ];

    /// Value sent to the API
    #[must_use]
    pub fn as_str(self) -> &'static str {
        Self::ALL
            .iter()
            .find_map(|(name, action_type)| (*action_type == self).then_some(*name))
            .unwrap_or_default()
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, action_type)| *action_type)
            .ok_or_else(|| {
                format!(
                    "Invalid action type '{}'. Valid values: {}",
                    s,
                    valid_values(&Self::ALL)
                )
            })
    }
}

/// Help text listing, quoting values that contain spaces
fn valid_values<T>(table: &[(&str, T)]) -> String {
    table
        .iter()
        .map(|(name, _)| {
            if name.contains(' ') {
                format!("'{name}'")
            } else {
                (*name).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
