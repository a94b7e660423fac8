use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub title: String,
    pub role: String,
    pub description: String,
    #[serde(default)]
    pub links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    pub name: String,
    pub role: String,
    pub description: String,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct University {
    pub name: String,
    #[serde(default)]
    pub verified: bool,
}

/// A candidate surfaced by the assistant.
///
/// Everything except `receives_left` is frozen once the profile lands in a
/// card stack; the counter mirrors the quota ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    pub age: Option<u8>,
    pub location: String,
    pub avatar: String,
    pub bio: String,
    pub one_liner: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub hobbies: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub institutions: Vec<Institution>,
    pub university: Option<University>,
    pub match_score: u8,
    #[serde(default)]
    pub why_match: String,
    pub receives_left: u32,
}

impl Profile {
    /// Lowercased text the intent rules search through.
    pub fn searchable_text(&self) -> String {
        let mut text = String::new();
        for part in [&self.bio, &self.one_liner] {
            text.push_str(part);
            text.push(' ');
        }
        for list in [&self.skills, &self.resources] {
            for item in list {
                text.push_str(item);
                text.push(' ');
            }
        }
        for project in &self.projects {
            text.push_str(&project.title);
            text.push(' ');
            text.push_str(&project.role);
            text.push(' ');
            text.push_str(&project.description);
            text.push(' ');
        }
        for institution in &self.institutions {
            text.push_str(&institution.role);
            text.push(' ');
            text.push_str(&institution.description);
            text.push(' ');
        }
        text.to_lowercase()
    }

    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(skill))
    }

    pub fn quote(&self) -> QuotedContact {
        QuotedContact {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Snapshot of the acting user's own profile, read-only to the core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedContact {
    pub id: ProfileId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub profile: Profile,
    pub requested_at: DateTime<Utc>,
    pub message: Option<String>,
    pub wechat_id: Option<String>,
}

impl FriendRequest {
    pub fn id(&self) -> &ProfileId {
        &self.profile.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactedUser {
    pub profile: Profile,
    pub contacted_at: DateTime<Utc>,
    pub message: Option<String>,
    pub wechat_id: Option<String>,
    #[serde(default)]
    pub gifted_receives: u32,
    #[serde(default)]
    pub reported: bool,
    pub report_reason: Option<String>,
}

impl ContactedUser {
    pub fn new(profile: Profile, message: Option<String>, wechat_id: Option<String>) -> Self {
        Self {
            profile,
            contacted_at: Utc::now(),
            message,
            wechat_id,
            gifted_receives: 0,
            reported: false,
            report_reason: None,
        }
    }

    pub fn id(&self) -> &ProfileId {
        &self.profile.id
    }
}
