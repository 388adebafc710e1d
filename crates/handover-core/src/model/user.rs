// ── Users and profiles ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

use super::ids::UserId;

const AVATAR_SERVICE: &str = "https://ui-avatars.com/api/";

/// What an account registers as.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Role {
    #[default]
    Donor,
    Beneficiary,
}

/// The signed-in user, as held by the client state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    /// From the sign-up metadata; accounts made elsewhere may lack it.
    pub role: Option<Role>,
}

impl From<handover_api::AuthUser> for SessionUser {
    fn from(user: handover_api::AuthUser) -> Self {
        let meta = |key: &str| {
            user.user_metadata
                .get(key)
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        Self {
            full_name: meta("full_name"),
            avatar_url: meta("avatar_url"),
            role: meta("role").and_then(|r| r.parse().ok()),
            id: UserId::from(user.id),
            email: user.email,
        }
    }
}

/// The `profiles` row written when an account registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProfile {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub biography: String,
    pub city: String,
    pub visibility: bool,
    pub avatar_url: String,
}

impl NewProfile {
    /// Username is the email's local part; the avatar is generated from
    /// the name.
    pub fn new(id: UserId, email: &str, full_name: Option<&str>, role: Role) -> Self {
        let username = email.split('@').next().unwrap_or_default().to_owned();
        let full_name = full_name.map(str::trim).unwrap_or_default().to_owned();
        let shown = if full_name.is_empty() { &username } else { &full_name };
        let avatar_url = Url::parse_with_params(
            AVATAR_SERVICE,
            &[("name", shown.as_str()), ("background", "random")],
        )
        .map(String::from)
        .unwrap_or_default();

        Self {
            id,
            username,
            full_name,
            role,
            biography: String::new(),
            city: String::new(),
            visibility: true,
            avatar_url,
        }
    }
}

/// Public profile row (`profiles` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Profile {
    pub const COLUMNS: &'static str = "id,full_name,avatar_url";

    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or("Anonymous donor")
    }
}

/// Who wrote a review, embedded through the `reviewer_id` foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A review left for a donor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, rename = "profiles")]
    pub reviewer: Option<Reviewer>,
}

impl Review {
    /// Column list with the reviewer embedded under `profiles`.
    pub const COLUMNS: &'static str =
        "id,rating,comment,created_at,profiles!reviewer_id(full_name,avatar_url)";
}

/// Mean rating over `reviews`, or 0 when there are none.
pub fn mean_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let sum: f64 = reviews.iter().map(|r| f64::from(r.rating)).sum();
    let count = u32::try_from(reviews.len()).map_or(f64::from(u32::MAX), f64::from);
    sum / count
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_user_reads_metadata() {
        let auth: handover_api::AuthUser = serde_json::from_value(json!({
            "id": "u1",
            "email": "donor@example.org",
            "user_metadata": { "avatar_url": "https://img.example.org/a.png", "full_name": "" }
        }))
        .unwrap();

        let user = SessionUser::from(auth);
        assert_eq!(user.id, UserId::from("u1"));
        assert_eq!(user.avatar_url.as_deref(), Some("https://img.example.org/a.png"));
        assert_eq!(user.full_name, None);
        assert_eq!(user.role, None);
    }

    #[test]
    fn session_user_carries_the_registered_role() {
        let auth: handover_api::AuthUser = serde_json::from_value(json!({
            "id": "u2",
            "user_metadata": { "full_name": "Ben", "role": "BENEFICIARY" }
        }))
        .unwrap();
        assert_eq!(SessionUser::from(auth).role, Some(Role::Beneficiary));
    }

    #[test]
    fn new_profile_row() {
        let row = NewProfile::new(
            UserId::from("u1"),
            "dana.lee@example.org",
            Some(" Dana Lee "),
            Role::Donor,
        );
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({
                "id": "u1",
                "username": "dana.lee",
                "full_name": "Dana Lee",
                "role": "DONOR",
                "biography": "",
                "city": "",
                "visibility": true,
                "avatar_url": "https://ui-avatars.com/api/?name=Dana+Lee&background=random"
            })
        );

        let nameless = NewProfile::new(UserId::from("u2"), "sam@example.org", None, Role::Beneficiary);
        assert_eq!(nameless.full_name, "");
        assert!(nameless.avatar_url.ends_with("?name=sam&background=random"));
    }

    #[test]
    fn mean_rating_of_nothing_is_zero() {
        assert!(mean_rating(&[]).abs() < f64::EPSILON);
    }

    #[test]
    fn review_embeds_reviewer() {
        let reviews: Vec<Review> = serde_json::from_value(json!([
            { "id": "r1", "rating": 5, "comment": "Great", "created_at": "2026-01-02T00:00:00Z",
              "profiles": { "full_name": "Sam", "avatar_url": null } },
            { "id": "r2", "rating": 4, "comment": null, "created_at": "2026-01-03T00:00:00Z",
              "profiles": null }
        ]))
        .unwrap();

        assert_eq!(reviews[0].reviewer.as_ref().unwrap().full_name.as_deref(), Some("Sam"));
        assert!(reviews[1].reviewer.is_none());
        assert!((mean_rating(&reviews) - 4.5).abs() < f64::EPSILON);
    }
}
