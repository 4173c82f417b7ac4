//! Domain entities decoded from the document store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use super::error::DomainError;

/// Collection holding user profiles.
pub const USERS_COLLECTION: &str = "users";
/// Collection holding blog posts.
pub const BLOGS_COLLECTION: &str = "blogs";

const UNKNOWN_FIRST_NAME: &str = "Unknown";
const UNKNOWN_LAST_NAME: &str = "User";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUser {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    email: Option<String>,
    #[serde(rename = "photoURL")]
    photo_url: Option<String>,
    bio: Option<String>,
}

impl User {
    /// Placeholder used when an author cannot be resolved.
    pub fn unknown(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            first_name: UNKNOWN_FIRST_NAME.to_string(),
            last_name: UNKNOWN_LAST_NAME.to_string(),
            email: None,
            photo_url: None,
            bio: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.first_name == UNKNOWN_FIRST_NAME
            && self.last_name == UNKNOWN_LAST_NAME
            && self.email.is_none()
    }

    pub fn display_name(&self) -> String {
        match (self.first_name.trim(), self.last_name.trim()) {
            ("", "") => UNKNOWN_FIRST_NAME.to_string(),
            (first, "") => first.to_string(),
            ("", last) => last.to_string(),
            (first, last) => format!("{first} {last}"),
        }
    }

    pub fn from_document(id: &str, data: Value) -> Result<Self, DomainError> {
        let stored: StoredUser = serde_json::from_value(data)
            .map_err(|err| DomainError::decode("user", id, err.to_string()))?;
        Ok(Self {
            id: id.to_string(),
            first_name: stored.first_name,
            last_name: stored.last_name,
            email: stored.email,
            photo_url: stored.photo_url,
            bio: stored.bio,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Author joined in by listing queries; absent for single-document reads.
    pub author: Option<User>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPost {
    user_id: String,
    title: String,
    #[serde(default)]
    content: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl BlogPost {
    /// Placeholder used when a referenced post cannot be resolved.
    pub fn missing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: String::new(),
            title: String::new(),
            content: String::new(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            author: None,
        }
    }

    pub fn from_document(id: &str, data: Value) -> Result<Self, DomainError> {
        let stored: StoredPost = serde_json::from_value(data)
            .map_err(|err| DomainError::decode("blog post", id, err.to_string()))?;
        Ok(Self {
            id: id.to_string(),
            user_id: stored.user_id,
            title: stored.title,
            content: stored.content,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            author: None,
        })
    }

    pub fn with_author(mut self, author: User) -> Self {
        self.author = Some(author);
        self
    }
}

/// Input for creating a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: String,
    pub title: String,
    pub content: String,
}

impl NewPost {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let post = Self {
            user_id: user_id.into(),
            title: title.into(),
            content: content.into(),
        };
        if post.user_id.trim().is_empty() {
            return Err(DomainError::validation("post author must not be empty"));
        }
        if post.title.trim().is_empty() {
            return Err(DomainError::validation("post title must not be empty"));
        }
        Ok(post)
    }

    pub fn to_document(&self, now: OffsetDateTime) -> Value {
        let mut doc = Map::new();
        doc.insert("userId".into(), Value::from(self.user_id.as_str()));
        doc.insert("title".into(), Value::from(self.title.as_str()));
        doc.insert("content".into(), Value::from(self.content.as_str()));
        doc.insert("createdAt".into(), timestamp_value(now));
        doc.insert("updatedAt".into(), timestamp_value(now));
        Value::Object(doc)
    }
}

/// Partial update for an existing post.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl PostPatch {
    pub fn to_document(&self, now: OffsetDateTime) -> Value {
        let mut doc = Map::new();
        if let Some(title) = &self.title {
            doc.insert("title".into(), Value::from(title.as_str()));
        }
        if let Some(content) = &self.content {
            doc.insert("content".into(), Value::from(content.as_str()));
        }
        doc.insert("updatedAt".into(), timestamp_value(now));
        Value::Object(doc)
    }
}

/// Partial update for a user profile.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.photo_url.is_none()
            && self.bio.is_none()
    }

    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        let fields = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("photoURL", &self.photo_url),
            ("bio", &self.bio),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                doc.insert(name.into(), Value::from(value.as_str()));
            }
        }
        Value::Object(doc)
    }
}

/// An author together with everything they have published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorView {
    pub author: User,
    pub posts: Vec<BlogPost>,
}

/// One page of the public feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedPage {
    pub posts: Vec<BlogPost>,
    pub has_more: bool,
}

fn timestamp_value(at: OffsetDateTime) -> Value {
    at.format(&time::format_description::well_known::Rfc3339)
        .map(Value::from)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn decodes_stored_user() {
        let user = User::from_document(
            "u1",
            json!({
                "firstName": "Ada",
                "lastName": "Lovelace",
                "email": "ada@example.com",
                "photoURL": "https://img.example/ada.png"
            }),
        )
        .expect("decoded user");

        assert_eq!(user.id, "u1");
        assert_eq!(user.display_name(), "Ada Lovelace");
        assert_eq!(user.photo_url.as_deref(), Some("https://img.example/ada.png"));
        assert!(user.bio.is_none());
    }

    #[test]
    fn unknown_user_placeholder() {
        let user = User::unknown("ghost");
        assert!(user.is_unknown());
        assert_eq!(user.display_name(), "Unknown User");
    }

    #[test]
    fn post_document_shape_decodes_back() {
        let now = datetime!(2024-05-01 12:00 UTC);
        let draft = NewPost::new("u1", "Hello", "World").expect("valid post");
        let doc = draft.to_document(now);

        assert_eq!(doc["userId"], "u1");
        assert_eq!(doc["createdAt"], "2024-05-01T12:00:00Z");

        let post = BlogPost::from_document("p1", doc).expect("decoded post");
        assert_eq!(post.title, "Hello");
        assert_eq!(post.created_at, now);
        assert!(post.author.is_none());
    }

    #[test]
    fn malformed_post_reports_decode_error() {
        let err = BlogPost::from_document("p1", json!({ "title": 42 })).expect_err("invalid");
        assert!(matches!(err, DomainError::Decode { entity: "blog post", .. }));
    }

    #[test]
    fn new_post_requires_title() {
        let err = NewPost::new("u1", "   ", "body").expect_err("blank title rejected");
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn patches_only_carry_set_fields() {
        let patch = ProfilePatch {
            bio: Some("writer".into()),
            ..Default::default()
        };
        let doc = patch.to_document();
        assert_eq!(doc, json!({ "bio": "writer" }));
        assert!(ProfilePatch::default().is_empty());

        let now = datetime!(2024-05-02 08:30 UTC);
        let doc = PostPatch {
            title: Some("New".into()),
            content: None,
        }
        .to_document(now);
        assert_eq!(doc["title"], "New");
        assert!(doc.get("content").is_none());
        assert_eq!(doc["updatedAt"], "2024-05-02T08:30:00Z");
    }
}
