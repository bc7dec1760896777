//! User-editable asset metadata (filename, notes, tags, rating, favorite).
//!
//! These fields are independent of generation status. The full set is
//! sent on every update so the backend row always matches the client.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::generation::GeneratedAsset;

pub const MAX_RATING: u8 = 5;
pub const MAX_NOTES_LEN: usize = 2000;
pub const MAX_TAGS: usize = 32;
pub const MAX_FILENAME_LEN: usize = 128;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub user_filename: Option<String>,
    pub user_notes: Option<String>,
    pub user_tags: Option<Vec<String>>,
    pub rating: Option<u8>,
    pub favorite: Option<bool>,
}

impl AssetMetadata {
    pub fn from_asset(asset: &GeneratedAsset) -> Self {
        Self {
            user_filename: asset.user_filename.clone(),
            user_notes: asset.user_notes.clone(),
            user_tags: asset.user_tags.clone(),
            rating: asset.rating,
            favorite: asset.favorite,
        }
    }

    pub fn apply_to(&self, asset: &mut GeneratedAsset) {
        asset.user_filename = self.user_filename.clone();
        asset.user_notes = self.user_notes.clone();
        asset.user_tags = self.user_tags.clone();
        asset.rating = self.rating;
        asset.favorite = self.favorite;
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        if let Some(name) = self.user_filename.as_deref() {
            validate_user_filename(name)?;
        }
        if let Some(notes) = self.user_notes.as_deref() {
            if notes.chars().count() > MAX_NOTES_LEN {
                return Err(CoreError::Validation(format!(
                    "Notes must be at most {MAX_NOTES_LEN} characters"
                )));
            }
        }
        if let Some(tags) = self.user_tags.as_deref() {
            if tags.len() > MAX_TAGS {
                return Err(CoreError::Validation(format!(
                    "At most {MAX_TAGS} tags are allowed, got {}",
                    tags.len()
                )));
            }
            if tags.iter().any(|t| t.trim().is_empty()) {
                return Err(CoreError::Validation("Tags must not be blank".into()));
            }
        }
        Ok(())
    }
}

pub fn validate_rating(rating: u8) -> Result<(), CoreError> {
    if rating > MAX_RATING {
        return Err(CoreError::Validation(format!(
            "Rating must be between 0 and {MAX_RATING}, got {rating}"
        )));
    }
    Ok(())
}

/// The user filename becomes a path segment under `vault/`, so it must
/// not be able to escape that folder.
pub fn validate_user_filename(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Ok(());
    }
    let safe = name.len() <= MAX_FILENAME_LEN
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control);
    if !safe {
        return Err(CoreError::Validation(format!("Invalid filename '{name}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        for r in 0..=MAX_RATING {
            assert!(validate_rating(r).is_ok());
        }
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn filename_cannot_escape_vault() {
        assert!(validate_user_filename("summer shoot").is_ok());
        assert!(validate_user_filename("").is_ok());
        assert!(validate_user_filename("..").is_err());
        assert!(validate_user_filename("a/b").is_err());
        assert!(validate_user_filename("a\\b").is_err());
        assert!(validate_user_filename("line\nbreak").is_err());
        assert!(validate_user_filename(&"x".repeat(200)).is_err());
    }

    #[test]
    fn too_many_tags_rejected() {
        let meta = AssetMetadata {
            user_tags: Some(vec!["t".to_string(); MAX_TAGS + 1]),
            ..Default::default()
        };
        assert!(meta.validate().is_err());
    }

    #[test]
    fn blank_tag_rejected() {
        let meta = AssetMetadata {
            user_tags: Some(vec!["ok".into(), "  ".into()]),
            ..Default::default()
        };
        assert!(meta.validate().is_err());
    }

    #[test]
    fn apply_and_extract_are_inverse() {
        let mut asset: GeneratedAsset = serde_json::from_value(serde_json::json!({"id": 1})).unwrap();
        let meta = AssetMetadata {
            user_filename: Some("keeper".into()),
            user_notes: Some("nice light".into()),
            user_tags: Some(vec!["beach".into()]),
            rating: Some(4),
            favorite: Some(true),
        };
        meta.apply_to(&mut asset);
        assert_eq!(AssetMetadata::from_asset(&asset), meta);
    }

    #[test]
    fn serializes_every_field_for_patch() {
        let json = serde_json::to_value(AssetMetadata::default()).unwrap();
        for key in ["user_filename", "user_notes", "user_tags", "rating", "favorite"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
