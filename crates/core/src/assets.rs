//! Asset URL materialization.
//!
//! Assets land in an `output` folder and move into `vault/<user_filename>`
//! once the user gives them a custom name elsewhere in the studio.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::generation::GeneratedAsset;
use crate::types::{AssetId, TaskId};

pub const OUTPUT_FOLDER: &str = "output";
pub const VAULT_FOLDER: &str = "vault";

/// Folder segment for an asset, given its (optional) user filename.
///
/// ```
/// use nymia_core::assets::asset_folder;
///
/// assert_eq!(asset_folder(None), "output");
/// assert_eq!(asset_folder(Some("")), "output");
/// assert_eq!(asset_folder(Some("beach set")), "vault/beach set");
/// ```
pub fn asset_folder(user_filename: Option<&str>) -> String {
    match user_filename {
        Some(name) if !name.is_empty() => format!("{VAULT_FOLDER}/{name}"),
        _ => OUTPUT_FOLDER.to_string(),
    }
}

/// `<base>/<owner>/<folder>/<system_filename>`.
pub fn asset_url(
    base_url: &str,
    owner: &str,
    user_filename: Option<&str>,
    system_filename: &str,
) -> String {
    format!(
        "{}/{}/{}/{}",
        base_url.trim_end_matches('/'),
        owner,
        asset_folder(user_filename),
        system_filename
    )
}

/// A completed asset with its fetchable URL resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializedAsset {
    pub task_id: TaskId,
    pub asset_id: Option<AssetId>,
    pub url: String,
    pub system_filename: String,
    pub user_filename: Option<String>,
    pub file_path: Option<String>,
}

/// Resolve the display/download URL for a completed row.
///
/// Fails when the row has no system filename; callers only materialize
/// rows that passed [`classify_poll`](crate::generation::classify_poll).
pub fn materialize(
    task_id: &TaskId,
    asset: &GeneratedAsset,
    base_url: &str,
    owner: &str,
) -> Result<MaterializedAsset, CoreError> {
    let system_filename = asset.system_filename().ok_or_else(|| {
        CoreError::InvalidState(format!("asset for task {task_id} has no system filename"))
    })?;

    Ok(MaterializedAsset {
        task_id: task_id.clone(),
        asset_id: asset.id.clone(),
        url: asset_url(
            base_url,
            owner,
            asset.user_filename.as_deref(),
            system_filename,
        ),
        system_filename: system_filename.to_string(),
        user_filename: asset.user_filename.clone().filter(|s| !s.is_empty()),
        file_path: asset.file_path.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_row(user_filename: Option<&str>) -> GeneratedAsset {
        serde_json::from_value(serde_json::json!({
            "id": 7,
            "task_id": "42",
            "generation_status": "completed",
            "system_filename": "r42.png",
            "user_filename": user_filename,
            "file_path": "u1/output/r42.png",
        }))
        .unwrap()
    }

    #[test]
    fn null_user_filename_goes_to_output() {
        let asset = materialize(&TaskId::new("42"), &completed_row(None), "https://cdn.test", "u1")
            .unwrap();
        assert_eq!(asset.url, "https://cdn.test/u1/output/r42.png");
        assert!(asset.user_filename.is_none());
    }

    #[test]
    fn empty_user_filename_goes_to_output() {
        let asset = materialize(
            &TaskId::new("42"),
            &completed_row(Some("")),
            "https://cdn.test/",
            "u1",
        )
        .unwrap();
        assert_eq!(asset.url, "https://cdn.test/u1/output/r42.png");
    }

    #[test]
    fn named_asset_goes_to_vault() {
        let asset = materialize(
            &TaskId::new("42"),
            &completed_row(Some("summer")),
            "https://cdn.test",
            "u1",
        )
        .unwrap();
        assert_eq!(asset.url, "https://cdn.test/u1/vault/summer/r42.png");
        assert_eq!(asset.user_filename.as_deref(), Some("summer"));
        assert_eq!(asset.asset_id, Some(AssetId::new("7")));
    }

    #[test]
    fn folder_rule_holds_for_arbitrary_names() {
        for name in ["a", "output", "vault", "x y z", "über"] {
            assert_eq!(asset_folder(Some(name)), format!("vault/{name}"));
        }
    }

    #[test]
    fn missing_filename_cannot_be_materialized() {
        let mut row = completed_row(None);
        row.system_filename = None;
        assert!(materialize(&TaskId::new("42"), &row, "https://cdn.test", "u1").is_err());
    }
}
