//! Validation functions
//!
//! Local checks run before any request is sent. A failed check never touches
//! local state or the network.

use snafu::prelude::*;

use crate::{
    Result,
    config::{
        VALIDATION_BODY_MAX_LEN, VALIDATION_ID_MAX_LEN, VALIDATION_LIST_MAX_COUNT,
        VALIDATION_TEXT_MAX_LEN, VALIDATION_TITLE_MAX_LEN,
    },
    error::ValidationSnafu,
};

/// Validation limits for sanity checking records before they are sent.
/// Too-strict limits reject legitimate content, so the defaults are loose.
/// All limits can be adjusted at client creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationLimits {
    /// max length of a title or name, in bytes
    pub title_max_len: u64,

    /// max length of free text (descriptions, bio), in bytes
    pub text_max_len: u64,

    /// max number of entries in a list field (technologies, skills, links)
    pub list_max_count: u64,

    /// max size of a serialized request body, in bytes
    pub body_max_len: u64,

    /// max length of a record id
    pub id_max_len: u64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        ValidationLimits {
            // default: 512 bytes
            title_max_len: VALIDATION_TITLE_MAX_LEN,
            // default: 64 KiB
            text_max_len: VALIDATION_TEXT_MAX_LEN,
            // default: 512 entries
            list_max_count: VALIDATION_LIST_MAX_COUNT,
            // default: 4 MiB
            body_max_len: VALIDATION_BODY_MAX_LEN,
            // default: 200 bytes
            id_max_len: VALIDATION_ID_MAX_LEN,
        }
    }
}

impl ValidationLimits {
    /// Checks a record id: not empty, no path separators, and not too long
    pub fn validate_id(&self, id: &str, description: &str) -> Result<()> {
        ensure!(
            !id.trim().is_empty(),
            ValidationSnafu {
                message: format!("{description} id cannot be empty"),
            }
        );
        ensure!(
            !id.contains(['/', '?', '#']),
            ValidationSnafu {
                message: format!("{description} id contains invalid characters: {id:?}"),
            }
        );
        ensure!(
            id.len() <= self.id_max_len as usize,
            ValidationSnafu {
                message: format!(
                    "{description} id too long: {} bytes (max: {})",
                    id.len(),
                    self.id_max_len
                ),
            }
        );
        Ok(())
    }

    /// Checks a required title or name
    pub fn validate_title(&self, title: &str, description: &str) -> Result<()> {
        ensure!(
            !title.trim().is_empty(),
            ValidationSnafu {
                message: format!("{description} cannot be empty"),
            }
        );
        ensure!(
            title.len() <= self.title_max_len as usize,
            ValidationSnafu {
                message: format!(
                    "{description} too long: {} bytes (max: {})",
                    title.len(),
                    self.title_max_len
                ),
            }
        );
        Ok(())
    }

    pub fn validate_text(&self, text: &str, description: &str) -> Result<()> {
        ensure!(
            text.len() <= self.text_max_len as usize,
            ValidationSnafu {
                message: format!(
                    "{description} too long: {} bytes (max: {})",
                    text.len(),
                    self.text_max_len
                ),
            }
        );
        Ok(())
    }

    /// Checks the entry count of a list field, and the length of each entry
    pub fn validate_list(&self, items: &[String], description: &str) -> Result<()> {
        ensure!(
            items.len() <= self.list_max_count as usize,
            ValidationSnafu {
                message: format!(
                    "too many {description}: {} (max: {})",
                    items.len(),
                    self.list_max_count
                ),
            }
        );
        if let Some(item) = items
            .iter()
            .find(|item| item.len() > self.title_max_len as usize)
        {
            return ValidationSnafu {
                message: format!(
                    "{description} entry too long: {} bytes (max: {})",
                    item.len(),
                    self.title_max_len
                ),
            }
            .fail();
        }
        Ok(())
    }

    /// Rejects an edit that empties a required list which previously had entries
    pub fn validate_required_list(
        &self,
        before: &[String],
        after: &[String],
        description: &str,
    ) -> Result<()> {
        let remaining = after.iter().filter(|item| !item.trim().is_empty()).count();
        ensure!(
            before.is_empty() || remaining > 0,
            ValidationSnafu {
                message: format!("cannot remove the last of the {description}"),
            }
        );
        Ok(())
    }

    pub fn validate_body(&self, bytes: &bytes::Bytes, description: &str) -> Result<()> {
        ensure!(
            bytes.len() <= self.body_max_len as usize,
            ValidationSnafu {
                message: format!(
                    "{description} body too long: {} bytes (max: {})",
                    bytes.len(),
                    self.body_max_len
                ),
            }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FolioError;

    fn message(err: FolioError) -> String {
        match err {
            FolioError::Validation { message } => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn titles_must_be_present_and_bounded() {
        let limits = ValidationLimits::default();
        assert!(limits.validate_title("Folio", "project title").is_ok());
        let err = limits.validate_title("  ", "project title").expect_err("blank");
        assert_eq!(message(err), "project title cannot be empty");
        let long = "x".repeat(limits.title_max_len as usize + 1);
        assert!(limits.validate_title(&long, "project title").is_err());
    }

    #[test]
    fn ids_reject_path_characters() {
        let limits = ValidationLimits::default();
        assert!(limits.validate_id("p-1", "project").is_ok());
        assert!(limits.validate_id("../p1", "project").is_err());
        assert!(limits.validate_id("", "project").is_err());
    }

    #[test]
    fn required_list_keeps_last_entry() {
        let limits = ValidationLimits::default();
        let before = vec!["Rust".to_string()];
        let err = limits
            .validate_required_list(&before, &[], "project technologies")
            .expect_err("emptied");
        assert_eq!(message(err), "cannot remove the last of the project technologies");
        assert!(limits.validate_required_list(&[], &[], "project technologies").is_ok());
        assert!(
            limits
                .validate_required_list(&before, &["Go".to_string()], "project technologies")
                .is_ok()
        );
    }

    #[test]
    fn list_limits() {
        let limits = ValidationLimits {
            list_max_count: 2,
            ..Default::default()
        };
        let items: Vec<String> = ["a", "b", "c"].iter().map(ToString::to_string).collect();
        assert!(limits.validate_list(&items[..2], "technologies").is_ok());
        assert!(limits.validate_list(&items, "technologies").is_err());
    }

    #[test]
    fn body_size() {
        let limits = ValidationLimits {
            body_max_len: 4,
            ..Default::default()
        };
        assert!(limits.validate_body(&bytes::Bytes::from_static(b"1234"), "update").is_ok());
        assert!(limits.validate_body(&bytes::Bytes::from_static(b"12345"), "update").is_err());
    }
}
