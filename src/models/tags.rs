//! Faculty tags and tag-array validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Faculty categories an entry can be tagged with.
///
/// Wire format for incoming tag arrays is the integer index (0 to
/// [`FacultyTag::MAX_INDEX`] inclusive); stored records use the variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FacultyTag {
    Arts,
    Business,
    CreativeArts,
    Education,
    Engineering,
    Law,
    MedicalHealthSciences,
    Science,
    Statistics,
}

impl FacultyTag {
    /// Highest valid tag index.
    pub const MAX_INDEX: i64 = 8;

    /// All tags in index order.
    pub const ALL: [FacultyTag; 9] = [
        FacultyTag::Arts,
        FacultyTag::Business,
        FacultyTag::CreativeArts,
        FacultyTag::Education,
        FacultyTag::Engineering,
        FacultyTag::Law,
        FacultyTag::MedicalHealthSciences,
        FacultyTag::Science,
        FacultyTag::Statistics,
    ];

    /// Convert an integer index to a tag, if it lies in the valid range.
    pub fn from_index(value: i64) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// The integer index of this tag.
    pub fn index(self) -> i64 {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0) as i64
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FacultyTag::Arts => "Arts",
            FacultyTag::Business => "Business",
            FacultyTag::CreativeArts => "CreativeArts",
            FacultyTag::Education => "Education",
            FacultyTag::Engineering => "Engineering",
            FacultyTag::Law => "Law",
            FacultyTag::MedicalHealthSciences => "MedicalHealthSciences",
            FacultyTag::Science => "Science",
            FacultyTag::Statistics => "Statistics",
        }
    }
}

impl std::fmt::Display for FacultyTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single invalid element in a submitted tag array.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("tag at index {index} is not in the valid range (0 to {max} inclusive)", max = FacultyTag::MAX_INDEX)]
    OutOfRange { index: usize, value: i64 },
    #[error("tag at index {index} ({tag}) is included twice")]
    Duplicate { index: usize, tag: FacultyTag },
}

/// Validates an integer tag array from a request.
///
/// Returns the typed tags in submission order, or one error per offending
/// index. An empty array is valid.
pub fn validate_tags(tags: &[i64]) -> Result<Vec<FacultyTag>, Vec<TagError>> {
    let mut output = Vec::with_capacity(tags.len());
    let mut errors = Vec::new();

    for (index, &value) in tags.iter().enumerate() {
        let Some(tag) = FacultyTag::from_index(value) else {
            errors.push(TagError::OutOfRange { index, value });
            continue;
        };
        if output.contains(&tag) {
            errors.push(TagError::Duplicate { index, tag });
            continue;
        }
        output.push(tag);
    }

    if errors.is_empty() {
        Ok(output)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_array_is_valid() {
        assert_eq!(validate_tags(&[]), Ok(Vec::new()));
    }

    #[test]
    fn test_distinct_in_range_tags_are_valid() {
        let tags = validate_tags(&[0, 8, 3]).unwrap();
        assert_eq!(
            tags,
            vec![
                FacultyTag::Arts,
                FacultyTag::Statistics,
                FacultyTag::Education
            ]
        );
    }

    #[test]
    fn test_out_of_range_tags_report_each_index() {
        let errors = validate_tags(&[9, 0, -1]).unwrap_err();
        assert_eq!(
            errors,
            vec![
                TagError::OutOfRange { index: 0, value: 9 },
                TagError::OutOfRange { index: 2, value: -1 },
            ]
        );
    }

    #[test]
    fn test_duplicate_tags_report_each_index() {
        let errors = validate_tags(&[2, 2, 5, 2]).unwrap_err();
        assert_eq!(
            errors,
            vec![
                TagError::Duplicate {
                    index: 1,
                    tag: FacultyTag::CreativeArts
                },
                TagError::Duplicate {
                    index: 3,
                    tag: FacultyTag::CreativeArts
                },
            ]
        );
    }

    #[test]
    fn test_mixed_errors_produce_one_message_per_index() {
        let errors = validate_tags(&[1, 99, 1]).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("index 1"));
        assert!(errors[1].to_string().contains("included twice"));
    }
}
