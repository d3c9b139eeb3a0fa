//! Archive metadata module
//!
//! The metadata bag carries every fact the scorer may use to pick the copy
//! worth keeping inside a class of equal duplicates.

/// Tag marking an uncensored release
pub const DECENSORED_TAG: &str = "uncensored";

/// Tag marking a low-quality translation
pub const ROUGH_TRANSLATION_TAG: &str = "rough translation";

/// Tags marking poor grammar in a translation
pub const POOR_GRAMMAR_TAGS: [&str; 2] = ["poor grammar", "rough grammar"];

/// Language of an archive, derived from its `language:*` tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Language {
    /// `language:english`
    English,
    /// `language:japanese`
    Japanese,
    /// `language:chinese`
    Chinese,
    /// Translated, but not into a recognised language
    Other,
    /// No language tag at all
    NoTranslate,
}

impl Language {
    /// All languages, in declaration order
    pub const ALL: [Language; 5] = [
        Language::English,
        Language::Japanese,
        Language::Chinese,
        Language::Other,
        Language::NoTranslate,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Japanese => "japanese",
            Language::Chinese => "chinese",
            Language::Other => "other",
            Language::NoTranslate => "no_translate",
        }
    }
}

/// Metadata bag for one archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveMetadata {
    /// Archive size in bytes
    pub file_size: u64,

    /// Tags, either `namespace:value` or bare
    pub tags: Vec<String>,

    /// Upload time, unix seconds
    pub upload_time: u64,

    /// Favorite count reported by the upstream gallery
    pub favorites: u64,

    /// Pages the reader has already read
    pub reading_progress: u32,

    /// Whether the archive is pinned in a static category
    pub in_static_category: bool,

    /// Numeric id of the upstream gallery (higher is more recent)
    pub source_id: Option<u64>,
}

impl ArchiveMetadata {
    /// Number of tags
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Case-insensitive tag lookup, matching either the full tag or its value
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_domain::ArchiveMetadata;
    ///
    /// let meta = ArchiveMetadata {
    ///     tags: vec!["other:Uncensored".to_string()],
    ///     ..Default::default()
    /// };
    /// assert!(meta.has_tag("uncensored"));
    /// assert!(meta.has_tag("other:uncensored"));
    /// assert!(!meta.has_tag("rough translation"));
    /// ```
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| {
            let t = t.trim();
            if t.eq_ignore_ascii_case(tag) {
                return true;
            }
            match t.split_once(':') {
                Some((_, value)) => value.trim().eq_ignore_ascii_case(tag),
                None => false,
            }
        })
    }

    /// Whether the archive carries the decensored tag
    pub fn is_decensored(&self) -> bool {
        self.has_tag(DECENSORED_TAG)
    }

    /// Whether the archive is free of the rough translation tag
    pub fn has_clean_translation(&self) -> bool {
        !self.has_tag(ROUGH_TRANSLATION_TAG)
    }

    /// Whether the archive is free of every poor grammar tag
    pub fn has_clean_grammar(&self) -> bool {
        !POOR_GRAMMAR_TAGS.iter().any(|t| self.has_tag(t))
    }

    /// Derive the archive language from its tags
    ///
    /// English wins over Chinese, Chinese over Japanese; `language:translated`
    /// alone maps to [`Language::Other`].
    pub fn language(&self) -> Language {
        let mut english = false;
        let mut chinese = false;
        let mut japanese = false;
        let mut translated = false;

        for tag in &self.tags {
            match tag.trim().to_ascii_lowercase().as_str() {
                "language:english" => english = true,
                "language:chinese" => chinese = true,
                "language:japanese" => japanese = true,
                "language:translated" => translated = true,
                _ => {}
            }
        }

        if english {
            Language::English
        } else if chinese {
            Language::Chinese
        } else if japanese {
            Language::Japanese
        } else if translated {
            Language::Other
        } else {
            Language::NoTranslate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_tags(tags: &[&str]) -> ArchiveMetadata {
        ArchiveMetadata {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_language_precedence() {
        assert_eq!(with_tags(&["language:japanese", "language:english"]).language(), Language::English);
        assert_eq!(with_tags(&["language:japanese", "language:chinese"]).language(), Language::Chinese);
        assert_eq!(with_tags(&["language:japanese"]).language(), Language::Japanese);
        assert_eq!(with_tags(&["language:translated"]).language(), Language::Other);
        assert_eq!(with_tags(&["artist:someone"]).language(), Language::NoTranslate);
    }

    #[test]
    fn test_language_is_case_insensitive() {
        assert_eq!(with_tags(&["Language:English"]).language(), Language::English);
    }

    #[test]
    fn test_quality_flags() {
        let clean = with_tags(&["other:uncensored"]);
        assert!(clean.is_decensored());
        assert!(clean.has_clean_translation());
        assert!(clean.has_clean_grammar());

        let rough = with_tags(&["rough translation", "other:poor grammar"]);
        assert!(!rough.is_decensored());
        assert!(!rough.has_clean_translation());
        assert!(!rough.has_clean_grammar());
    }

    #[test]
    fn test_tag_count() {
        assert_eq!(with_tags(&["a", "b", "c"]).tag_count(), 3);
        assert_eq!(ArchiveMetadata::default().tag_count(), 0);
    }
}
