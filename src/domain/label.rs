use std::{fmt, ops::Deref};

use non_empty_string::NonEmptyString;
use serde::{Serialize, Serializer};

/// A normalised anchor label.
///
/// Labels are lowercase. Every run of whitespace or punctuation is collapsed
/// to a single hyphen, and leading or trailing hyphens are removed. Explicit
/// anchors, section titles and role targets all go through the same
/// normalisation, so `Geospatial Indexes`, `geospatial_indexes` and
/// `geospatial-indexes` are the same label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Label(NonEmptyString);

impl Label {
    /// Normalises `text` into a label.
    ///
    /// Returns `None` if nothing alphanumeric is left after normalisation.
    ///
    /// # Examples
    ///
    /// ```
    /// use docref::Label;
    ///
    /// let label = Label::normalize("Query for Locations that Intersect a GeoJSON Object").unwrap();
    /// assert_eq!(label.as_str(), "query-for-locations-that-intersect-a-geojson-object");
    ///
    /// assert!(Label::normalize("---").is_none());
    /// ```
    #[must_use]
    pub fn normalize(text: &str) -> Option<Self> {
        let mut normalized = String::with_capacity(text.len());
        let mut pending_separator = false;

        for c in text.chars() {
            if c.is_alphanumeric() {
                if pending_separator && !normalized.is_empty() {
                    normalized.push('-');
                }
                pending_separator = false;
                normalized.extend(c.to_lowercase());
            } else {
                pending_separator = true;
            }
        }

        NonEmptyString::new(normalized).ok().map(Self)
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for Label {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
