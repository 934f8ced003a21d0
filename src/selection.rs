use crate::api::ImageRecord;

/// One comparison slot: either the built-in placeholder or a photo from the
/// accumulated gallery list.
#[derive(Debug, Clone)]
pub enum ImageRef {
    Placeholder,
    Photo(ImageRecord),
}

impl ImageRef {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, ImageRef::Placeholder)
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            ImageRef::Placeholder => None,
            ImageRef::Photo(record) => Some(&record.id),
        }
    }

    pub fn record(&self) -> Option<&ImageRecord> {
        match self {
            ImageRef::Placeholder => None,
            ImageRef::Photo(record) => Some(record),
        }
    }
}

/// The two photos under comparison.
///
/// Selection policy: a photo already occupying either slot is a no-op; the
/// `after` slot is filled first while it still holds the placeholder; after
/// that every selection overwrites `before`. Kept literally from the observed
/// product behavior, quirky as the overwrite rule is.
#[derive(Debug, Clone)]
pub struct SelectionPair {
    pub before: ImageRef,
    pub after: ImageRef,
}

impl Default for SelectionPair {
    fn default() -> Self {
        Self {
            before: ImageRef::Placeholder,
            after: ImageRef::Placeholder,
        }
    }
}

impl SelectionPair {
    pub fn select(&mut self, record: &ImageRecord) {
        if self.before.id() == Some(record.id.as_str())
            || self.after.id() == Some(record.id.as_str())
        {
            return;
        }
        if self.after.is_placeholder() {
            self.after = ImageRef::Photo(record.clone());
        } else {
            self.before = ImageRef::Photo(record.clone());
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.before.id() == Some(id) || self.after.id() == Some(id)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
