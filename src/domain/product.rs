//! Product records and drafts
//!
//! `ProductRecord` is the stored document; `ProductDraft` is the editable
//! form whose identifier is derived from the name until it is first saved.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::ValidationError;
use crate::domain::image_asset::ImageAsset;
use crate::domain::image_list::ImageListEditor;
use crate::domain::slug::{is_slug, slug};

/// A product document as stored in the catalog collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub original_price: Option<f64>,
    pub category: String,
    #[serde(default)]
    pub details: ProductDetails,
    #[serde(default)]
    pub images: Vec<ImageAsset>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Descriptive text shown on the product page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fabric: Option<String>,
    #[serde(default)]
    pub care_instructions: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ProductRecord {
    /// Check the per-record invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidRecord {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("identifier is empty"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(invalid("price must be a finite, non-negative number"));
        }
        if let Some(original) = self.original_price {
            if !original.is_finite() || original < 0.0 {
                return Err(invalid("originalPrice must be a finite, non-negative number"));
            }
        }

        let mains = self.images.iter().filter(|a| a.is_main).count();
        match (self.images.is_empty(), mains) {
            (true, 0) | (false, 1) => Ok(()),
            (true, _) => Err(invalid("main image flagged on an empty image list")),
            (false, 0) => Err(invalid("no main image")),
            (false, _) => Err(invalid("more than one main image")),
        }
    }

    pub fn main_image(&self) -> Option<&ImageAsset> {
        self.images.iter().find(|a| a.is_main)
    }
}

/// Validate a full target set: every record on its own, plus identifier uniqueness.
pub fn validate_catalog(records: &[ProductRecord]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        record.validate()?;
        if !seen.insert(record.id.as_str()) {
            return Err(ValidationError::DuplicateIdentifier(record.id.clone()));
        }
    }
    Ok(())
}

/// A product being edited before it is saved into the catalog.
///
/// The draft owns its image list; saving consumes the draft.
#[derive(Debug, Clone, Default)]
pub struct ProductDraft {
    pub id: Option<String>,
    pub name: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub category: String,
    pub details: ProductDetails,
    pub images: ImageListEditor,
    pub created_at: Option<DateTime<Utc>>,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, price: f64, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price,
            category: category.into(),
            ..Self::default()
        }
    }

    /// Reopen a persisted record for editing. The identifier is kept.
    pub fn from_record(record: ProductRecord) -> Self {
        Self {
            id: Some(record.id),
            name: record.name,
            price: record.price,
            original_price: record.original_price,
            category: record.category,
            details: record.details,
            images: record.images.into(),
            created_at: Some(record.created_at),
        }
    }

    /// Identifier the record will be saved under.
    pub fn identifier(&self) -> String {
        self.id.clone().unwrap_or_else(|| slug(&self.name))
    }

    /// Turn the draft into a record stamped with `now`.
    pub fn into_record(self, now: DateTime<Utc>) -> Result<ProductRecord, ValidationError> {
        let id = self.identifier();
        if self.id.is_none() && !is_slug(&id) {
            return Err(ValidationError::InvalidRecord {
                id,
                reason: format!("name '{}' does not produce a usable identifier", self.name),
            });
        }

        let record = ProductRecord {
            id,
            name: self.name,
            price: self.price,
            original_price: self.original_price,
            category: self.category,
            details: self.details,
            images: self.images.into_assets(),
            created_at: self.created_at.unwrap_or(now),
            updated_at: now,
        };
        record.validate()?;
        Ok(record)
    }
}
