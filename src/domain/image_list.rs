//! Ordered image list for a product draft
//!
//! The editor owns the draft's asset sequence while it is being edited and
//! hands it back through [`ImageListEditor::into_assets`]. Every operation
//! keeps the main-image invariant: at most one main entry, and exactly one
//! whenever the list is non-empty.

use crate::domain::errors::ValidationError;
use crate::domain::image_asset::ImageAsset;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageListEditor {
    assets: Vec<ImageAsset>,
}

impl ImageListEditor {
    /// Take ownership of an existing sequence, normalizing its main flags.
    pub fn new(assets: Vec<ImageAsset>) -> Self {
        let mut editor = Self { assets };
        editor.keep_first_main(0);
        editor.promote_if_headless();
        editor
    }

    pub fn assets(&self) -> &[ImageAsset] {
        &self.assets
    }

    pub fn into_assets(self) -> Vec<ImageAsset> {
        self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn main_index(&self) -> Option<usize> {
        self.assets.iter().position(|a| a.is_main)
    }

    /// Add assets to the end of the list.
    ///
    /// Existing entries keep their order and flags. Incoming main flags only
    /// survive when the list has no main yet, and then only the first one.
    pub fn append(&mut self, new_assets: Vec<ImageAsset>) {
        let offset = self.assets.len();
        let had_main = self.main_index().is_some();
        self.assets.extend(new_assets);

        if had_main {
            for asset in &mut self.assets[offset..] {
                asset.is_main = false;
            }
        } else {
            self.keep_first_main(offset);
        }
        self.promote_if_headless();
    }

    /// Remove and return the asset at `index`.
    ///
    /// Removing the main asset promotes the new first entry.
    pub fn remove(&mut self, index: usize) -> Result<ImageAsset, ValidationError> {
        self.check_bounds(index)?;
        let removed = self.assets.remove(index);
        self.promote_if_headless();
        Ok(removed)
    }

    /// Make the asset at `index` the only main asset.
    pub fn set_main(&mut self, index: usize) -> Result<(), ValidationError> {
        self.check_bounds(index)?;
        for (i, asset) in self.assets.iter_mut().enumerate() {
            asset.is_main = i == index;
        }
        Ok(())
    }

    /// Move the asset at `from` to `to`, shifting the entries in between.
    ///
    /// Main-ness travels with the asset, not the slot.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), ValidationError> {
        self.check_bounds(from)?;
        self.check_bounds(to)?;
        if from != to {
            let asset = self.assets.remove(from);
            self.assets.insert(to, asset);
        }
        Ok(())
    }

    fn check_bounds(&self, index: usize) -> Result<(), ValidationError> {
        if index >= self.assets.len() {
            return Err(ValidationError::IndexOutOfBounds {
                index,
                len: self.assets.len(),
            });
        }
        Ok(())
    }

    /// Clear every main flag after the first one found at or after `start`.
    fn keep_first_main(&mut self, start: usize) {
        let mut seen = false;
        for asset in &mut self.assets[start..] {
            if asset.is_main {
                if seen {
                    asset.is_main = false;
                }
                seen = true;
            }
        }
    }

    fn promote_if_headless(&mut self) {
        if self.main_index().is_none() {
            if let Some(first) = self.assets.first_mut() {
                first.is_main = true;
            }
        }
    }
}

impl From<Vec<ImageAsset>> for ImageListEditor {
    fn from(assets: Vec<ImageAsset>) -> Self {
        Self::new(assets)
    }
}
