use core::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::request::{CameraMetadata, MetadataValue};

/// Static properties of a camera device as reported by the camera service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraCharacteristics {
    /// Number of result messages the device emits per frame.
    ///
    /// `None` means the device doesn't support partial results, which is the
    /// same as a count of 1.
    pub partial_result_count: Option<u32>,

    /// Every other characteristic, keyed by name
    pub entries: CameraMetadata,
}

impl CameraCharacteristics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partial_result_count(mut self, count: u32) -> Self {
        self.partial_result_count = Some(count);
        self
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.entries.set(key, value);
        self
    }
}

/// A (cheaply clonable) reference to a device's [`CameraCharacteristics`]
///
/// This provides a thread-safe way to read the latest characteristics without
/// deeply copying them. If the characteristics are replaced then the change
/// becomes visible via pre-existing references.
#[derive(Clone)]
pub struct CharacteristicsRef {
    characteristics: Arc<RwLock<CameraCharacteristics>>,
}

impl PartialEq for CharacteristicsRef {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.characteristics, &other.characteristics) {
            true
        } else {
            let other_guard = other
                .characteristics
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            self.read().eq(&*other_guard)
        }
    }
}

impl fmt::Debug for CharacteristicsRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read().fmt(f)
    }
}

impl CharacteristicsRef {
    pub(crate) fn new(characteristics: CameraCharacteristics) -> Self {
        Self {
            characteristics: Arc::new(RwLock::new(characteristics)),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CameraCharacteristics> {
        self.characteristics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in a new set of characteristics, e.g. after the service re-reports them
    pub fn replace(&self, src: CameraCharacteristics) {
        *self
            .characteristics
            .write()
            .unwrap_or_else(PoisonError::into_inner) = src;
    }

    /// Returns a deep copy of the characteristics
    pub fn copy(&self) -> CameraCharacteristics {
        self.read().clone()
    }

    /// The number of partial results that make up one total result.
    ///
    /// Always at least 1.
    pub fn partial_result_count(&self) -> u32 {
        self.read().partial_result_count.unwrap_or(1).max(1)
    }

    pub fn get(&self, key: &str) -> Option<MetadataValue> {
        self.read().entries.get(key).cloned()
    }
}
