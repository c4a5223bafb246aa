use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{CameraError, Result};

/// A single metadata entry value
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
}

/// Key/value settings or results attached to requests, results and
/// characteristics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraMetadata {
    entries: BTreeMap<String, MetadataValue>,
}

impl CameraMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: MetadataValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<MetadataValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct SurfaceInner {
    id: u64,
    name: String,
    released: AtomicBool,
}

/// A (cheaply clonable) handle to an output target that captured images are
/// written to.
///
/// Clones refer to the same target. Once [`Surface::release`] has been called
/// the target can no longer be used in new requests or configurations.
#[derive(Debug, Clone)]
pub struct Surface {
    inner: Arc<SurfaceInner>,
}

impl PartialEq for Surface {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
impl Eq for Surface {}

impl Hash for Surface {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl Surface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SurfaceInner {
                id: NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed),
                name: name.into(),
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn release(&self) {
        self.inner.released.store(true, Ordering::Release);
    }

    pub fn is_valid(&self) -> bool {
        !self.inner.released.load(Ordering::Acquire)
    }
}

/// Templates the camera service can generate default request settings for.
///
/// See [the CameraDevice docs](https://developer.android.com/reference/android/hardware/camera2/CameraDevice#TEMPLATE_PREVIEW)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum RequestTemplate {
    Preview = 1,
    StillCapture = 2,
    Record = 3,
    VideoSnapshot = 4,
    ZeroShutterLag = 5,
    Manual = 6,
}

/// An immutable description of one exposure: its settings plus the targets
/// the image should be written to.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    settings: Arc<CameraMetadata>,
    targets: Vec<Surface>,
}

impl CaptureRequest {
    pub fn builder() -> CaptureRequestBuilder {
        CaptureRequestBuilder::new(CameraMetadata::new())
    }

    pub fn settings(&self) -> &CameraMetadata {
        &self.settings
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.settings.get(key)
    }

    pub fn targets(&self) -> &[Surface] {
        &self.targets
    }

    pub fn contains_target(&self, surface: &Surface) -> bool {
        self.targets.contains(surface)
    }

    /// Checks the request can be handed to the camera service: it must have
    /// at least one target and none of its targets may have been released.
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(CameraError::InvalidArgument(
                "Each request must have at least one Surface target".into(),
            ));
        }
        if let Some(surface) = self.targets.iter().find(|s| !s.is_valid()) {
            return Err(CameraError::InvalidArgument(format!(
                "Released Surface targets are not allowed (surface {} '{}')",
                surface.id(),
                surface.name()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CaptureRequestBuilder {
    settings: CameraMetadata,
    targets: Vec<Surface>,
}

impl CaptureRequestBuilder {
    pub(crate) fn new(settings: CameraMetadata) -> Self {
        Self {
            settings,
            targets: Vec::new(),
        }
    }

    pub fn set(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.settings.set(key, value);
        self
    }

    /// Adds an output target; adding the same target twice has no effect
    pub fn add_target(mut self, surface: &Surface) -> Self {
        if !self.targets.contains(surface) {
            self.targets.push(surface.clone());
        }
        self
    }

    pub fn remove_target(mut self, surface: &Surface) -> Self {
        self.targets.retain(|s| s != surface);
        self
    }

    pub fn build(self) -> CaptureRequest {
        CaptureRequest {
            settings: Arc::new(self.settings),
            targets: self.targets,
        }
    }
}
