// Memory management module
// Tracks scratch surfaces and blob-backed image data until they are released

use image::GrayImage;
use log::{debug, info};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Off-screen surface a bitmap worker paints into
pub type SurfaceSlot = Arc<Mutex<Option<GrayImage>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

/// Handle to encoded image data kept alive by the manager
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobUrl(String);

impl BlobUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owner of every temporary allocation made on behalf of the application
#[derive(Default)]
pub struct MemoryManager {
    next_id: u64,
    surfaces: HashMap<SurfaceId, SurfaceSlot>,
    blobs: HashMap<BlobUrl, Vec<u8>>,
}

impl MemoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty scratch surface and start tracking it
    pub fn add_temp_surface(&mut self) -> (SurfaceId, SurfaceSlot) {
        let id = SurfaceId(self.bump());
        let slot: SurfaceSlot = Arc::new(Mutex::new(None));
        self.surfaces.insert(id, Arc::clone(&slot));
        (id, slot)
    }

    /// Stop tracking a surface whose contents were taken. Returns false when it was already gone.
    pub fn release_surface(&mut self, id: SurfaceId) -> bool {
        self.surfaces.remove(&id).is_some()
    }

    pub fn tracked_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    /// Keep `data` alive behind a fresh blob handle
    pub fn create_blob_url(&mut self, data: Vec<u8>) -> BlobUrl {
        let url = BlobUrl(format!("blob:qrframe/{}", self.bump()));
        debug!("Allocated {} ({} bytes)", url, data.len());
        self.blobs.insert(url.clone(), data);
        url
    }

    pub fn blob(&self, url: &BlobUrl) -> Option<&[u8]> {
        self.blobs.get(url).map(Vec::as_slice)
    }

    /// Release a blob. Returns false when it was already gone.
    pub fn revoke_blob_url(&mut self, url: &BlobUrl) -> bool {
        self.blobs.remove(url).is_some()
    }

    pub fn live_blobs(&self) -> usize {
        self.blobs.len()
    }

    /// Detach every tracked surface and revoke every blob. Idempotent.
    pub fn cleanup(&mut self) {
        let surfaces = self.surfaces.len();
        let blobs = self.blobs.len();

        for (_, slot) in self.surfaces.drain() {
            // A late worker may still hold the slot; drop what it painted
            if let Ok(mut bitmap) = slot.lock() {
                bitmap.take();
            }
        }
        self.blobs.clear();

        if surfaces > 0 || blobs > 0 {
            info!("Memory cleanup: released {} surfaces, {} blobs", surfaces, blobs);
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surfaces_are_tracked_until_cleanup() {
        let mut memory = MemoryManager::new();
        let (a, _) = memory.add_temp_surface();
        let (b, _) = memory.add_temp_surface();
        assert_ne!(a, b);
        assert_eq!(memory.tracked_surfaces(), 2);

        memory.cleanup();
        assert_eq!(memory.tracked_surfaces(), 0);
    }

    #[test]
    fn test_release_surface() {
        let mut memory = MemoryManager::new();
        let (a, _) = memory.add_temp_surface();
        let (b, _) = memory.add_temp_surface();

        assert!(memory.release_surface(a));
        assert!(!memory.release_surface(a));
        assert_eq!(memory.tracked_surfaces(), 1);

        memory.cleanup();
        assert!(!memory.release_surface(b));
    }

    #[test]
    fn test_cleanup_empties_slots_still_held_elsewhere() {
        let mut memory = MemoryManager::new();
        let (_, slot) = memory.add_temp_surface();
        *slot.lock().unwrap() = Some(GrayImage::new(4, 4));

        memory.cleanup();
        assert!(slot.lock().unwrap().is_none());
    }

    #[test]
    fn test_blob_lifecycle() {
        let mut memory = MemoryManager::new();
        let url = memory.create_blob_url(vec![1, 2, 3]);
        assert!(url.as_str().starts_with("blob:"));
        assert_eq!(memory.blob(&url), Some(&[1u8, 2, 3][..]));

        assert!(memory.revoke_blob_url(&url));
        assert!(!memory.revoke_blob_url(&url));
        assert_eq!(memory.blob(&url), None);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut memory = MemoryManager::new();
        memory.add_temp_surface();
        memory.create_blob_url(vec![0; 8]);

        memory.cleanup();
        memory.cleanup();
        assert_eq!(memory.tracked_surfaces(), 0);
        assert_eq!(memory.live_blobs(), 0);
    }
}
