// Embedded assets are the default; the disk provider is for UI work on a desk.
pub mod provider_embed;

#[cfg(feature = "frontend_disk")]
pub mod provider_disk;
