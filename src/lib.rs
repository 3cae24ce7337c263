//! Rendering toolkit for a live guest photo wall.
//!
//! Guests upload photos; the wall shows them as a scrolling marquee strip and
//! a live collage. This crate owns the presentation core only:
//!
//! - [`marquee`] - auto-scrolling, looping image strip with pure tick state
//! - [`collage`] - square-tile grid compositor with rounded clipping
//! - [`compress`] - upload-time tiered downscale/re-encode
//! - [`loader`] - worker-pool decode queue with pass generations
//! - [`surface`] - the software RGBA surface everything paints onto
//! - [`models`] - photo records, sources, and filtering
//! - [`upload`] - compression plus metadata record preparation
//!
//! Hosted auth, storage, and the realtime photo feed are external; the
//! renderers only ever see lists of resolvable image sources.

pub mod collage;
pub mod compress;
pub mod layout;
pub mod loader;
pub mod marquee;
pub mod models;
pub mod surface;
pub mod upload;

pub use collage::{Collage, CollageCompositor, CollageConfig, CollageStatus};
pub use compress::{process_upload, ProcessedUpload, SIZE_THRESHOLD_BYTES};
pub use layout::{GridLayout, GridSpec};
pub use loader::{DecodeQueue, RenderPass};
pub use marquee::MarqueeRenderer;
pub use models::{Photo, PhotoSource};
pub use surface::Surface;
pub use upload::{prepare_upload, PreparedUpload, UploadError};
