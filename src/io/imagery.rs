use std::future::Future;

use crate::core::render::RenderRequest;
use crate::error::Result;

/// Bytes returned by the imagery-processing service for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl RenderedPayload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_tiff(&self) -> bool {
        self.content_type.starts_with("image/tiff")
            || self.bytes.starts_with(b"II*\0")
            || self.bytes.starts_with(b"MM\0*")
    }

    /// Payloads that are neither TIFF nor an encoded image are read as raw samples.
    pub fn is_raw_raster(&self) -> bool {
        !self.is_tiff()
            && (self.content_type.starts_with("application/octet-stream")
                || self.content_type.is_empty())
    }
}

pub trait ImageryService: Send + Sync {
    /// Render one request. Zero-length bodies surface as `Error::EmptyResult`;
    /// small but non-empty payloads are returned and judged by the caller.
    fn render(&self, request: &RenderRequest) -> impl Future<Output = Result<RenderedPayload>> + Send;
}

impl<T: ImageryService> ImageryService for std::sync::Arc<T> {
    fn render(&self, request: &RenderRequest) -> impl Future<Output = Result<RenderedPayload>> + Send {
        (**self).render(request)
    }
}
