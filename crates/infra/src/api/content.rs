use bytes::Bytes;

/// A request body with its own content type
///
/// Used for uploads (app files, extensions, data files) where the body is
/// not in the client's default content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawContent {
    pub body: Bytes,
    /// Falls back to the client's content type when `None`
    pub content_type: Option<String>,
}

impl RawContent {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into(), content_type: None }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}
