/// OCR invocation: one encoded grey image holding a single text region.
#[derive(Debug, Clone, Copy)]
pub struct OcrRequest<'a> {
    image: &'a [u8],
}

impl<'a> OcrRequest<'a> {
    pub fn new(image: &'a [u8]) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &'a [u8] {
        self.image
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}
