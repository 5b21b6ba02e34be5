/// Raw text returned by an engine, before any replacement rules run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OcrResponse {
    pub text: String,
}

impl OcrResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
