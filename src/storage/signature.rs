//! Content signature checks for uploaded files

/// How much of a text upload is inspected
const TEXT_SAMPLE_SIZE: usize = 8192;

/// Expected content of a converter's input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputSignature {
    /// File must start with these magic bytes
    Magic {
        /// Leading bytes (e.g. `%PDF`)
        bytes: &'static [u8],
        /// Human-readable kind for error messages
        label: &'static str,
    },
    /// File must look like text: no NUL bytes and valid UTF-8 in the sample
    Text,
    /// No content check
    Any,
}

impl InputSignature {
    /// PDF header
    pub const PDF: InputSignature = InputSignature::Magic {
        bytes: b"%PDF",
        label: "PDF",
    };

    /// Whether `content` satisfies this signature
    pub fn matches(&self, content: &[u8]) -> bool {
        match self {
            InputSignature::Magic { bytes, .. } => content.starts_with(bytes),
            InputSignature::Text => is_text(content),
            InputSignature::Any => true,
        }
    }

    /// Label used in validation errors
    pub fn label(&self) -> &'static str {
        match self {
            InputSignature::Magic { label, .. } => label,
            InputSignature::Text => "text",
            InputSignature::Any => "input",
        }
    }
}

fn is_text(content: &[u8]) -> bool {
    let sample = &content[..content.len().min(TEXT_SAMPLE_SIZE)];

    if sample.contains(&0) {
        return false;
    }

    match std::str::from_utf8(sample) {
        Ok(_) => true,
        // A multi-byte character cut off by the sample boundary is fine
        Err(e) => e.error_len().is_none() && sample.len() == TEXT_SAMPLE_SIZE,
    }
}
