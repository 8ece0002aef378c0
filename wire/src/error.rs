use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated {layer}: needed {needed} bytes, {available} available")]
    Truncated {
        layer: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("unsupported {layer} field {field}: {value:#x}")]
    Unsupported {
        layer: &'static str,
        field: &'static str,
        value: u32,
    },

    #[error("unterminated string in {0}")]
    Unterminated(&'static str),
}
