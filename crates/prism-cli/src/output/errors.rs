//! Error message formatting with actionable suggestions.

use prism_core::error::PrismError;
use std::error::Error;

use super::colors::ColorSupport;

/// Error formatter with suggestions
pub struct ErrorFormatter {
    colors: ColorSupport,
}

impl ErrorFormatter {
    /// Create a new error formatter
    pub fn new() -> Self {
        Self::with_colors(ColorSupport::detect())
    }

    pub fn with_colors(colors: ColorSupport) -> Self {
        Self { colors }
    }

    /// Format an error with its suggestion and source chain
    pub fn format_error(&self, error: &PrismError) -> String {
        let mut output = format!("{}: {}\n", self.colors.red("error"), error);

        if let Some(suggestion) = error.suggestion() {
            output.push_str(&format!("\n{}: {}\n", self.colors.dim("help"), suggestion));
        }

        let mut source = error.source();
        while let Some(err) = source {
            output.push_str(&format!("\n{}: {}", self.colors.dim("caused by"), err));
            source = err.source();
        }

        output
    }
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_with_help_and_cause() {
        let formatter = ErrorFormatter::with_colors(ColorSupport::disabled());
        let error = PrismError::io(
            "Failed to read photo.jpg",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );

        let text = formatter.format_error(&error);
        assert!(text.starts_with("error: IO error: Failed to read photo.jpg\n"));
        assert!(text.contains("caused by: no such file"));
    }

    #[test]
    fn test_format_pack_not_found_has_help() {
        let formatter = ErrorFormatter::with_colors(ColorSupport::disabled());
        let error = PrismError::PackNotFound {
            id: "cat/none".to_string(),
        };

        let text = formatter.format_error(&error);
        assert!(text.contains("help: Run 'prism manifest' to list available packs"));
    }
}
