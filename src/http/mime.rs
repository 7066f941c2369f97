//! Content-Type lookup for files served from disk

use std::path::Path;

/// Content type for a file, keyed on its extension
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("txt" | "md") => "text/plain; charset=utf-8",
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("toml") => "application/toml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(content_type_for(Path::new("README.md")), "text/plain; charset=utf-8");
        assert_eq!(content_type_for(Path::new("static/app.js")), "application/javascript");
        assert_eq!(content_type_for(Path::new("logo.svg")), "image/svg+xml");
    }

    #[test]
    fn test_unknown_or_missing_extension() {
        assert_eq!(content_type_for(Path::new("data.bin")), "application/octet-stream");
        assert_eq!(content_type_for(Path::new("Makefile")), "application/octet-stream");
    }
}
