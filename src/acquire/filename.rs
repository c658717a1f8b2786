//! Filename helpers for downloaded installers
//!
//! Picks the name a payload should be stored under: the server's
//! `Content-Disposition` first, otherwise the last path segment of the final
//! URL.

/// Extract the filename from a `Content-Disposition` header value.
///
/// Prefers the RFC 5987 `filename*=` form, falls back to `filename=`.
///
/// # Example
/// ```ignore
/// assert_eq!(
///     filename_from_disposition(r#"attachment; filename="setup.exe""#),
///     Some("setup.exe".to_string())
/// );
/// ```
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in header.split(';').map(str::trim) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'lang'percent-encoded
                let encoded = value.trim().splitn(3, '\'').nth(2).unwrap_or(value);
                extended = Some(percent_decode(encoded.trim_matches('"')));
            }
            "filename" => {
                plain = Some(value.trim().trim_matches('"').to_string());
            }
            _ => {}
        }
    }

    extended
        .or(plain)
        .filter(|name| !name.trim().is_empty())
        .map(|name| sanitize_filename(&name))
}

/// Extract a filename from a URL's last path segment.
///
/// Handles query strings and fragments, returns "download" as fallback.
pub fn filename_from_url(url: &str) -> String {
    let clean_url = url.split('?').next().unwrap_or(url);
    let clean_url = clean_url.split('#').next().unwrap_or(clean_url);

    let after_scheme = clean_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(clean_url);

    // A bare host has no path segment to use.
    match after_scheme.split_once('/') {
        Some((_, path)) => path
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(|s| sanitize_filename(&percent_decode(s)))
            .unwrap_or_else(|| "download".to_string()),
        None => "download".to_string(),
    }
}

/// Replace the base name but keep the extension. Names without an extension
/// are taken to be executables.
///
/// # Example
/// ```ignore
/// assert_eq!(apply_rename("AMD-Chipset-6.10.exe", "AMD_Chipset"), "AMD_Chipset.exe");
/// ```
pub fn apply_rename(filename: &str, rename_as: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{}.{}", rename_as, ext)
        }
        _ => format!("{}.exe", rename_as),
    }
}

/// Whether a file name looks like a Windows executable.
pub fn is_executable_name(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case("exe"))
}

/// Percent-decoding for URL segments, tolerant of malformed escapes.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let Some(byte) = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            out.push(byte);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Sanitize a filename for safe filesystem use.
///
/// Replaces problematic characters and handles special names.
pub fn sanitize_filename(name: &str) -> String {
    if name.is_empty() || name == "." || name == ".." {
        return "download".to_string();
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim().trim_matches('.');

    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}
