//! Path Validation module for uploaded file names
//!
//! Client-supplied filenames are never trusted as path components. They are
//! reduced to a conservative ASCII subset before being joined onto the upload
//! directory:
//!
//! - Non-ASCII characters are dropped
//! - Path separators become spaces, and whitespace runs become `_`
//! - Only `[A-Za-z0-9_.-]` survives
//! - Leading and trailing `.`/`_` are stripped, so `..` can never remain
//! - Windows device names (`CON`, `LPT1`, ...) are prefixed with `_`
//!
//! ## Usage Examples
//!
//! ```rust
//! use candidate_intake::path_validation::secure_filename;
//!
//! assert_eq!(secure_filename("My cv.pdf"), "My_cv.pdf");
//! assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
//! ```

use std::path::{Path, PathBuf};

/// Errors that can occur during path validation
#[derive(Debug, Clone, PartialEq)]
pub enum PathValidationError {
    /// Name contains traversal sequences or separators
    PathTraversal,
    /// Name contains characters outside the allowed set
    InvalidCharacters,
    /// Filename is too long
    FilenameTooLong,
    /// Filename uses reserved name
    ReservedName,
    /// Empty name provided
    EmptyPath,
}

/// Result type for path validation operations
pub type PathValidationResult<T> = Result<T, PathValidationError>;

/// Maximum allowed filename length (255 bytes on most filesystems)
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Reserved filenames that should not be used (Windows compatibility)
pub const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Prefix for names generated when sanitization leaves nothing usable
pub const GENERATED_NAME_PREFIX: &str = "upload";

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn is_reserved(filename: &str) -> bool {
    let stem = filename.split('.').next().unwrap_or("").to_ascii_uppercase();
    RESERVED_NAMES.contains(&stem.as_str())
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// The result may be empty when nothing in the input survives; callers that
/// need a usable name should go through [`upload_filename`].
///
/// # Examples
///
/// ```rust
/// use candidate_intake::path_validation::secure_filename;
///
/// assert_eq!(secure_filename("form scan (1).png"), "form_scan_1.png");
/// assert_eq!(secure_filename("con.txt"), "_con.txt");
/// assert_eq!(secure_filename("..."), "");
/// ```
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined.chars().filter(|c| is_allowed_char(*c)).collect();
    let mut sanitized = kept.trim_matches(|c| c == '.' || c == '_').to_string();

    if !sanitized.is_empty() && is_reserved(&sanitized) {
        sanitized.insert(0, '_');
    }

    if sanitized.len() > MAX_FILENAME_LENGTH {
        // Try to preserve extension
        sanitized = match sanitized.rfind('.') {
            Some(dot_pos) => {
                let (name, ext) = sanitized.split_at(dot_pos);
                let max_name_len = MAX_FILENAME_LENGTH.saturating_sub(ext.len());
                format!("{}{}", &name[..max_name_len.min(name.len())], ext)
            }
            None => sanitized[..MAX_FILENAME_LENGTH].to_string(),
        };
    }

    sanitized
}

/// Name under which an upload is stored.
///
/// Falls back to `upload_<uuid>` when sanitization leaves nothing, keeping the
/// original extension if it survives sanitization on its own.
///
/// ```rust
/// use candidate_intake::path_validation::upload_filename;
///
/// assert_eq!(upload_filename("scan.PNG"), "scan.PNG");
/// assert!(upload_filename("...").starts_with("upload_"));
/// ```
pub fn upload_filename(original: &str) -> String {
    let sanitized = secure_filename(original);
    if !sanitized.is_empty() {
        return sanitized;
    }

    let extension = Path::new(original)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(secure_filename)
        .filter(|ext| !ext.is_empty() && !ext.contains('.'));

    generate_upload_filename(extension.as_deref())
}

/// Generate a collision-free upload name such as `upload_<uuid>.pdf`
pub fn generate_upload_filename(extension: Option<&str>) -> String {
    let mut filename = format!("{}_{}", GENERATED_NAME_PREFIX, uuid::Uuid::new_v4().simple());
    if let Some(ext) = extension {
        filename.push('.');
        filename.push_str(ext);
    }
    filename
}

/// Check that `filename` is already a safe single path component
pub fn validate_filename(filename: &str) -> PathValidationResult<()> {
    if filename.is_empty() {
        return Err(PathValidationError::EmptyPath);
    }
    if filename.len() > MAX_FILENAME_LENGTH {
        return Err(PathValidationError::FilenameTooLong);
    }
    if filename.contains('/') || filename.contains('\\') || filename == "." || filename == ".." {
        return Err(PathValidationError::PathTraversal);
    }
    if !filename.chars().all(is_allowed_char) {
        return Err(PathValidationError::InvalidCharacters);
    }
    if is_reserved(filename) {
        return Err(PathValidationError::ReservedName);
    }
    Ok(())
}

/// Join a validated filename onto the upload directory
pub fn resolve_upload_path(upload_dir: &Path, filename: &str) -> PathValidationResult<PathBuf> {
    validate_filename(filename)?;
    Ok(upload_dir.join(filename))
}

impl std::fmt::Display for PathValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathValidationError::PathTraversal => {
                write!(f, "Path contains directory traversal sequences")
            }
            PathValidationError::InvalidCharacters => write!(f, "Path contains invalid characters"),
            PathValidationError::FilenameTooLong => write!(f, "Filename is too long"),
            PathValidationError::ReservedName => write!(f, "Filename uses reserved name"),
            PathValidationError::EmptyPath => write!(f, "Path is empty"),
        }
    }
}

impl std::error::Error for PathValidationError {}
