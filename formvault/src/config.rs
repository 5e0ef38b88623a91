//! Application configuration constants
//!
//! Central location for storage identifiers, validation boundaries and
//! the placeholder texts shared by listing and document generation.

// ===== Storage =====

/// Logical database name, recorded alongside the schema version
pub const DATABASE_NAME: &str = "FormBuilderDB";

/// Declared schema version. Bumping it runs the upgrade step on open.
pub const SCHEMA_VERSION: i64 = 1;

/// File name of the on-disk store inside the data directory
pub const DATABASE_FILE_NAME: &str = "formvault.sqlite";

/// Sub-directory of the data directory receiving exported snapshots
pub const EXPORTS_DIR_NAME: &str = "exports";

/// Default data directory when none is given on the command line
pub const DEFAULT_DATA_DIR: &str = "formvault-data";

/// Fixed primary key of the singleton branding record
pub const BRANDING_KEY: &str = "company";

/// Maximum time a writer waits for a locked database before failing
pub const BUSY_TIMEOUT_SECS: u64 = 5;

/// Connections in the application pool for on-disk stores
pub const MAX_POOL_CONNECTIONS: u32 = 5;

// ===== Templates =====

/// A choice question may not lose options once it is down to this many.
pub const MIN_REMOVABLE_OPTIONS: usize = 2;

/// Options given to a freshly added choice question
pub const DEFAULT_OPTIONS: &[&str] = &["Option 1", "Option 2"];

// ===== Listing & documents =====

/// Number of events shown in the recent activity feed
pub const RECENT_ACTIVITY_LIMIT: usize = 50;

/// Name shown for responses whose template has been deleted
pub const UNKNOWN_TEMPLATE_NAME: &str = "Unknown Template";

/// Text rendered for a question without an answer
pub const NO_ANSWER_TEXT: &str = "No answer provided";

/// Text rendered when a signature payload cannot be used as an image
pub const SIGNATURE_UNAVAILABLE_TEXT: &str = "Signature not available";

/// Marker every usable signature payload starts with
pub const SIGNATURE_DATA_PREFIX: &str = "data:image";

// ===== Export =====

/// File name prefix of exported snapshots
pub const EXPORT_FILE_PREFIX: &str = "form-builder-backup-";
