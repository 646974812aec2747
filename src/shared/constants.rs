pub const APP_NAME: &str = "vchunk";

pub const ERROR_LOG_FILE: &str = "error.log";
pub const DEBUG_LOG_FILE: &str = "debug.log";

/// Nominal length of one chunk when the command line does not override it.
pub const DEFAULT_CHUNK_DURATION_S: f64 = 5.0;

/// Progress is reported on every frame whose index is a multiple of this.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10;

pub const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Share of usable frames a chunk needs to be marked valid.
pub const DEFAULT_MIN_USABLE_RATIO: f64 = 0.5;

pub const PROPERTIES_FILE_PREFIX: &str = "properties";
pub const PAYLOAD_FILE_PREFIX: &str = "payload";
pub const METADATA_FILE_PREFIX: &str = "metadata";
