/// Top-level work type whose works build product histories
pub const PRIMARY_WORK_TYPE: &str = "Прямые";

/// Auxiliary work type
pub const AUX_WORK_TYPE: &str = "Косвенные";

/// Side work type
pub const ASIDE_WORK_TYPE: &str = "Побочные";

/// Rest breaks
pub const REST_WORK_TYPE: &str = "Отдых";

/// `tag` value carried by a work while its executor is still on it
pub const TAG_CURRENT: &str = "current";

/// `updNote` value set while an edit is waiting to be reprocessed
pub const UPD_NOTE_UNPROCESSED: &str = "unprocessed";

/// Per-request item ceiling of the store's batch get / batch write
pub const STORE_BATCH_LIMIT: usize = 10;

pub const DAY_MS: i64 = 24 * 3600 * 1000;

/// Default organisation timezone offset (hours east of UTC)
pub const DEFAULT_TZ_OFFSET_HOURS: i32 = 3;

/// Maximum number of days one stats regeneration may span
pub const DEFAULT_STATS_MAX_DAYS: i64 = 10;

/// Maximum span when clean mode regenerates stats for every executor
pub const DEFAULT_STATS_MAX_DAYS_CLEAN_ALL: i64 = 5;

/// Default number of change events drained into one stream batch
pub const DEFAULT_STREAM_BATCH_SIZE: usize = 100;

pub const DEFAULT_STREAM_CHANNEL_CAPACITY: usize = 1024;

/// Dead letters listed per request at most
pub const MAX_DEAD_LETTERS_LISTED: usize = 500;
