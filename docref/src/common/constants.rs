// doc constants
pub const DOC_ID: &str = "_id";
pub const FIELD_SEPARATOR: &str = ".";

// timestamp constants
pub const DEFAULT_CREATE_KEY: &str = "createdAt";
pub const DEFAULT_UPDATE_KEY: &str = "updatedAt";

// event constants
pub const ENTITY_PREFIX: &str = "entity";
pub const EVENT_SEPARATOR: &str = ".";

// refresh constants
pub const REFRESH_CHUNK_SIZE: usize = 64;

pub const DOCREF_VERSION: &str = env!("CARGO_PKG_VERSION");
