use std::time::Duration;

// capture
pub const DEFAULT_WIDTH: u32 = 400;
pub const DEFAULT_HEIGHT: u32 = 300;
pub const REFRESH_RATE: u32 = 60;
pub const MAX_REFRESH_RATE: u32 = 1000;
/// Largest raster the capture path will allocate (8K x 8K)
pub const MAX_CAPTURE_PIXELS: u64 = 8192 * 8192;
pub const DIMENSION_POLL: Duration = Duration::from_millis(100);
pub const JPEG_QUALITY: u8 = 100;
pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

// sampling
pub const SAMPLE_FLOOR: Duration = Duration::from_millis(200);

// encoding request
pub const ENCODE_FRAME_RATE: u32 = 10;
pub const MANIFEST_PATTERN: &str = "input%3d.jpg";
pub const MANIFEST_EXTENSION: &str = "jpg";
pub const OUTPUT_NAME: &str = "out.mp4";
pub const MEMORY_BUDGET: u64 = 256 * 1024 * 1024;

// channels
pub const SNAPSHOT_CHANNEL_CAPACITY: usize = 4;
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Exit status reported when the encoder binary could not be launched at all.
pub const EXIT_NOT_LAUNCHED: i32 = 127;
