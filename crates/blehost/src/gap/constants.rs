// LE scan parameters, in 0.625 ms units
pub const LE_SCAN_INTERVAL: u16 = 0x0010; // 10 ms
pub const LE_SCAN_WINDOW: u16 = 0x0010; // 10 ms

// LE advertising interval, in 0.625 ms units
pub const LE_ADV_INTERVAL_MIN: u16 = 0x0800; // 1.28 s
pub const LE_ADV_INTERVAL_MAX: u16 = 0x0800; // 1.28 s

// LE connection parameters
pub const LE_CONN_INTERVAL_MIN: u16 = 0x0006; // 7.5 ms
pub const LE_CONN_INTERVAL_MAX: u16 = 0x0008; // 10 ms
pub const LE_CONN_LATENCY: u16 = 0x0000; // 0
pub const LE_SUPERVISION_TIMEOUT: u16 = 0x0048; // 720 ms

// Disconnect reasons
pub const REMOTE_USER_TERMINATED_CONNECTION: u8 = 0x13;
pub const CONNECTION_TERMINATED_BY_LOCAL_HOST: u8 = 0x16;

// SMP pairing failure reasons reported through authentication events
pub const PASSKEY_ENTRY_FAILED: u8 = 0x01;
pub const AUTHENTICATION_REQUIREMENTS: u8 = 0x03;
pub const PAIRING_NOT_SUPPORTED: u8 = 0x05;
