//! RTU protocol constants
//!
//! Frame and quantity limits derive from the serial-line ADU ceiling of 256
//! bytes: `address(1) + PDU(253) + CRC(2)`.

use std::time::Duration;

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Maximum RTU frame (ADU) size on the wire
pub const MAX_FRAME_SIZE: usize = 256;

/// Address byte + function code byte
pub const HEADER_LEN: usize = 2;

/// Trailing CRC, low byte first
pub const CRC_LEN: usize = 2;

/// Shortest well-formed frame: `address + function + CRC`
pub const MIN_FRAME_LEN: usize = HEADER_LEN + CRC_LEN;

/// Exception frame: `address + (function | 0x80) + code + CRC`
pub const EXCEPTION_FRAME_LEN: usize = HEADER_LEN + 1 + CRC_LEN;

/// Maximum payload carried between header and CRC
///
/// 256 - 2 (header) - 2 (CRC) = 252 bytes
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_SIZE - HEADER_LEN - CRC_LEN;

/// Bit set on the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

// ============================================================================
// Addressing
// ============================================================================

/// Lowest unicast slave address (0 is broadcast and not supported)
pub const MIN_SLAVE_ADDRESS: u8 = 1;

/// Highest unicast slave address
pub const MAX_SLAVE_ADDRESS: u8 = 247;

// ============================================================================
// Register Operation Limits
// ============================================================================

/// Maximum number of registers for FC03 (Read Holding Registers)
///
/// Response frame: 1 (addr) + 1 (fc) + 1 (byte count) + N × 2 + 2 (CRC) ≤ 256
/// Therefore: N ≤ (256 - 5) / 2 = 125.5 → 125 registers
pub const MAX_READ_REGISTERS: u16 = 125;

/// Maximum number of registers for FC16 (Write Multiple Registers)
///
/// Request frame: 1 + 1 + 2 (start) + 2 (count) + 1 (byte count) + N × 2 + 2 ≤ 256
/// Therefore: N ≤ (256 - 9) / 2 = 123.5 → 123 registers
pub const MAX_WRITE_REGISTERS: u16 = 123;

// ============================================================================
// Timing Defaults
// ============================================================================

/// Default transmit/receive timeout, also substituted for a zero timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default number of additional attempts after a retryable failure
pub const DEFAULT_RETRY_COUNT: u8 = 3;

/// Pause between attempts so the bus can settle
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Replace a zero timeout with [`DEFAULT_TIMEOUT`]
#[inline]
pub fn effective_timeout(timeout: Duration) -> Duration {
    if timeout.is_zero() {
        DEFAULT_TIMEOUT
    } else {
        timeout
    }
}

/// Whether `address` is a valid unicast slave address
#[inline]
pub const fn is_valid_slave_address(address: u8) -> bool {
    address >= MIN_SLAVE_ADDRESS && address <= MAX_SLAVE_ADDRESS
}
