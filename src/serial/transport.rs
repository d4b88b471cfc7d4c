//! Byte-level transport abstraction so the link loops can run against real
//! serial ports and in-memory test doubles alike

use std::io;

/// Duplex byte channel consumed by the link
///
/// Implementations must not block in `byte_available`. `read_byte` is only
/// called after `byte_available` returned `true`.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Whether at least one byte can be read without blocking
    fn byte_available(&mut self) -> io::Result<bool>;

    /// Read a single byte
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Write a single byte
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    /// Write a complete frame
    ///
    /// Defaults to one `write_byte` per byte; ports with buffered writes should
    /// override this.
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        for &byte in frame {
            self.write_byte(byte)?;
        }
        Ok(())
    }
}
