use std::os::unix::io::RawFd;

use log::{debug, trace};

use crate::bus::{Funcs, I2cBus, LinuxI2c};
use crate::Result;

/// Handle value of a controller whose bus has not been opened.
pub const NO_HANDLE: RawFd = -1;

/// A controller for one I2C bus device node and one target slave on it.
///
/// The controller walks a small state machine that it does not enforce.
/// Sequencing is trusted to the caller, in keeping with the thin-wrapper
/// nature of this layer:
///
/// ```text
/// Unopened --init--> Opened --select_slave--> SlaveSelected
///                                  ^               |
///                                  +--(re-target)--+--[read/write]*
///                                                  |
///                                             --release--> Closed
/// ```
///
/// `Closed` is only left by a fresh [`init`][Self::init]. Failed
/// transitions are not rolled back; the controller is left in whatever
/// partial state the OS produced.
///
/// Register reads and writes are only meaningful after a successful
/// [`select_slave`][Self::select_slave]; no "selected" flag is tracked and
/// calls in the wrong order go straight to the OS.
///
/// The controller never closes its handle implicitly; there is no `Drop`
/// glue. Call [`release`][Self::release] when done, or the descriptor
/// stays open.
#[derive(Debug)]
pub struct I2cController<B = LinuxI2c> {
    pub(crate) bus: B,
    port: u32,
    pub(crate) handle: RawFd,
    /// Address of the slave that [`select_slave`][Self::select_slave]
    /// targets. Set it before selecting; it is handed to the kernel
    /// unvalidated (7-bit, or 10-bit where the adapter supports it).
    pub address: u16,
}

impl I2cController<LinuxI2c> {
    /// Creates a controller for `/dev/i2c-<port>`. Nothing is opened until
    /// [`init`][Self::init].
    pub fn new(port: u32) -> Self {
        Self::with_bus(LinuxI2c, port)
    }
}

impl<B: I2cBus> I2cController<B> {
    /// Creates a controller on a caller-supplied bus implementation.
    pub fn with_bus(bus: B, port: u32) -> Self {
        Self {
            bus,
            port,
            handle: NO_HANDLE,
            address: 0,
        }
    }

    /// The configured bus number.
    pub fn port(&self) -> u32 {
        self.port
    }

    /// The stored OS handle: [`NO_HANDLE`] before the first successful
    /// [`init`][Self::init], stale after [`release`][Self::release].
    pub fn handle(&self) -> RawFd {
        self.handle
    }

    /// Opens the configured bus and stores the handle.
    ///
    /// On failure the error carries the raw OS code (`ENOENT` for a
    /// missing node, `EACCES` for insufficient permissions, ...) and the
    /// stored handle keeps its previous value. Calling `init` on an
    /// already-initialized controller leaks the previous descriptor;
    /// [`release`][Self::release] first.
    pub fn init(&mut self) -> Result<()> {
        let fd = self.bus.open(self.port)?;
        self.handle = fd;
        debug!("i2c-{}: opened (fd {})", self.port, fd);
        Ok(())
    }

    /// Closes the stored handle.
    ///
    /// The handle field is deliberately left untouched: the controller
    /// must not be used again until a fresh [`init`][Self::init], and any
    /// operation attempted on the stale handle fails with `EBADF` from
    /// the OS layer rather than being silently ignored.
    pub fn release(&mut self) -> Result<()> {
        self.bus.close(self.handle)?;
        debug!("i2c-{}: closed (fd {})", self.port, self.handle);
        Ok(())
    }

    /// Tells the kernel driver which slave the following byte operations
    /// target, using the stored [`address`][Self::address]. May be called
    /// repeatedly on one open handle to re-target a different device.
    ///
    /// On failure the exact kernel errno is preserved in the error
    /// (`EBUSY` for an address claimed by another driver, `EINVAL` for an
    /// address out of range), since slave-selection failures are the most
    /// actionable ones for callers.
    pub fn select_slave(&mut self) -> Result<()> {
        self.bus.select(self.handle, self.address)?;
        debug!("i2c-{}: slave 0x{:02x} selected", self.port, self.address);
        Ok(())
    }

    /// Reads one byte from `register` of the selected slave (SMBus
    /// read-byte-data).
    pub fn read(&mut self, register: u8) -> Result<u8> {
        let value = self.bus.read_byte_data(self.handle, register)?;
        trace!(
            "i2c-{}: reg 0x{:02x} -> 0x{:02x}",
            self.port,
            register,
            value
        );
        Ok(value)
    }

    /// Writes `buffer` to `register` as one SMBus block transfer and
    /// returns the number of bytes accepted.
    ///
    /// An empty buffer is a valid zero-byte block. Buffers above the
    /// 32-byte SMBus block limit are not pre-validated here; the kernel
    /// rejects them with `EINVAL`.
    pub fn write(&mut self, register: u8, buffer: &[u8]) -> Result<usize> {
        let written = self.bus.write_block_data(self.handle, register, buffer)?;
        trace!(
            "i2c-{}: reg 0x{:02x} <- {} byte block",
            self.port,
            register,
            written
        );
        Ok(written)
    }

    /// Writes one byte to `register` of the selected slave (SMBus
    /// write-byte-data), the most common peripheral interaction, split
    /// out from [`write`][Self::write].
    pub fn write_byte(&mut self, register: u8, value: u8) -> Result<()> {
        self.bus.write_byte_data(self.handle, register, value)?;
        trace!(
            "i2c-{}: reg 0x{:02x} <- 0x{:02x}",
            self.port,
            register,
            value
        );
        Ok(())
    }

    /// Fills `buffer` starting at `register` (SMBus block read, same
    /// 32-byte limit as [`write`][Self::write]) and returns the number of
    /// bytes read.
    pub fn read_block(&mut self, register: u8, buffer: &mut [u8]) -> Result<usize> {
        let n = self.bus.read_block_data(self.handle, register, buffer)?;
        trace!(
            "i2c-{}: reg 0x{:02x} -> {} byte block",
            self.port,
            register,
            n
        );
        Ok(n)
    }

    /// Queries what the adapter behind the open handle can do.
    pub fn funcs(&mut self) -> Result<Funcs> {
        self.bus.funcs(self.handle)
    }

    /// Forwards a bus call timeout to the kernel driver. Retry/backoff
    /// policy otherwise stays with the caller.
    pub fn set_timeout(&mut self, timeout_ms: u32) -> Result<()> {
        self.bus.set_timeout(self.handle, timeout_ms)
    }

    /// Forwards an arbitration-lost retry count to the kernel driver.
    pub fn set_retries(&mut self, retries: u32) -> Result<()> {
        self.bus.set_retries(self.handle, retries)
    }
}
