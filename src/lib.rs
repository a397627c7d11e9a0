//! Controller abstraction for the I2C bus device nodes exposed by Linux
//! (`/dev/i2c-<port>`), doing register-oriented byte access through the
//! SMBus subset of the protocol. The kernel side of this interface is
//! documented in <https://www.kernel.org/doc/Documentation/i2c/dev-interface>.
//!
//! ```no_run
//! use i2c_ctl::I2cController;
//!
//! # fn main() -> i2c_ctl::Result<()> {
//! let mut rtc = I2cController::new(1);
//! rtc.address = 0x68;
//!
//! rtc.init()?;
//! rtc.select_slave()?;
//! rtc.write_byte(0x00, 0x12)?;
//! let seconds = rtc.read(0x00)?;
//! rtc.release()?;
//! # Ok(())
//! # }
//! ```

mod bus;
mod controller;
mod ffi;
#[cfg(feature = "hal")]
mod hal;
#[cfg(test)]
mod mock;

pub use bus::{device_path, Funcs, I2cBus, LinuxI2c, Transfer};
pub use controller::{I2cController, NO_HANDLE};
#[cfg(feature = "hal")]
pub use hal::BusError;

pub use nix::errno::Errno;

/// Crate-wide result type; failures carry the raw OS error code.
pub type Result<T> = core::result::Result<T, Errno>;
