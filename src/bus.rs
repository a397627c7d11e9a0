use std::os::unix::io::RawFd;
use std::path::PathBuf;

use nix::fcntl::{self, OFlag};
use nix::sys::stat::Mode;

use crate::ffi;
use crate::Result;

/// Returns the device node for bus `port`: `/dev/i2c-<port>` with the port
/// number in decimal, no padding.
pub fn device_path(port: u32) -> PathBuf {
    PathBuf::from(format!("/dev/i2c-{}", port))
}

bitflags::bitflags! {
    /// Adapter functionality bits reported by the `I2C_FUNCS` ioctl.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Funcs: u32 {
        const I2C = 0x0000_0001;
        const TENBIT_ADDR = 0x0000_0002;
        const PROTOCOL_MANGLING = 0x0000_0004;
        const SMBUS_PEC = 0x0000_0008;
        const NOSTART = 0x0000_0010;
        const SLAVE = 0x0000_0020;
        const SMBUS_BLOCK_PROC_CALL = 0x0000_8000;
        const SMBUS_QUICK = 0x0001_0000;
        const SMBUS_READ_BYTE = 0x0002_0000;
        const SMBUS_WRITE_BYTE = 0x0004_0000;
        const SMBUS_READ_BYTE_DATA = 0x0008_0000;
        const SMBUS_WRITE_BYTE_DATA = 0x0010_0000;
        const SMBUS_READ_WORD_DATA = 0x0020_0000;
        const SMBUS_WRITE_WORD_DATA = 0x0040_0000;
        const SMBUS_PROC_CALL = 0x0080_0000;
        const SMBUS_READ_BLOCK_DATA = 0x0100_0000;
        const SMBUS_WRITE_BLOCK_DATA = 0x0200_0000;
        const SMBUS_READ_I2C_BLOCK = 0x0400_0000;
        const SMBUS_WRITE_I2C_BLOCK = 0x0800_0000;
        const HOST_NOTIFY = 0x1000_0000;
    }
}

/// One message of a combined transfer (`I2C_RDWR`). Each message is
/// addressed individually; the `I2C_SLAVE` selection does not apply here.
#[derive(Debug)]
pub enum Transfer<'a> {
    /// Write the bytes to the addressed device.
    Write(&'a [u8]),
    /// Fill the buffer from the addressed device.
    Read(&'a mut [u8]),
}

/// Access to an I2C bus device node.
///
/// This is the seam between the controller and the operating system: the
/// methods map one to one onto the `i2c-dev` file operations and ioctls.
/// [`LinuxI2c`] is the production implementation; tests substitute a
/// simulated bus.
///
/// Every method reports failures as the raw OS error code
/// ([`Errno`][nix::errno::Errno]); no additional error vocabulary is
/// layered on top.
pub trait I2cBus {
    /// Opens the device node for bus `port` read-write and returns the
    /// descriptor.
    fn open(&mut self, port: u32) -> Result<RawFd>;

    /// Releases a descriptor. Closing a descriptor that is not open fails
    /// with `EBADF`.
    fn close(&mut self, fd: RawFd) -> Result<()>;

    /// Targets subsequent byte operations on `fd` at `address`
    /// (`I2C_SLAVE`). The kernel decides whether the address is
    /// acceptable; no validation happens on this side.
    fn select(&mut self, fd: RawFd, address: u16) -> Result<()>;

    /// SMBus read-byte-data: one byte from `register` of the selected
    /// slave.
    fn read_byte_data(&mut self, fd: RawFd, register: u8) -> Result<u8>;

    /// SMBus write-byte-data: one byte to `register` of the selected
    /// slave.
    fn write_byte_data(&mut self, fd: RawFd, register: u8, value: u8) -> Result<()>;

    /// SMBus block read starting at `register`. The kernel rejects
    /// requests outside 1..=32 bytes. Returns the number of bytes read.
    fn read_block_data(&mut self, fd: RawFd, register: u8, buffer: &mut [u8]) -> Result<usize>;

    /// SMBus block write to `register` (length-prefixed on the wire). The
    /// kernel rejects blocks above 32 bytes; a zero-length block is valid
    /// and writes nothing. Returns the number of bytes accepted.
    fn write_block_data(&mut self, fd: RawFd, register: u8, buffer: &[u8]) -> Result<usize>;

    /// Executes the messages as one combined transaction with repeated
    /// starts (`I2C_RDWR`).
    fn transfer(&mut self, fd: RawFd, address: u16, messages: &mut [Transfer<'_>]) -> Result<()>;

    /// Queries the adapter functionality set (`I2C_FUNCS`).
    fn funcs(&mut self, fd: RawFd) -> Result<Funcs>;

    /// Sets the bus call timeout (`I2C_TIMEOUT`).
    fn set_timeout(&mut self, fd: RawFd, timeout_ms: u32) -> Result<()>;

    /// Sets the retry count for arbitration-lost calls (`I2C_RETRIES`).
    fn set_retries(&mut self, fd: RawFd, retries: u32) -> Result<()>;
}

/// The real bus, backed by `/dev/i2c-*`.
#[derive(Debug, Default)]
pub struct LinuxI2c;

impl LinuxI2c {
    fn smbus(
        fd: RawFd,
        read_write: u8,
        command: u8,
        size: u32,
        data: &mut ffi::SmbusData,
    ) -> Result<()> {
        let request = ffi::SmbusRequest {
            read_write,
            command,
            size,
            data,
        };
        unsafe { ffi::i2c_smbus(fd, &request) }?;
        Ok(())
    }
}

impl I2cBus for LinuxI2c {
    fn open(&mut self, port: u32) -> Result<RawFd> {
        fcntl::open(&device_path(port), OFlag::O_RDWR, Mode::empty())
    }

    fn close(&mut self, fd: RawFd) -> Result<()> {
        nix::unistd::close(fd)
    }

    fn select(&mut self, fd: RawFd, address: u16) -> Result<()> {
        unsafe { ffi::i2c_slave(fd, libc::c_int::from(address)) }?;
        Ok(())
    }

    fn read_byte_data(&mut self, fd: RawFd, register: u8) -> Result<u8> {
        let mut data = ffi::SmbusData::default();
        Self::smbus(
            fd,
            ffi::I2C_SMBUS_READ,
            register,
            ffi::I2C_SMBUS_BYTE_DATA,
            &mut data,
        )?;
        Ok(data.byte())
    }

    fn write_byte_data(&mut self, fd: RawFd, register: u8, value: u8) -> Result<()> {
        let mut data = ffi::SmbusData::default();
        data.set_byte(value);
        Self::smbus(
            fd,
            ffi::I2C_SMBUS_WRITE,
            register,
            ffi::I2C_SMBUS_BYTE_DATA,
            &mut data,
        )
    }

    fn read_block_data(&mut self, fd: RawFd, register: u8, buffer: &mut [u8]) -> Result<usize> {
        let mut data = ffi::SmbusData::default();
        // The requested length goes out as-is; out-of-range requests are
        // the kernel's to reject.
        data.block[0] = buffer.len().min(u8::MAX as usize) as u8;
        Self::smbus(
            fd,
            ffi::I2C_SMBUS_READ,
            register,
            ffi::I2C_SMBUS_I2C_BLOCK_DATA,
            &mut data,
        )?;
        let n = (data.block[0] as usize)
            .min(buffer.len())
            .min(ffi::I2C_SMBUS_BLOCK_MAX);
        buffer[..n].copy_from_slice(&data.block[1..1 + n]);
        Ok(n)
    }

    fn write_block_data(&mut self, fd: RawFd, register: u8, buffer: &[u8]) -> Result<usize> {
        let mut data = ffi::SmbusData::default();
        // The true length goes on the wire so the kernel can police the
        // 32-byte block limit; only the copy into the fixed-size buffer is
        // clamped.
        data.block[0] = buffer.len().min(u8::MAX as usize) as u8;
        let n = buffer.len().min(ffi::I2C_SMBUS_BLOCK_MAX);
        data.block[1..1 + n].copy_from_slice(&buffer[..n]);
        Self::smbus(
            fd,
            ffi::I2C_SMBUS_WRITE,
            register,
            ffi::I2C_SMBUS_I2C_BLOCK_DATA,
            &mut data,
        )?;
        Ok(buffer.len())
    }

    fn transfer(&mut self, fd: RawFd, address: u16, messages: &mut [Transfer<'_>]) -> Result<()> {
        let mut msgs: Vec<ffi::I2cMsg> = messages
            .iter_mut()
            .map(|message| match message {
                Transfer::Write(buffer) => ffi::I2cMsg {
                    addr: address,
                    flags: 0,
                    len: buffer.len() as u16,
                    buf: buffer.as_ptr() as *mut u8,
                },
                Transfer::Read(buffer) => ffi::I2cMsg {
                    addr: address,
                    flags: ffi::I2C_M_RD,
                    len: buffer.len() as u16,
                    buf: buffer.as_mut_ptr(),
                },
            })
            .collect();
        let request = ffi::RdwrRequest {
            msgs: msgs.as_mut_ptr(),
            nmsgs: msgs.len() as u32,
        };
        unsafe { ffi::i2c_rdwr(fd, &request) }?;
        Ok(())
    }

    fn funcs(&mut self, fd: RawFd) -> Result<Funcs> {
        let mut raw: libc::c_ulong = 0;
        unsafe { ffi::i2c_funcs(fd, &mut raw) }?;
        Ok(Funcs::from_bits_truncate(raw as u32))
    }

    fn set_timeout(&mut self, fd: RawFd, timeout_ms: u32) -> Result<()> {
        // The kernel counts in units of 10ms.
        let ticks = (timeout_ms + 9) / 10;
        unsafe { ffi::i2c_timeout(fd, ticks as libc::c_int) }?;
        Ok(())
    }

    fn set_retries(&mut self, fd: RawFd, retries: u32) -> Result<()> {
        unsafe { ffi::i2c_retries(fd, retries as libc::c_int) }?;
        Ok(())
    }
}
