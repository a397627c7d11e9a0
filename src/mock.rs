//! A simulated `/dev/i2c-*` universe for the test suite: a table of
//! existing bus nodes, descriptor bookkeeping, and slave devices modeled
//! as 256-byte register files with an auto-incrementing register pointer.
//!
//! Error behavior mirrors the kernel: `ENOENT` for a missing node, `EBADF`
//! for a dead descriptor, `EBUSY` for a claimed address, `ENXIO` for an
//! unacknowledged one, `EINVAL` for block transfers outside the SMBus
//! limit. Descriptors grow monotonically and are never reused, so a stale
//! handle can never alias a fresh one.

use std::collections::HashMap;
use std::os::unix::io::RawFd;

use crate::bus::{Funcs, I2cBus, Transfer};
use crate::ffi::I2C_SMBUS_BLOCK_MAX;
use crate::{Errno, Result};

#[derive(Debug)]
struct Slave {
    regs: [u8; 256],
    pointer: u8,
}

impl Slave {
    fn new() -> Self {
        Self {
            regs: [0; 256],
            pointer: 0,
        }
    }
}

#[derive(Debug)]
pub(crate) struct MockBus {
    ports: Vec<u32>,
    busy: Vec<u16>,
    slaves: HashMap<u16, Slave>,
    /// Open descriptors and the address selected on each, if any.
    open: HashMap<RawFd, Option<u16>>,
    next_fd: RawFd,
    pub(crate) timeout_ms: Option<u32>,
    pub(crate) retries: Option<u32>,
}

impl MockBus {
    pub(crate) fn new() -> Self {
        Self {
            ports: Vec::new(),
            busy: Vec::new(),
            slaves: HashMap::new(),
            open: HashMap::new(),
            next_fd: 3,
            timeout_ms: None,
            retries: None,
        }
    }

    /// Makes `/dev/i2c-<port>` exist.
    pub(crate) fn with_port(mut self, port: u32) -> Self {
        self.ports.push(port);
        self
    }

    /// Attaches a slave with an all-zero register file at `address`.
    pub(crate) fn with_slave(mut self, address: u16) -> Self {
        self.slaves.insert(address, Slave::new());
        self
    }

    /// Marks `address` as claimed by another driver (`EBUSY` on select).
    pub(crate) fn with_busy(mut self, address: u16) -> Self {
        self.busy.push(address);
        self
    }

    fn selected(&self, fd: RawFd) -> Result<u16> {
        self.open
            .get(&fd)
            .copied()
            .ok_or(Errno::EBADF)?
            .ok_or(Errno::ENXIO)
    }

    fn slave(&mut self, fd: RawFd) -> Result<&mut Slave> {
        let address = self.selected(fd)?;
        self.slaves.get_mut(&address).ok_or(Errno::ENXIO)
    }
}

impl I2cBus for MockBus {
    fn open(&mut self, port: u32) -> Result<RawFd> {
        if !self.ports.contains(&port) {
            return Err(Errno::ENOENT);
        }
        let fd = self.next_fd;
        self.next_fd += 1;
        self.open.insert(fd, None);
        Ok(fd)
    }

    fn close(&mut self, fd: RawFd) -> Result<()> {
        self.open.remove(&fd).map(drop).ok_or(Errno::EBADF)
    }

    fn select(&mut self, fd: RawFd, address: u16) -> Result<()> {
        let slot = self.open.get_mut(&fd).ok_or(Errno::EBADF)?;
        if self.busy.contains(&address) {
            return Err(Errno::EBUSY);
        }
        // Selecting an absent address succeeds, just like the kernel; the
        // NAK only shows up on the first transaction.
        *slot = Some(address);
        Ok(())
    }

    fn read_byte_data(&mut self, fd: RawFd, register: u8) -> Result<u8> {
        Ok(self.slave(fd)?.regs[register as usize])
    }

    fn write_byte_data(&mut self, fd: RawFd, register: u8, value: u8) -> Result<()> {
        self.slave(fd)?.regs[register as usize] = value;
        Ok(())
    }

    fn read_block_data(&mut self, fd: RawFd, register: u8, buffer: &mut [u8]) -> Result<usize> {
        if buffer.is_empty() || buffer.len() > I2C_SMBUS_BLOCK_MAX {
            return Err(Errno::EINVAL);
        }
        let slave = self.slave(fd)?;
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = slave.regs[(register as usize + i) % 256];
        }
        Ok(buffer.len())
    }

    fn write_block_data(&mut self, fd: RawFd, register: u8, buffer: &[u8]) -> Result<usize> {
        if buffer.len() > I2C_SMBUS_BLOCK_MAX {
            return Err(Errno::EINVAL);
        }
        let slave = self.slave(fd)?;
        for (i, &byte) in buffer.iter().enumerate() {
            slave.regs[(register as usize + i) % 256] = byte;
        }
        Ok(buffer.len())
    }

    fn transfer(&mut self, fd: RawFd, address: u16, messages: &mut [Transfer<'_>]) -> Result<()> {
        if !self.open.contains_key(&fd) {
            return Err(Errno::EBADF);
        }
        if self.busy.contains(&address) {
            return Err(Errno::EBUSY);
        }
        let slave = self.slaves.get_mut(&address).ok_or(Errno::ENXIO)?;
        for message in messages {
            match message {
                Transfer::Write(buffer) => {
                    if let Some((&register, rest)) = buffer.split_first() {
                        slave.pointer = register;
                        for &byte in rest {
                            let at = slave.pointer as usize;
                            slave.regs[at] = byte;
                            slave.pointer = slave.pointer.wrapping_add(1);
                        }
                    }
                }
                Transfer::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        let at = slave.pointer as usize;
                        *byte = slave.regs[at];
                        slave.pointer = slave.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }

    fn funcs(&mut self, fd: RawFd) -> Result<Funcs> {
        if !self.open.contains_key(&fd) {
            return Err(Errno::EBADF);
        }
        Ok(Funcs::I2C
            | Funcs::SMBUS_READ_BYTE_DATA
            | Funcs::SMBUS_WRITE_BYTE_DATA
            | Funcs::SMBUS_READ_I2C_BLOCK
            | Funcs::SMBUS_WRITE_I2C_BLOCK)
    }

    fn set_timeout(&mut self, fd: RawFd, timeout_ms: u32) -> Result<()> {
        if !self.open.contains_key(&fd) {
            return Err(Errno::EBADF);
        }
        self.timeout_ms = Some(timeout_ms);
        Ok(())
    }

    fn set_retries(&mut self, fd: RawFd, retries: u32) -> Result<()> {
        if !self.open.contains_key(&fd) {
            return Err(Errno::EBADF);
        }
        self.retries = Some(retries);
        Ok(())
    }
}
