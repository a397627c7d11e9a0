//! [`embedded_hal::i2c::I2c`] for the controller, so embedded-hal driver
//! crates can run on top of a bus device node.
//!
//! Combined transactions go through `I2C_RDWR` and carry their address per
//! message; the `I2C_SLAVE` selection plays no role here. Note that the
//! controller's inherent register API shadows the same-named trait methods
//! on the concrete type; call through the trait (`I2c::write`, ...) when
//! both are in scope.

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};

use crate::bus::{I2cBus, Transfer};
use crate::controller::I2cController;
use crate::Errno;

/// Error of the [`I2c`] implementation, wrapping the raw OS code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError(pub Errno);

impl BusError {
    /// The underlying OS error code.
    pub fn errno(&self) -> Errno {
        self.0
    }
}

impl embedded_hal::i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        match self.0 {
            // Address or data byte not acked; the kernel does not say which.
            Errno::ENXIO | Errno::EREMOTEIO => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
            }
            Errno::EAGAIN => ErrorKind::ArbitrationLoss,
            _ => ErrorKind::Other,
        }
    }
}

impl<B: I2cBus> ErrorType for I2cController<B> {
    type Error = BusError;
}

impl<B: I2cBus> I2c for I2cController<B> {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut messages: Vec<Transfer<'_>> = operations
            .iter_mut()
            .map(|operation| match operation {
                Operation::Write(buffer) => Transfer::Write(buffer),
                Operation::Read(buffer) => Transfer::Read(buffer),
            })
            .collect();
        self.bus
            .transfer(self.handle, u16::from(address), &mut messages)
            .map_err(BusError)
    }
}
