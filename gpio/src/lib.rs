pub mod debounce;
pub mod dht;
pub mod gpiod;
pub mod i2c;
pub mod keypad;
pub mod lcd;
pub mod led;
pub mod raw;

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Specifies the active level of a GPIO pin.
///
/// By default, the active level is high.
///
/// Might be software-implemented.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default]
    High,
    Low,
}

impl GpioActiveLevel {
    /// Gets the real state of the GPIO pin based on the active level and the logical value.
    pub fn get_state(&self, value: bool) -> bool {
        match self {
            GpioActiveLevel::High => value,
            GpioActiveLevel::Low => !value,
        }
    }
}

/// Specifies the bias of a GPIO pin.
///
/// You can use this to enable pull-up or pull-down resistors.
/// These should work in both input and output modes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default]
    None,
    PullUp,
    PullDown,
}

/// Specifies the drive mode of a GPIO pin.
///
/// Works only in output mode.
///
/// By default, the drive mode is push-pull, which drives the pin high or low with low impedance.
/// There's also open-drain and open-source modes, that leave the pin floating when the output is
/// high or low, respectively.
///
/// Leaving the pin floating might be implemented by setting the pin to input mode.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioDriveMode {
    /// GPIO pin is driven high or low with low impedance.
    #[default]
    PushPull,
    /// GPIO pin is driven low or left floating when high.
    OpenDrain,
    /// GPIO pin is driven high or left floating when low.
    OpenSource,
}

impl GpioDriveMode {
    /// Gets the real state that will be outputted on the GPIO pin based on the drive mode
    /// and the value.
    ///
    /// # Returns
    /// - `Some(true)` if the pin will be driven high.
    /// - `Some(false)` if the pin will be driven low.
    /// - `None` if the pin will be left floating.
    pub fn get_state(&self, value: bool) -> Option<bool> {
        match self {
            GpioDriveMode::PushPull => Some(value),
            GpioDriveMode::OpenDrain => {
                if value {
                    None
                } else {
                    Some(false)
                }
            }
            GpioDriveMode::OpenSource => {
                if value {
                    Some(true)
                } else {
                    None
                }
            }
        }
    }
}

/// Options applied to a pin when it is opened.
#[derive(Copy, Clone, Debug, Default)]
pub struct PinOptions {
    pub active_level: GpioActiveLevel,
    pub bias: GpioBias,
    pub drive_mode: GpioDriveMode,
}

impl PinOptions {
    pub fn active_low(mut self) -> Self {
        self.active_level = GpioActiveLevel::Low;
        self
    }

    pub fn with_bias(mut self, bias: GpioBias) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_drive_mode(mut self, mode: GpioDriveMode) -> Self {
        self.drive_mode = mode;
        self
    }
}

/// A GPIO backend that can hand out pins.
///
/// A pin is claimed when it is opened and released again when the returned handle is dropped,
/// so a pin can only be held by one consumer at a time.
pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Opens the GPIO pin at the given index as an input.
    fn open_input(&self, index: usize, options: PinOptions) -> GpioResult<Box<dyn GpioInput + '_>>;

    /// Opens the GPIO pin at the given index as an output.
    fn open_output(&self, index: usize, options: PinOptions)
    -> GpioResult<Box<dyn GpioOutput + '_>>;
}

pub trait GpioInput: Debug {
    /// Reads the logical state of the GPIO pin.
    fn read(&self) -> GpioResult<bool>;
}

pub trait GpioOutput: Debug {
    /// Writes the logical state of the GPIO pin.
    fn write(&self, value: bool) -> GpioResult<()>;
}

/// A cloneable cancellation flag shared between the requester and a blocking call.
///
/// The flag is set once and never cleared; a cancelled token stays cancelled.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. All clones of this token observe the request.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(GpioError::Cancelled)` if cancellation has been requested.
    pub fn checkpoint(&self) -> GpioResult<()> {
        if self.is_cancelled() {
            Err(GpioError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_level_inverts_state() {
        assert!(GpioActiveLevel::High.get_state(true));
        assert!(!GpioActiveLevel::High.get_state(false));
        assert!(!GpioActiveLevel::Low.get_state(true));
        assert!(GpioActiveLevel::Low.get_state(false));
    }

    #[test]
    fn drive_mode_floats_the_inactive_side() {
        assert_eq!(GpioDriveMode::PushPull.get_state(true), Some(true));
        assert_eq!(GpioDriveMode::PushPull.get_state(false), Some(false));
        assert_eq!(GpioDriveMode::OpenDrain.get_state(true), None);
        assert_eq!(GpioDriveMode::OpenDrain.get_state(false), Some(false));
        assert_eq!(GpioDriveMode::OpenSource.get_state(true), Some(true));
        assert_eq!(GpioDriveMode::OpenSource.get_state(false), None);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.checkpoint().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.checkpoint(), Err(GpioError::Cancelled));
    }
}
