//! # VEML7700 Ambient Light Sensor Driver
//!
//! This is a platform-agnostic Rust driver for the Vishay VEML7700 high accuracy ambient light
//! sensor, built using the [`embedded-hal`] traits for I2C communication.
//!
//! The VEML7700 is a 16-bit ambient light sensor that provides:
//! - An ambient light (ALS) channel with a photopic response close to the human eye
//! - A white channel with a broader spectral response
//! - Programmable gain (1/8x to 2x)
//! - Programmable integration time (25ms to 800ms)
//! - Threshold window interrupts with configurable persistence
//! - I2C interface (address 0x10)
//!
//! ## Features
//!
//! - **Lux conversion** using the datasheet resolution for every gain/integration time pair
//! - **Auto-ranging** that steps gain and integration time to keep readings out of
//!   saturation and out of the noise floor
//! - **Async/await support** with feature gating (optional)
//! - **Interrupt support** with threshold windows and persistence
//! - **Power management** with shutdown and wake
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use veml7700::{Gain, IntegrationTime, Veml7700};
//!
//! # fn main() -> Result<(), veml7700::Error<embedded_hal::i2c::ErrorKind>> {
//! # let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
//! # let delay = embedded_hal_mock::eh1::delay::NoopDelay::new();
//! // Enables the sensor with gain 1/8 and 100ms integration time
//! let mut sensor = Veml7700::new(i2c, delay)?;
//!
//! // Optionally pick the starting point for auto-ranging
//! sensor.set_gain(Gain::OneQuarter)?;
//! sensor.set_integration_time(IntegrationTime::Ms200)?;
//!
//! // Wait for a full integration period after changing settings
//! // delay.delay_ms(sensor.integration_time().as_ms() as u32);
//!
//! let lux = sensor.read_lux()?;
//! let white = sensor.read_white()?;
//! // println!("Ambient light: {:.2} lux, white: {}", lux, white);
//! # let _ = (lux, white);
//! # Ok(())
//! # }
//! ```
//!
//! ## Async Usage
//!
//! Enable the `async` feature to use async/await patterns:
//!
//! ```toml
//! [dependencies]
//! veml7700 = { version = "0.1", features = ["async"] }
//! ```
//!
//! ```rust,ignore
//! use veml7700::Veml7700;
//!
//! let mut sensor = Veml7700::new_async(i2c, delay).await?;
//! let lux = sensor.read_lux_async().await?;
//! ```
//!
//! ## Logging
//!
//! - `defmt-03`: log through [`defmt`] and derive `defmt::Format` on public types.
//! - `log`: log through the [`log`] facade.
//!
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal
//! [`defmt`]: https://crates.io/crates/defmt
//! [`log`]: https://crates.io/crates/log

#![no_std]
#![deny(missing_docs)]
#![deny(unsafe_code)]

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod ll;

use core::fmt as core_fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as I2cError, ErrorKind, I2c};

#[cfg(feature = "async")]
use embedded_hal_async::{delay::DelayNs as AsyncDelayNs, i2c::I2c as AsyncI2c};

use ll::{register, DeviceInterface};

pub use ll::I2C_ADDRESS;

/// Number of times construction tries to enable the device before giving up
const INIT_ATTEMPTS: u8 = 3;

/// Default saturation threshold: 90% of the 16-bit ADC range
pub const SATURATION_THRESHOLD: u16 = ((u16::MAX as u32 * 90) / 100) as u16;

/// Default low-light threshold in counts
pub const LOW_LIGHT_THRESHOLD: u16 = 100;

/// Number of steps between the least and the most sensitive setting.
///
/// One auto-ranging read climbs at most this far and may then walk all the way
/// back down, so it makes at most twice this many configuration changes.
pub const MAX_AUTO_RANGE_STEPS: usize = Gain::LADDER.len() + IntegrationTime::LADDER.len() - 2;

/// Ambient light gain settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Gain {
    /// 1/8x gain
    OneEighth = 0b10,
    /// 1/4x gain
    OneQuarter = 0b11,
    /// 1x gain
    One = 0b00,
    /// 2x gain
    Two = 0b01,
}

impl Gain {
    /// All gains, least sensitive first
    pub const LADDER: [Gain; 4] = [Gain::OneEighth, Gain::OneQuarter, Gain::One, Gain::Two];

    /// Amplification factor
    pub const fn factor(self) -> f32 {
        match self {
            Gain::OneEighth => 0.125,
            Gain::OneQuarter => 0.25,
            Gain::One => 1.0,
            Gain::Two => 2.0,
        }
    }

    const fn index(self) -> usize {
        match self {
            Gain::OneEighth => 0,
            Gain::OneQuarter => 1,
            Gain::One => 2,
            Gain::Two => 3,
        }
    }

    const fn lower(self) -> Option<Self> {
        match self {
            Gain::OneEighth => None,
            Gain::OneQuarter => Some(Gain::OneEighth),
            Gain::One => Some(Gain::OneQuarter),
            Gain::Two => Some(Gain::One),
        }
    }

    const fn higher(self) -> Option<Self> {
        match self {
            Gain::OneEighth => Some(Gain::OneQuarter),
            Gain::OneQuarter => Some(Gain::One),
            Gain::One => Some(Gain::Two),
            Gain::Two => None,
        }
    }
}

impl TryFrom<f32> for Gain {
    type Error = InvalidArgument;

    fn try_from(factor: f32) -> Result<Self, Self::Error> {
        Gain::LADDER
            .into_iter()
            .find(|gain| gain.factor() == factor)
            .ok_or(InvalidArgument)
    }
}

/// Ambient light integration time settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum IntegrationTime {
    /// 25ms integration time
    Ms25 = 0b1100,
    /// 50ms integration time
    Ms50 = 0b1000,
    /// 100ms integration time
    Ms100 = 0b0000,
    /// 200ms integration time
    Ms200 = 0b0001,
    /// 400ms integration time
    Ms400 = 0b0010,
    /// 800ms integration time
    Ms800 = 0b0011,
}

impl IntegrationTime {
    /// All integration times, shortest first
    pub const LADDER: [IntegrationTime; 6] = [
        IntegrationTime::Ms25,
        IntegrationTime::Ms50,
        IntegrationTime::Ms100,
        IntegrationTime::Ms200,
        IntegrationTime::Ms400,
        IntegrationTime::Ms800,
    ];

    /// Integration time in milliseconds
    pub const fn as_ms(self) -> u16 {
        match self {
            IntegrationTime::Ms25 => 25,
            IntegrationTime::Ms50 => 50,
            IntegrationTime::Ms100 => 100,
            IntegrationTime::Ms200 => 200,
            IntegrationTime::Ms400 => 400,
            IntegrationTime::Ms800 => 800,
        }
    }

    const fn index(self) -> usize {
        match self {
            IntegrationTime::Ms25 => 0,
            IntegrationTime::Ms50 => 1,
            IntegrationTime::Ms100 => 2,
            IntegrationTime::Ms200 => 3,
            IntegrationTime::Ms400 => 4,
            IntegrationTime::Ms800 => 5,
        }
    }

    const fn shorter(self) -> Option<Self> {
        match self {
            IntegrationTime::Ms25 => None,
            IntegrationTime::Ms50 => Some(IntegrationTime::Ms25),
            IntegrationTime::Ms100 => Some(IntegrationTime::Ms50),
            IntegrationTime::Ms200 => Some(IntegrationTime::Ms100),
            IntegrationTime::Ms400 => Some(IntegrationTime::Ms200),
            IntegrationTime::Ms800 => Some(IntegrationTime::Ms400),
        }
    }

    const fn longer(self) -> Option<Self> {
        match self {
            IntegrationTime::Ms25 => Some(IntegrationTime::Ms50),
            IntegrationTime::Ms50 => Some(IntegrationTime::Ms100),
            IntegrationTime::Ms100 => Some(IntegrationTime::Ms200),
            IntegrationTime::Ms200 => Some(IntegrationTime::Ms400),
            IntegrationTime::Ms400 => Some(IntegrationTime::Ms800),
            IntegrationTime::Ms800 => None,
        }
    }
}

impl TryFrom<u16> for IntegrationTime {
    type Error = InvalidArgument;

    fn try_from(ms: u16) -> Result<Self, Self::Error> {
        IntegrationTime::LADDER
            .into_iter()
            .find(|time| time.as_ms() == ms)
            .ok_or(InvalidArgument)
    }
}

/// Number of consecutive out-of-window samples needed to raise an interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Persistence {
    /// Every sample
    One = 0b00,
    /// 2 consecutive samples
    Two = 0b01,
    /// 4 consecutive samples
    Four = 0b10,
    /// 8 consecutive samples
    Eight = 0b11,
}

impl TryFrom<u8> for Persistence {
    type Error = InvalidArgument;

    fn try_from(samples: u8) -> Result<Self, Self::Error> {
        match samples {
            1 => Ok(Persistence::One),
            2 => Ok(Persistence::Two),
            4 => Ok(Persistence::Four),
            8 => Ok(Persistence::Eight),
            _ => Err(InvalidArgument),
        }
    }
}

/// Mirror of the `ALS_CONF` register
///
/// The bit layout lives in [`Config::bits`] and [`Config::from_bits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Config {
    /// Gain
    pub gain: Gain,
    /// Integration time
    pub integration_time: IntegrationTime,
    /// Interrupt persistence
    pub persistence: Persistence,
    /// True if the threshold interrupt is enabled
    pub interrupt_enabled: bool,
    /// True if the sensor is shut down
    pub shutdown: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gain: Gain::OneEighth,
            integration_time: IntegrationTime::Ms100,
            persistence: Persistence::One,
            interrupt_enabled: false,
            shutdown: false,
        }
    }
}

impl Config {
    /// Lux per count for this gain and integration time
    pub const fn resolution(&self) -> f32 {
        resolution(self.gain, self.integration_time)
    }

    /// The next less sensitive setting: lower gain first, then shorter integration time.
    ///
    /// Returns `None` at gain 1/8 and 25ms.
    pub fn step_down(&self) -> Option<Config> {
        if let Some(gain) = self.gain.lower() {
            return Some(Config { gain, ..*self });
        }
        self.integration_time
            .shorter()
            .map(|integration_time| Config {
                integration_time,
                ..*self
            })
    }

    /// The next more sensitive setting: higher gain first, then longer integration time.
    ///
    /// Returns `None` at gain 2 and 800ms.
    pub fn step_up(&self) -> Option<Config> {
        if let Some(gain) = self.gain.higher() {
            return Some(Config { gain, ..*self });
        }
        self.integration_time
            .longer()
            .map(|integration_time| Config {
                integration_time,
                ..*self
            })
    }
}

// Datasheet lux per count: 0.0036 at gain 2 / 800ms, doubling for every halving
// of gain or integration time.
// [gain_index][integration_time_index] = lux_per_count
const RESOLUTION_TABLE: [[f32; 6]; 4] = [
    // Gain 1/8: 25ms, 50ms, 100ms, 200ms, 400ms, 800ms
    [1.8432, 0.9216, 0.4608, 0.2304, 0.1152, 0.0576],
    // Gain 1/4
    [0.9216, 0.4608, 0.2304, 0.1152, 0.0576, 0.0288],
    // Gain 1
    [0.2304, 0.1152, 0.0576, 0.0288, 0.0144, 0.0072],
    // Gain 2
    [0.1152, 0.0576, 0.0288, 0.0144, 0.0072, 0.0036],
];

/// Lux per count for a gain and integration time pair
pub const fn resolution(gain: Gain, integration_time: IntegrationTime) -> f32 {
    RESOLUTION_TABLE[gain.index()][integration_time.index()]
}

/// Non-linearity correction from the VEML7700 application note
///
/// Worth applying above roughly 1000 lux at gain 1/4 and 1/8.
pub fn correct_lux(lux: f32) -> f32 {
    6.0135e-13 * libm::powf(lux, 4.0) - 9.3924e-9 * libm::powf(lux, 3.0)
        + 8.1488e-5 * libm::powf(lux, 2.0)
        + 1.0023 * lux
}

/// Auto-ranging settings used by [`Veml7700::read_lux`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct AutoRange {
    /// True if `read_lux` may change gain and integration time
    pub enabled: bool,
    /// Counts below this step sensitivity up
    pub low: u16,
    /// Counts at or above this step sensitivity down
    pub high: u16,
}

impl Default for AutoRange {
    fn default() -> Self {
        AutoRange {
            enabled: true,
            low: LOW_LIGHT_THRESHOLD,
            high: SATURATION_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Plan {
    Accept,
    StepDown(Config),
    StepUp(Config),
}

impl AutoRange {
    /// Decide the next move for a raw count taken with `config`.
    ///
    /// Once a read has stepped down it never steps back up.
    fn plan(&self, config: &Config, raw: u16, stepped_down: bool) -> Plan {
        if !self.enabled {
            return Plan::Accept;
        }
        if raw >= self.high {
            return match config.step_down() {
                Some(next) => Plan::StepDown(next),
                None => Plan::Accept,
            };
        }
        if raw < self.low && !stepped_down {
            if let Some(next) = config.step_up() {
                return Plan::StepUp(next);
            }
        }
        Plan::Accept
    }
}

/// Time to wait after switching from `previous` to `next` before a read
/// reflects the new setting: the cycle in flight plus one full new cycle.
fn settle_ms(previous: &Config, next: &Config) -> u32 {
    u32::from(previous.integration_time.as_ms()) + u32::from(next.integration_time.as_ms())
}

/// Threshold interrupt flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct InterruptStatus {
    /// True if the high threshold was exceeded
    pub high_threshold_exceeded: bool,
    /// True if the reading dropped below the low threshold
    pub low_threshold_exceeded: bool,
}

/// A value outside the set the device supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct InvalidArgument;

impl core_fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut core_fmt::Formatter<'_>) -> core_fmt::Result {
        f.write_str("value not supported by the VEML7700")
    }
}

impl core::error::Error for InvalidArgument {}

/// All possible errors in this crate
#[derive(Debug)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error<E> {
    /// I2C communication error
    I2c(E),
    /// The device did not acknowledge its address during construction
    DeviceNotFound,
    /// Unsupported gain, integration time or threshold value
    InvalidArgument,
    /// Measurement requested while the sensor is shut down
    Shutdown,
    /// The reading is clipped at the least sensitive setting
    Saturated,
}

impl<E> From<InvalidArgument> for Error<E> {
    fn from(_: InvalidArgument) -> Self {
        Error::InvalidArgument
    }
}

impl<E: core_fmt::Debug> core_fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core_fmt::Formatter<'_>) -> core_fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "I2C error: {:?}", e),
            Error::DeviceNotFound => f.write_str("VEML7700 did not acknowledge"),
            Error::InvalidArgument => core_fmt::Display::fmt(&InvalidArgument, f),
            Error::Shutdown => f.write_str("sensor is shut down"),
            Error::Saturated => f.write_str("ambient light exceeds the sensor range"),
        }
    }
}

impl<E: core_fmt::Debug> core::error::Error for Error<E> {}

fn is_nack<E: I2cError>(error: &E) -> bool {
    matches!(error.kind(), ErrorKind::NoAcknowledge(_))
}

/// High-level VEML7700 driver
pub struct Veml7700<I2C, D> {
    iface: DeviceInterface<I2C>,
    delay: D,
    config: Config,
    auto_range: AutoRange,
    lux_correction: bool,
}

impl<I2C, D> Veml7700<I2C, D> {
    fn unchecked(i2c: I2C, delay: D, config: Config) -> Self {
        Self {
            iface: DeviceInterface { i2c },
            delay,
            config,
            auto_range: AutoRange::default(),
            lux_correction: false,
        }
    }

    /// Current configuration as last written to the device
    pub fn config(&self) -> Config {
        self.config
    }

    /// Current gain
    pub fn gain(&self) -> Gain {
        self.config.gain
    }

    /// Current integration time
    pub fn integration_time(&self) -> IntegrationTime {
        self.config.integration_time
    }

    /// True if the sensor is shut down
    pub fn is_shutdown(&self) -> bool {
        self.config.shutdown
    }

    /// Lux per count at the current settings
    pub fn resolution(&self) -> f32 {
        self.config.resolution()
    }

    /// Current auto-ranging settings
    pub fn auto_range(&self) -> AutoRange {
        self.auto_range
    }

    /// Enable or disable auto-ranging in [`Veml7700::read_lux`]
    pub fn set_auto_range(&mut self, enabled: bool) {
        self.auto_range.enabled = enabled;
    }

    /// Set the counts below which sensitivity is raised and at or above which it is lowered
    pub fn set_auto_range_thresholds(&mut self, low: u16, high: u16) -> Result<(), InvalidArgument> {
        if low >= high {
            return Err(InvalidArgument);
        }
        self.auto_range.low = low;
        self.auto_range.high = high;
        Ok(())
    }

    /// Apply [`correct_lux`] to every lux reading
    pub fn set_lux_correction(&mut self, enabled: bool) {
        self.lux_correction = enabled;
    }

    /// Raw count that corresponds to `lux` at the current settings, for interrupt thresholds
    pub fn lux_to_counts(&self, lux: f32) -> u16 {
        libm::roundf(lux / self.resolution()) as u16
    }

    /// Destroy the driver and return the I2C interface and delay
    pub fn destroy(self) -> (I2C, D) {
        (self.iface.i2c, self.delay)
    }

    fn convert<E>(&self, raw: u16) -> Result<f32, Error<E>> {
        if raw == u16::MAX {
            warn!("ALS saturated at {:?}/{:?}", self.config.gain, self.config.integration_time);
            return Err(Error::Saturated);
        }
        let lux = f32::from(raw) * self.resolution();
        Ok(if self.lux_correction {
            correct_lux(lux)
        } else {
            lux
        })
    }
}

impl<I2C, D> Veml7700<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Create a driver and enable the sensor with the default configuration
    ///
    /// Gain 1/8, 100ms integration time, interrupt disabled.
    pub fn new(i2c: I2C, delay: D) -> Result<Self, Error<I2C::Error>> {
        Self::with_config(i2c, delay, Config::default())
    }

    /// Create a driver and write `config` to the sensor
    pub fn with_config(i2c: I2C, delay: D, config: Config) -> Result<Self, Error<I2C::Error>> {
        let mut sensor = Self::unchecked(i2c, delay, config);
        let mut attempt = 1;
        // DeviceNotFound only if every attempt went unacknowledged
        let mut all_nack = true;
        loop {
            match sensor.iface.write_register(register::ALS_CONF, config.bits()) {
                Ok(()) => break,
                Err(e) if attempt < INIT_ATTEMPTS => {
                    debug!("enable attempt {} failed: {:?}", attempt, e.kind());
                    all_nack &= is_nack(&e);
                    attempt += 1;
                }
                Err(e) if all_nack && is_nack(&e) => return Err(Error::DeviceNotFound),
                Err(e) => return Err(Error::I2c(e)),
            }
        }
        debug!("VEML7700 configured: {:?}", config);
        Ok(sensor)
    }

    /// Read the ambient light in lux, auto-ranging first if enabled
    ///
    /// Auto-ranging changes gain and integration time one step at a time, waiting for
    /// the new setting to take effect before reading again. The settings it lands on
    /// stay in place and are visible through [`Veml7700::gain`] and
    /// [`Veml7700::integration_time`].
    pub fn read_lux(&mut self) -> Result<f32, Error<I2C::Error>> {
        if self.config.shutdown {
            return Err(Error::Shutdown);
        }
        let mut raw = self.read_raw_ambient()?;
        let mut stepped_down = false;
        for _ in 0..2 * MAX_AUTO_RANGE_STEPS {
            let next = match self.auto_range.plan(&self.config, raw, stepped_down) {
                Plan::Accept => break,
                Plan::StepDown(next) => {
                    stepped_down = true;
                    next
                }
                Plan::StepUp(next) => next,
            };
            debug!(
                "auto-range at {}: {:?}/{:?} -> {:?}/{:?}",
                raw,
                self.config.gain,
                self.config.integration_time,
                next.gain,
                next.integration_time
            );
            let wait = settle_ms(&self.config, &next);
            self.apply(next)?;
            self.delay.delay_ms(wait);
            raw = self.read_raw_ambient()?;
        }
        self.convert(raw)
    }

    /// Alias of [`Veml7700::read_lux`]
    pub fn lux(&mut self) -> Result<f32, Error<I2C::Error>> {
        self.read_lux()
    }

    /// Alias of [`Veml7700::read_lux`]
    pub fn light(&mut self) -> Result<f32, Error<I2C::Error>> {
        self.read_lux()
    }

    /// Read the raw ambient light count
    pub fn read_raw_ambient(&mut self) -> Result<u16, Error<I2C::Error>> {
        self.iface
            .read_register(register::ALS)
            .map_err(Error::I2c)
    }

    /// Read the raw white channel count
    pub fn read_white(&mut self) -> Result<u16, Error<I2C::Error>> {
        self.iface
            .read_register(register::WHITE)
            .map_err(Error::I2c)
    }

    /// Alias of [`Veml7700::read_white`]
    pub fn white(&mut self) -> Result<u16, Error<I2C::Error>> {
        self.read_white()
    }

    /// Set the gain
    ///
    /// Readings are only meaningful after one integration period has elapsed.
    pub fn set_gain(&mut self, gain: Gain) -> Result<(), Error<I2C::Error>> {
        self.apply(Config { gain, ..self.config })
    }

    /// Set the gain from its numeric factor, e.g. `0.25`
    pub fn set_gain_factor(&mut self, factor: f32) -> Result<(), Error<I2C::Error>> {
        let gain = Gain::try_from(factor)?;
        self.set_gain(gain)
    }

    /// Set the integration time
    ///
    /// Readings are only meaningful after one integration period has elapsed.
    pub fn set_integration_time(
        &mut self,
        integration_time: IntegrationTime,
    ) -> Result<(), Error<I2C::Error>> {
        self.apply(Config {
            integration_time,
            ..self.config
        })
    }

    /// Set the integration time in milliseconds
    pub fn set_integration_time_ms(&mut self, ms: u16) -> Result<(), Error<I2C::Error>> {
        let integration_time = IntegrationTime::try_from(ms)?;
        self.set_integration_time(integration_time)
    }

    /// Set the interrupt persistence
    pub fn set_persistence(&mut self, persistence: Persistence) -> Result<(), Error<I2C::Error>> {
        self.apply(Config {
            persistence,
            ..self.config
        })
    }

    /// Enable or disable the threshold interrupt
    pub fn enable_interrupt(&mut self, enable: bool) -> Result<(), Error<I2C::Error>> {
        self.apply(Config {
            interrupt_enabled: enable,
            ..self.config
        })
    }

    /// Shut the sensor down
    pub fn shutdown(&mut self) -> Result<(), Error<I2C::Error>> {
        self.apply(Config {
            shutdown: true,
            ..self.config
        })
    }

    /// Power the sensor back up
    pub fn wake(&mut self) -> Result<(), Error<I2C::Error>> {
        self.apply(Config {
            shutdown: false,
            ..self.config
        })
    }

    /// Set the high threshold window in raw counts
    pub fn set_high_threshold(&mut self, counts: u16) -> Result<(), Error<I2C::Error>> {
        self.iface
            .write_register(register::ALS_WH, counts)
            .map_err(Error::I2c)
    }

    /// Set the low threshold window in raw counts
    pub fn set_low_threshold(&mut self, counts: u16) -> Result<(), Error<I2C::Error>> {
        self.iface
            .write_register(register::ALS_WL, counts)
            .map_err(Error::I2c)
    }

    /// Read the high threshold window
    pub fn high_threshold(&mut self) -> Result<u16, Error<I2C::Error>> {
        self.iface
            .read_register(register::ALS_WH)
            .map_err(Error::I2c)
    }

    /// Read the low threshold window
    pub fn low_threshold(&mut self) -> Result<u16, Error<I2C::Error>> {
        self.iface
            .read_register(register::ALS_WL)
            .map_err(Error::I2c)
    }

    /// Read and clear the threshold interrupt flags
    pub fn read_interrupt_status(&mut self) -> Result<InterruptStatus, Error<I2C::Error>> {
        let bits = self
            .iface
            .read_register(register::ALS_INT)
            .map_err(Error::I2c)?;
        Ok(InterruptStatus::from_bits(bits))
    }

    fn apply(&mut self, config: Config) -> Result<(), Error<I2C::Error>> {
        self.iface
            .write_register(register::ALS_CONF, config.bits())
            .map_err(Error::I2c)?;
        self.config = config;
        Ok(())
    }
}

#[cfg(feature = "async")]
impl<I2C, D> Veml7700<I2C, D>
where
    I2C: AsyncI2c,
    D: AsyncDelayNs,
{
    /// Create a driver and enable the sensor with the default configuration (async version)
    pub async fn new_async(i2c: I2C, delay: D) -> Result<Self, Error<I2C::Error>> {
        Self::with_config_async(i2c, delay, Config::default()).await
    }

    /// Create a driver and write `config` to the sensor (async version)
    pub async fn with_config_async(
        i2c: I2C,
        delay: D,
        config: Config,
    ) -> Result<Self, Error<I2C::Error>> {
        let mut sensor = Self::unchecked(i2c, delay, config);
        let mut attempt = 1;
        // DeviceNotFound only if every attempt went unacknowledged
        let mut all_nack = true;
        loop {
            match sensor
                .iface
                .write_register_async(register::ALS_CONF, config.bits())
                .await
            {
                Ok(()) => break,
                Err(e) if attempt < INIT_ATTEMPTS => {
                    debug!("enable attempt {} failed: {:?}", attempt, e.kind());
                    all_nack &= is_nack(&e);
                    attempt += 1;
                }
                Err(e) if all_nack && is_nack(&e) => return Err(Error::DeviceNotFound),
                Err(e) => return Err(Error::I2c(e)),
            }
        }
        debug!("VEML7700 configured: {:?}", config);
        Ok(sensor)
    }

    /// Read the ambient light in lux, auto-ranging first if enabled (async version)
    pub async fn read_lux_async(&mut self) -> Result<f32, Error<I2C::Error>> {
        if self.config.shutdown {
            return Err(Error::Shutdown);
        }
        let mut raw = self.read_raw_ambient_async().await?;
        let mut stepped_down = false;
        for _ in 0..2 * MAX_AUTO_RANGE_STEPS {
            let next = match self.auto_range.plan(&self.config, raw, stepped_down) {
                Plan::Accept => break,
                Plan::StepDown(next) => {
                    stepped_down = true;
                    next
                }
                Plan::StepUp(next) => next,
            };
            debug!(
                "auto-range at {}: {:?}/{:?} -> {:?}/{:?}",
                raw,
                self.config.gain,
                self.config.integration_time,
                next.gain,
                next.integration_time
            );
            let wait = settle_ms(&self.config, &next);
            self.apply_async(next).await?;
            self.delay.delay_ms(wait).await;
            raw = self.read_raw_ambient_async().await?;
        }
        self.convert(raw)
    }

    /// Read the raw ambient light count (async version)
    pub async fn read_raw_ambient_async(&mut self) -> Result<u16, Error<I2C::Error>> {
        self.iface
            .read_register_async(register::ALS)
            .await
            .map_err(Error::I2c)
    }

    /// Read the raw white channel count (async version)
    pub async fn read_white_async(&mut self) -> Result<u16, Error<I2C::Error>> {
        self.iface
            .read_register_async(register::WHITE)
            .await
            .map_err(Error::I2c)
    }

    /// Set the gain (async version)
    pub async fn set_gain_async(&mut self, gain: Gain) -> Result<(), Error<I2C::Error>> {
        self.apply_async(Config { gain, ..self.config }).await
    }

    /// Set the integration time (async version)
    pub async fn set_integration_time_async(
        &mut self,
        integration_time: IntegrationTime,
    ) -> Result<(), Error<I2C::Error>> {
        self.apply_async(Config {
            integration_time,
            ..self.config
        })
        .await
    }

    /// Set the gain from its numeric factor (async version)
    pub async fn set_gain_factor_async(&mut self, factor: f32) -> Result<(), Error<I2C::Error>> {
        let gain = Gain::try_from(factor)?;
        self.set_gain_async(gain).await
    }

    /// Set the integration time in milliseconds (async version)
    pub async fn set_integration_time_ms_async(
        &mut self,
        ms: u16,
    ) -> Result<(), Error<I2C::Error>> {
        let integration_time = IntegrationTime::try_from(ms)?;
        self.set_integration_time_async(integration_time).await
    }

    /// Set the interrupt persistence (async version)
    pub async fn set_persistence_async(
        &mut self,
        persistence: Persistence,
    ) -> Result<(), Error<I2C::Error>> {
        self.apply_async(Config {
            persistence,
            ..self.config
        })
        .await
    }

    /// Enable or disable the threshold interrupt (async version)
    pub async fn enable_interrupt_async(&mut self, enable: bool) -> Result<(), Error<I2C::Error>> {
        self.apply_async(Config {
            interrupt_enabled: enable,
            ..self.config
        })
        .await
    }

    /// Shut the sensor down (async version)
    pub async fn shutdown_async(&mut self) -> Result<(), Error<I2C::Error>> {
        self.apply_async(Config {
            shutdown: true,
            ..self.config
        })
        .await
    }

    /// Power the sensor back up (async version)
    pub async fn wake_async(&mut self) -> Result<(), Error<I2C::Error>> {
        self.apply_async(Config {
            shutdown: false,
            ..self.config
        })
        .await
    }

    /// Set the high threshold window in raw counts (async version)
    pub async fn set_high_threshold_async(&mut self, counts: u16) -> Result<(), Error<I2C::Error>> {
        self.iface
            .write_register_async(register::ALS_WH, counts)
            .await
            .map_err(Error::I2c)
    }

    /// Set the low threshold window in raw counts (async version)
    pub async fn set_low_threshold_async(&mut self, counts: u16) -> Result<(), Error<I2C::Error>> {
        self.iface
            .write_register_async(register::ALS_WL, counts)
            .await
            .map_err(Error::I2c)
    }

    /// Read the high threshold window (async version)
    pub async fn high_threshold_async(&mut self) -> Result<u16, Error<I2C::Error>> {
        self.iface
            .read_register_async(register::ALS_WH)
            .await
            .map_err(Error::I2c)
    }

    /// Read the low threshold window (async version)
    pub async fn low_threshold_async(&mut self) -> Result<u16, Error<I2C::Error>> {
        self.iface
            .read_register_async(register::ALS_WL)
            .await
            .map_err(Error::I2c)
    }

    /// Read and clear the threshold interrupt flags (async version)
    pub async fn read_interrupt_status_async(
        &mut self,
    ) -> Result<InterruptStatus, Error<I2C::Error>> {
        let bits = self
            .iface
            .read_register_async(register::ALS_INT)
            .await
            .map_err(Error::I2c)?;
        Ok(InterruptStatus::from_bits(bits))
    }

    async fn apply_async(&mut self, config: Config) -> Result<(), Error<I2C::Error>> {
        self.iface
            .write_register_async(register::ALS_CONF, config.bits())
            .await
            .map_err(Error::I2c)?;
        self.config = config;
        Ok(())
    }
}
