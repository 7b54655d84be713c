//! Controller parameters and the snapshot of their last readings.

use std::fmt;

/// Readable controller parameters, named as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Fil,
    Emis,
    Flux,
    Hv,
    Temp,
    Emiscon,
}

impl Param {
    /// Order in which a refresh queries the controller.
    pub const REFRESH_ORDER: [Param; 6] = [
        Param::Fil,
        Param::Emis,
        Param::Flux,
        Param::Hv,
        Param::Temp,
        Param::Emiscon,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            Param::Fil => "Fil",
            Param::Emis => "Emis",
            Param::Flux => "Flux",
            Param::Hv => "HV",
            Param::Temp => "Temp",
            Param::Emiscon => "Emiscon",
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.wire_name())
    }
}

/// Parameters the controller accepts SET commands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setpoint {
    Hv,
    Emis,
}

impl Setpoint {
    pub const fn wire_name(self) -> &'static str {
        match self {
            Setpoint::Hv => "HV",
            Setpoint::Emis => "EMIS",
        }
    }

    pub const fn param(self) -> Param {
        match self {
            Setpoint::Hv => Param::Hv,
            Setpoint::Emis => Param::Emis,
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Setpoint::Hv => "V",
            Setpoint::Emis => "mA",
        }
    }
}

impl fmt::Display for Setpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A reading that is either known or explicitly unknown. Never a made-up
/// placeholder number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading<T = f64> {
    Known(T),
    Unknown,
}

impl<T> Default for Reading<T> {
    fn default() -> Self {
        Reading::Unknown
    }
}

impl<T: Copy> Reading<T> {
    pub fn value(&self) -> Option<T> {
        match self {
            Reading::Known(v) => Some(*v),
            Reading::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Reading::Known(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reading<U> {
        match self {
            Reading::Known(v) => Reading::Known(f(v)),
            Reading::Unknown => Reading::Unknown,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Reading<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Known(v) => v.fmt(f),
            // write_str: a precision like {:.2} must not truncate the word
            Reading::Unknown => f.write_str("unknown"),
        }
    }
}

/// Which supply the controller is actively regulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionMode {
    EmissionControlled,
    FilamentControlled,
}

impl EmissionMode {
    /// The controller reports 0 for emission control, anything else for
    /// filament control.
    pub fn from_reading(v: f64) -> Self {
        if v.abs() < 0.5 {
            EmissionMode::EmissionControlled
        } else {
            EmissionMode::FilamentControlled
        }
    }
}

impl fmt::Display for EmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            EmissionMode::EmissionControlled => "emission",
            EmissionMode::FilamentControlled => "filament",
        })
    }
}

/// Last-known readings of every controller parameter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParameterSnapshot {
    /// A
    pub filament_current: Reading,
    /// mA
    pub emission_current: Reading,
    /// nA, already scaled from raw controller units
    pub flux: Reading,
    /// V
    pub high_voltage: Reading,
    /// °C
    pub temperature: Reading,
    pub emission_mode: Reading<EmissionMode>,
}

impl ParameterSnapshot {
    pub fn reading(&self, param: Param) -> Reading {
        match param {
            Param::Fil => self.filament_current,
            Param::Emis => self.emission_current,
            Param::Flux => self.flux,
            Param::Hv => self.high_voltage,
            Param::Temp => self.temperature,
            Param::Emiscon => self.emission_mode.map(|m| match m {
                EmissionMode::EmissionControlled => 0.0,
                EmissionMode::FilamentControlled => 1.0,
            }),
        }
    }

    pub fn setpoint(&self, setpoint: Setpoint) -> Reading {
        self.reading(setpoint.param())
    }

    pub(crate) fn set_setpoint(&mut self, setpoint: Setpoint, value: Reading) {
        match setpoint {
            Setpoint::Hv => self.high_voltage = value,
            Setpoint::Emis => self.emission_current = value,
        }
    }

    /// Number of fields that could not be read.
    pub fn unknown_count(&self) -> usize {
        [
            self.filament_current,
            self.emission_current,
            self.flux,
            self.high_voltage,
            self.temperature,
        ]
        .iter()
        .filter(|r| !r.is_known())
        .count()
            + usize::from(!self.emission_mode.is_known())
    }
}

/// Operator status block.
impl fmt::Display for ParameterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "FIL  {:.2} A     EMIS  {:.1} mA",
            self.filament_current, self.emission_current
        )?;
        writeln!(
            f,
            "FLUX  {:.1} nA   VOLT  {:.0} V",
            self.flux, self.high_voltage
        )?;
        write!(
            f,
            "TMP  {:.1} C     MODE  {}",
            self.temperature, self.emission_mode
        )
    }
}
