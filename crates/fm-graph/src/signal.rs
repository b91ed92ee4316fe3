//! Signals: named scalar wires between one producing block and any number
//! of consuming block ports.

use fm_core::BlockId;
use serde::Serialize;

/// One end of a wire: a block and one of its ports.
///
/// For a producer the port is always 0 (blocks have a single output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub block: BlockId,
    pub port: usize,
}

impl Endpoint {
    pub fn new(block: BlockId, port: usize) -> Self {
        Self { block, port }
    }
}

/// Role flags carried by a variable declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SignalFlags {
    pub input: bool,
    pub output: bool,
    pub control: bool,
    pub disturbance: bool,
    pub state: bool,
    pub state_deriv: bool,
    /// Created while wiring; not present in the source document.
    pub derived: bool,
}

impl SignalFlags {
    /// Declared as something the caller drives from outside.
    pub fn is_external_input(&self) -> bool {
        self.input || self.control || self.disturbance
    }
}

/// A named wire carrying one scalar value.
///
/// Identity is the `var_id`. The display `name` may differ and may be
/// suffixed when the signal is split by a limiter.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub(crate) var_id: String,
    pub(crate) name: String,
    pub(crate) units: String,
    pub(crate) lower: f64,
    pub(crate) upper: f64,
    pub(crate) flags: SignalFlags,
    pub(crate) initial_value: Option<f64>,
    /// Set once a limiter has been spliced onto this signal.
    pub(crate) limited: bool,
    pub(crate) source: Option<Endpoint>,
    pub(crate) sinks: Vec<Endpoint>,
}

impl Signal {
    /// Create an unwired signal with no limits and no flags.
    pub fn new(
        var_id: impl Into<String>,
        name: impl Into<String>,
        units: impl Into<String>,
    ) -> Self {
        Self {
            var_id: var_id.into(),
            name: name.into(),
            units: units.into(),
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
            flags: SignalFlags::default(),
            initial_value: None,
            limited: false,
            source: None,
            sinks: Vec::new(),
        }
    }

    /// Create a synthetic signal whose name equals its ID.
    pub(crate) fn derived(var_id: impl Into<String>, units: impl Into<String>) -> Self {
        let var_id = var_id.into();
        let mut signal = Self::new(var_id.clone(), var_id, units);
        signal.flags.derived = true;
        signal
    }

    pub fn with_flags(mut self, flags: SignalFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_limits(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.lower = lower.unwrap_or(f64::NEG_INFINITY);
        self.upper = upper.unwrap_or(f64::INFINITY);
        self
    }

    pub fn with_initial_value(mut self, value: f64) -> Self {
        self.initial_value = Some(value);
        self
    }

    pub fn as_input(mut self) -> Self {
        self.flags.input = true;
        self
    }

    pub fn as_output(mut self) -> Self {
        self.flags.output = true;
        self
    }

    pub fn var_id(&self) -> &str {
        &self.var_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn flags(&self) -> SignalFlags {
        self.flags
    }

    pub fn initial_value(&self) -> Option<f64> {
        self.initial_value
    }

    pub fn lower_limit(&self) -> f64 {
        self.lower
    }

    pub fn upper_limit(&self) -> f64 {
        self.upper
    }

    /// True if either bound is finite and no limiter has been spliced yet.
    pub fn needs_limiter(&self) -> bool {
        !self.limited && (self.lower.is_finite() || self.upper.is_finite())
    }

    /// The producing block, once wired.
    pub fn source(&self) -> Option<Endpoint> {
        self.source
    }

    /// Every consuming (block, port) pair.
    pub fn sinks(&self) -> &[Endpoint] {
        &self.sinks
    }

    pub(crate) fn add_source(&mut self, block: BlockId, port: usize) {
        self.source = Some(Endpoint::new(block, port));
    }

    pub(crate) fn push_sink(&mut self, block: BlockId, port: usize) {
        self.sinks.push(Endpoint::new(block, port));
    }
}
