//! Talk parameter bundle and cast descriptions.
//!
//! [`TalkParams`] carries a fixed set of engine parameters together with a
//! set-membership bitmap: a field is only meaningful to a receiver when its
//! flag is set. This is what lets a client say "change pitch, leave speed
//! alone": a cleared flag means "unchanged", not "zero". The dense
//! `values` array additionally carries up to [`MAX_PARAMS`] cast-specific
//! coefficients, `num_params` of which are valid; their meaning is labeled
//! by the active cast's [`CastInfo::param_names`].

use serde::{Deserialize, Serialize};

pub use talkbridge_hook_api::MAX_PARAMS;

/// Identifies one explicitly settable sub-field of [`TalkParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ParamFlag {
    Mute = 0,
    ForceMono = 1,
    Volume = 2,
    Speed = 3,
    Pitch = 4,
    Intonation = 5,
    Alpha = 6,
    Normal = 7,
    Joy = 8,
    Anger = 9,
    Sorrow = 10,
    Cast = 11,
}

impl ParamFlag {
    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Index into the dense value array for the numeric coefficients.
    fn value_index(self) -> Option<usize> {
        match self {
            ParamFlag::Mute | ParamFlag::ForceMono | ParamFlag::Cast => None,
            other => Some(other as usize - 2),
        }
    }
}

/// Name table for the canonical numeric coefficients, in flag order.
///
/// Shared by the JSON adapter and the HTTP query parser.
pub const NAMED_FLOAT_PARAMS: &[(&str, ParamFlag)] = &[
    ("volume", ParamFlag::Volume),
    ("speed", ParamFlag::Speed),
    ("pitch", ParamFlag::Pitch),
    ("intonation", ParamFlag::Intonation),
    ("alpha", ParamFlag::Alpha),
    ("normal", ParamFlag::Normal),
    ("joy", ParamFlag::Joy),
    ("anger", ParamFlag::Anger),
    ("sorrow", ParamFlag::Sorrow),
];

macro_rules! named_accessors {
    ($(($name:ident, $setter:ident, $flag:ident)),* $(,)?) => {
        $(
            pub fn $name(&self) -> f32 {
                self.values[ParamFlag::$flag.value_index().unwrap()]
            }

            pub fn $setter(&mut self, v: f32) {
                self.set_value_flagged(ParamFlag::$flag, v);
            }
        )*
    };
}

/// Parameter bundle with explicit set-ness tracking.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TalkParams {
    mute: bool,
    force_mono: bool,
    cast: i32,
    num_params: usize,
    values: [f32; MAX_PARAMS],
    flags: u32,
}

impl TalkParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self, flag: ParamFlag) -> bool {
        self.flags & flag.bit() != 0
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn mute(&self) -> bool {
        self.mute
    }

    pub fn set_mute(&mut self, v: bool) {
        self.mute = v;
        self.flags |= ParamFlag::Mute.bit();
    }

    pub fn force_mono(&self) -> bool {
        self.force_mono
    }

    pub fn set_force_mono(&mut self, v: bool) {
        self.force_mono = v;
        self.flags |= ParamFlag::ForceMono.bit();
    }

    pub fn cast(&self) -> i32 {
        self.cast
    }

    pub fn set_cast(&mut self, v: i32) {
        self.cast = v;
        self.flags |= ParamFlag::Cast.bit();
    }

    named_accessors!(
        (volume, set_volume, Volume),
        (speed, set_speed, Speed),
        (pitch, set_pitch, Pitch),
        (intonation, set_intonation, Intonation),
        (alpha, set_alpha, Alpha),
        (normal, set_normal, Normal),
        (joy, set_joy, Joy),
        (anger, set_anger, Anger),
        (sorrow, set_sorrow, Sorrow),
    );

    fn set_value_flagged(&mut self, flag: ParamFlag, v: f32) {
        if let Some(i) = flag.value_index() {
            self.values[i] = v;
        }
        self.flags |= flag.bit();
    }

    /// Read a numeric coefficient by flag.
    pub fn value_of(&self, flag: ParamFlag) -> f32 {
        match flag {
            ParamFlag::Mute => self.mute as i32 as f32,
            ParamFlag::ForceMono => self.force_mono as i32 as f32,
            ParamFlag::Cast => self.cast as f32,
            other => self.values[other.value_index().unwrap()],
        }
    }

    /// Number of valid cast-specific entries of [`Self::values`].
    pub fn num_params(&self) -> usize {
        self.num_params
    }

    pub fn set_num_params(&mut self, n: usize) {
        self.num_params = n.min(MAX_PARAMS);
    }

    /// The first `num_params` dense values.
    pub fn params(&self) -> &[f32] {
        &self.values[..self.num_params]
    }

    /// Write a dense value without touching the flag bitmap.
    pub fn set_param(&mut self, index: usize, v: f32) {
        if index < MAX_PARAMS {
            self.values[index] = v;
        }
    }

    pub fn param(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    /// Set a field by its external name, marking its flag.
    ///
    /// Booleans accept any non-zero number as true. Returns false for an
    /// unrecognized name.
    pub fn set_by_name(&mut self, name: &str, value: f32) -> bool {
        match name {
            "mute" => self.set_mute(value != 0.0),
            "force_mono" => self.set_force_mono(value != 0.0),
            "cast" => self.set_cast(value as i32),
            _ => {
                let Some(&(_, flag)) = NAMED_FLOAT_PARAMS.iter().find(|(n, _)| *n == name) else {
                    return false;
                };
                self.set_value_flagged(flag, value);
            }
        }
        true
    }

    /// Reassemble a bundle from its raw parts (FFI mirror, deserialization).
    pub fn from_parts(
        mute: bool,
        force_mono: bool,
        cast: i32,
        num_params: usize,
        values: [f32; MAX_PARAMS],
        flags: u32,
    ) -> Self {
        Self {
            mute,
            force_mono,
            cast,
            num_params: num_params.min(MAX_PARAMS),
            values,
            flags,
        }
    }

    /// The full dense value array, including entries beyond `num_params`.
    pub fn values(&self) -> &[f32; MAX_PARAMS] {
        &self.values
    }

    /// Merge `incoming` into `self`: only flagged sub-fields are applied,
    /// plus the dense values for `k < incoming.num_params()`.
    pub fn apply(&mut self, incoming: &TalkParams) {
        if incoming.is_set(ParamFlag::Mute) {
            self.set_mute(incoming.mute);
        }
        if incoming.is_set(ParamFlag::ForceMono) {
            self.set_force_mono(incoming.force_mono);
        }
        if incoming.is_set(ParamFlag::Cast) {
            self.set_cast(incoming.cast);
        }
        for &(_, flag) in NAMED_FLOAT_PARAMS {
            if incoming.is_set(flag) {
                self.set_value_flagged(flag, incoming.value_of(flag));
            }
        }
        for k in 0..incoming.num_params() {
            self.values[k] = incoming.values[k];
        }
        if incoming.num_params() > 0 {
            self.num_params = self.num_params.max(incoming.num_params());
        }
    }
}

/// Whether `name` names a settable parameter field.
pub fn is_param_name(name: &str) -> bool {
    matches!(name, "mute" | "force_mono" | "cast")
        || NAMED_FLOAT_PARAMS.iter().any(|(n, _)| *n == name)
}

/// A selectable voice identity within a host engine.
///
/// `param_names[k]` labels the meaning of the dense `values[k]` coefficient
/// for this cast.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CastInfo {
    pub id: i32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub param_names: Vec<String>,
}
