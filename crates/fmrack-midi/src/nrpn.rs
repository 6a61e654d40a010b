//! NRPN latch state machine and commit tables
//!
//! Voice editing over plain Control Change works as a two-stage latch:
//! CC 99 selects a parameter group (operator 0-5 or the global voice
//! table), CC 98 selects an offset inside that group, and CC 38 commits a
//! data value against whatever is latched. The latch survives unrelated
//! traffic and program changes; a stale selector stays armed until the
//! controller overwrites it.

use crate::scale::scale;

/// Latched offset that commits a program change instead of a parameter edit.
pub const NRPN_PROGRAM_CHANGE: u8 = 21;

/// Group selector value addressing the global voice table.
const GLOBAL_GROUP: u8 = 6;

/// Per-operator voice parameters addressable through the latch.
///
/// The discriminating offset is the CC 98 value; `max` is the parameter's
/// native upper bound fed to the scaling rule on commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorParam {
    EgRate1,
    EgRate2,
    EgRate3,
    EgRate4,
    EgLevel1,
    EgLevel2,
    EgLevel3,
    EgLevel4,
    BreakPoint,
    ScaleLeftDepth,
    ScaleRightDepth,
    ScaleLeftCurve,
    ScaleRightCurve,
    RateScale,
    AmpModSens,
    VelocitySens,
    OutputLevel,
    Mode,
    FrequencyCoarse,
    FrequencyFine,
    Detune,
}

impl OperatorParam {
    pub fn from_offset(offset: u8) -> Option<Self> {
        match offset {
            0 => Some(Self::EgRate1),
            1 => Some(Self::EgRate2),
            2 => Some(Self::EgRate3),
            3 => Some(Self::EgRate4),
            4 => Some(Self::EgLevel1),
            5 => Some(Self::EgLevel2),
            6 => Some(Self::EgLevel3),
            7 => Some(Self::EgLevel4),
            8 => Some(Self::BreakPoint),
            9 => Some(Self::ScaleLeftDepth),
            10 => Some(Self::ScaleRightDepth),
            11 => Some(Self::ScaleLeftCurve),
            12 => Some(Self::ScaleRightCurve),
            13 => Some(Self::RateScale),
            14 => Some(Self::AmpModSens),
            15 => Some(Self::VelocitySens),
            16 => Some(Self::OutputLevel),
            17 => Some(Self::Mode),
            18 => Some(Self::FrequencyCoarse),
            19 => Some(Self::FrequencyFine),
            20 => Some(Self::Detune),
            _ => None,
        }
    }

    /// Native upper bound of the parameter value.
    pub fn max(self) -> u8 {
        match self {
            Self::EgRate1
            | Self::EgRate2
            | Self::EgRate3
            | Self::EgRate4
            | Self::EgLevel1
            | Self::EgLevel2
            | Self::EgLevel3
            | Self::EgLevel4
            | Self::BreakPoint
            | Self::ScaleLeftDepth
            | Self::ScaleRightDepth
            | Self::OutputLevel
            | Self::FrequencyFine => 99,
            Self::ScaleLeftCurve | Self::ScaleRightCurve | Self::AmpModSens => 3,
            Self::RateScale | Self::VelocitySens => 7,
            Self::Mode => 1,
            Self::FrequencyCoarse => 31,
            Self::Detune => 14,
        }
    }
}

/// Global voice parameters addressable when the latched group is 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalParam {
    PitchEgRate1,
    PitchEgRate2,
    PitchEgRate3,
    PitchEgRate4,
    PitchEgLevel1,
    PitchEgLevel2,
    PitchEgLevel3,
    PitchEgLevel4,
    Algorithm,
    Feedback,
    OscKeySync,
    LfoSpeed,
    LfoDelay,
    LfoPitchModDepth,
    LfoAmpModDepth,
    LfoSync,
    LfoWave,
    LfoPitchModSens,
    Transpose,
}

impl GlobalParam {
    pub fn from_offset(offset: u8) -> Option<Self> {
        match offset {
            0 => Some(Self::PitchEgRate1),
            1 => Some(Self::PitchEgRate2),
            2 => Some(Self::PitchEgRate3),
            3 => Some(Self::PitchEgRate4),
            4 => Some(Self::PitchEgLevel1),
            5 => Some(Self::PitchEgLevel2),
            6 => Some(Self::PitchEgLevel3),
            7 => Some(Self::PitchEgLevel4),
            8 => Some(Self::Algorithm),
            9 => Some(Self::Feedback),
            10 => Some(Self::OscKeySync),
            11 => Some(Self::LfoSpeed),
            12 => Some(Self::LfoDelay),
            13 => Some(Self::LfoPitchModDepth),
            14 => Some(Self::LfoAmpModDepth),
            15 => Some(Self::LfoSync),
            16 => Some(Self::LfoWave),
            17 => Some(Self::LfoPitchModSens),
            18 => Some(Self::Transpose),
            _ => None,
        }
    }

    /// Native upper bound of the parameter value.
    pub fn max(self) -> u8 {
        match self {
            Self::PitchEgRate1
            | Self::PitchEgRate2
            | Self::PitchEgRate3
            | Self::PitchEgRate4
            | Self::PitchEgLevel1
            | Self::PitchEgLevel2
            | Self::PitchEgLevel3
            | Self::PitchEgLevel4
            | Self::LfoSpeed
            | Self::LfoDelay
            | Self::LfoPitchModDepth
            | Self::LfoAmpModDepth => 99,
            Self::Algorithm => 31,
            Self::Feedback | Self::LfoPitchModSens => 7,
            Self::OscKeySync | Self::LfoSync => 1,
            Self::LfoWave => 4,
            Self::Transpose => 48,
        }
    }
}

/// Resolved CC 38 commit. The data value in `Operator` and `Global` is
/// already rescaled to the parameter's native range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NrpnCommit {
    /// Offset 21: change the program, independent of the group selector.
    ProgramChange { program: u8 },
    /// Edit one parameter of operator `op` (0-5).
    Operator { op: u8, param: OperatorParam, value: u8 },
    /// Edit one global voice parameter.
    Global { param: GlobalParam, value: u8 },
    /// The latched offset matches no table entry; the commit still counts.
    Unmapped,
}

/// Two-stage parameter latch for one tone generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct NrpnLatch {
    op: u8,
    offset: u8,
}

impl NrpnLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// CC 99: latch the group selector. Values above 6 are ignored.
    pub fn set_op(&mut self, value: u8) {
        if value <= GLOBAL_GROUP {
            self.op = value;
        }
    }

    /// CC 98: latch the parameter offset, unconditionally.
    pub fn set_offset(&mut self, value: u8) {
        self.offset = value;
    }

    pub fn op(&self) -> u8 {
        self.op
    }

    pub fn offset(&self) -> u8 {
        self.offset
    }

    /// CC 38: resolve the latched selector and offset against `value`.
    pub fn commit(&self, value: u8) -> NrpnCommit {
        if self.offset == NRPN_PROGRAM_CHANGE {
            return NrpnCommit::ProgramChange { program: value };
        }
        if self.op < GLOBAL_GROUP {
            match OperatorParam::from_offset(self.offset) {
                Some(param) => NrpnCommit::Operator {
                    op: self.op,
                    param,
                    value: scale(param.max(), value),
                },
                None => NrpnCommit::Unmapped,
            }
        } else {
            match GlobalParam::from_offset(self.offset) {
                Some(param) => NrpnCommit::Global {
                    param,
                    value: scale(param.max(), value),
                },
                None => NrpnCommit::Unmapped,
            }
        }
    }
}
