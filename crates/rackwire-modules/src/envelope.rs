//! Gate-driven attack/release envelope.

use libm::expf;

/// Envelope stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeStage {
    /// Output is zero.
    #[default]
    Idle,
    /// Rising toward full level.
    Attack,
    /// Holding full level while the gate is high.
    Hold,
    /// Falling to zero after the gate dropped.
    Release,
}

/// Attack/release envelope driven by an `i32` gate input.
///
/// A gate value above zero opens the envelope; zero or below closes it. A
/// rising edge during release retriggers the attack from the current level.
///
/// ## Parameters
/// - `attack`: Attack time in seconds (0.0001 to 10.0, default 0.005)
/// - `release`: Release time in seconds (0.0001 to 10.0, default 0.2)
#[derive(Debug, Clone)]
pub struct Envelope {
    sample_rate: f32,
    attack: f32,
    release: f32,
    attack_coeff: f32,
    release_coeff: f32,
    stage: EnvelopeStage,
    level: f32,
}

/// Exponential approach overshoots full scale so the attack finishes in
/// finite time.
const ATTACK_TARGET: f32 = 1.2;
const SILENCE: f32 = 1e-4;

impl Envelope {
    /// Creates an envelope with the given attack and release times in seconds.
    pub fn new(sample_rate: f32, attack: f32, release: f32) -> Self {
        let mut env = Self {
            sample_rate,
            attack: 0.0,
            release: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            stage: EnvelopeStage::Idle,
            level: 0.0,
        };
        env.set_attack(attack);
        env.set_release(release);
        env
    }

    /// Sets the attack time in seconds.
    pub fn set_attack(&mut self, seconds: f32) {
        self.attack = seconds.max(1e-4);
        self.attack_coeff = coefficient(self.attack, self.sample_rate);
    }

    /// Sets the release time in seconds.
    pub fn set_release(&mut self, seconds: f32) {
        self.release = seconds.max(1e-4);
        self.release_coeff = coefficient(self.release, self.sample_rate);
    }

    /// Attack time in seconds.
    pub fn attack(&self) -> f32 {
        self.attack
    }

    /// Release time in seconds.
    pub fn release(&self) -> f32 {
        self.release
    }

    /// Current stage.
    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    /// Last output level.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Returns true once the release has finished.
    pub fn is_idle(&self) -> bool {
        self.stage == EnvelopeStage::Idle
    }

    /// Drops to silence immediately.
    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
    }

    /// Fills `out` following `gate` frame by frame.
    pub fn render(&mut self, gate: &[i32], out: &mut [f32]) {
        for (sample, &g) in out.iter_mut().zip(gate) {
            *sample = self.advance(g > 0);
        }
    }

    #[inline]
    fn advance(&mut self, open: bool) -> f32 {
        match (self.stage, open) {
            (EnvelopeStage::Idle | EnvelopeStage::Release, true) => {
                self.stage = EnvelopeStage::Attack;
            }
            (EnvelopeStage::Attack | EnvelopeStage::Hold, false) => {
                self.stage = EnvelopeStage::Release;
            }
            _ => {}
        }

        match self.stage {
            EnvelopeStage::Idle => self.level = 0.0,
            EnvelopeStage::Attack => {
                self.level = ATTACK_TARGET + (self.level - ATTACK_TARGET) * self.attack_coeff;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Hold;
                }
            }
            EnvelopeStage::Hold => self.level = 1.0,
            EnvelopeStage::Release => {
                self.level *= self.release_coeff;
                if self.level < SILENCE {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }
        self.level
    }
}

fn coefficient(seconds: f32, sample_rate: f32) -> f32 {
    let samples = seconds * sample_rate;
    expf(-1.0 / samples.max(1.0))
}
