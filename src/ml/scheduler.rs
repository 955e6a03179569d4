// ============================================================
// Layer 5 — Warmup + Linear Decay Learning-Rate Schedule
// ============================================================
// lr(s) = base_lr * m(s), with s the number of optimizer
// steps already taken:
//
//   m(s) = s / warmup                              s <  warmup
//   m(s) = max(0, (total - s) / (total - warmup))  s >= warmup
//
//   lr
//    │      /\
//    │     /  ‾‾‾‾‾‾‾‾‾‾‾‾‾‾──────___
//    │    /                          ‾‾‾───___
//    │   /                                     ‾‾──
//    └──┴───────────────────────────────────────────┴── step
//       0   warmup                                total
//
// The training loop calls `step()` exactly once after every
// optimizer step, so schedule steps and training steps stay
// in one-to-one correspondence.

#[derive(Debug, Clone)]
pub struct WarmupLinearSchedule {
    base_lr:      f64,
    warmup_steps: usize,
    total_steps:  usize,
    current:      usize,
}

impl WarmupLinearSchedule {
    pub fn new(base_lr: f64, warmup_steps: usize, total_steps: usize) -> Self {
        Self { base_lr, warmup_steps, total_steps, current: 0 }
    }

    /// Warmup length as a fraction of the total step count.
    pub fn with_warmup_fraction(base_lr: f64, warmup_fraction: f64, total_steps: usize) -> Self {
        let warmup = (total_steps as f64 * warmup_fraction) as usize;
        Self::new(base_lr, warmup, total_steps)
    }

    pub fn multiplier(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return step as f64 / self.warmup_steps.max(1) as f64;
        }
        let remaining = self.total_steps.saturating_sub(step) as f64;
        let span = self.total_steps.saturating_sub(self.warmup_steps).max(1) as f64;
        (remaining / span).max(0.0)
    }

    /// Rate for the upcoming optimizer step
    pub fn lr(&self) -> f64 {
        self.base_lr * self.multiplier(self.current)
    }

    pub fn step(&mut self) {
        self.current += 1;
    }

    pub fn steps_taken(&self) -> usize {
        self.current
    }

    pub fn warmup_steps(&self) -> usize {
        self.warmup_steps
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_ramps_linearly() {
        let s = WarmupLinearSchedule::new(1.0, 10, 100);
        assert_eq!(s.multiplier(0), 0.0);
        assert!((s.multiplier(5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_decay_reaches_zero_at_total() {
        let s = WarmupLinearSchedule::new(1.0, 10, 100);
        assert!((s.multiplier(10) - 1.0).abs() < 1e-12);
        assert!((s.multiplier(55) - 0.5).abs() < 1e-12);
        assert_eq!(s.multiplier(100), 0.0);
        assert_eq!(s.multiplier(150), 0.0);
    }

    #[test]
    fn test_step_advances_lr() {
        let mut s = WarmupLinearSchedule::new(2e-4, 4, 8);
        assert_eq!(s.lr(), 0.0);
        s.step();
        assert!((s.lr() - 5e-5).abs() < 1e-12);
        assert_eq!(s.steps_taken(), 1);
    }

    #[test]
    fn test_warmup_fraction() {
        let s = WarmupLinearSchedule::with_warmup_fraction(1e-4, 0.1, 1000);
        assert_eq!(s.warmup_steps(), 100);
        assert_eq!(s.total_steps(), 1000);
    }

    #[test]
    fn test_zero_warmup_starts_at_full_rate() {
        let s = WarmupLinearSchedule::new(1.0, 0, 4);
        assert_eq!(s.multiplier(0), 1.0);
    }
}
