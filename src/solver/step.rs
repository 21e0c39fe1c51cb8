//! Loading steps and their sub-increment generation
//!
//! A step turns its boundary-condition targets into an ordered sequence of
//! sub-increments (time delta, 6 mechanical deltas, temperature delta)
//! according to its generation mode. Generation happens once, against the
//! state committed at the end of the previous step; the controller then
//! consumes the sub-increments strictly in order.

use std::path::PathBuf;

use crate::error::{MicromechError, Result};
use crate::phase::state::Vector6;

/// Control type of one mechanical component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    /// The component's strain is prescribed.
    Strain,
    /// The component's stress is prescribed.
    Stress,
    /// Driven by a path file, or left uncontrolled until generation
    /// rewrites it to stress-controlled with zero increment.
    Free,
}

impl ControlType {
    /// Parse a one-letter control tag (`E` strain, `S` stress, `F` free).
    pub fn parse(tag: char, block: usize, step: usize) -> Result<Self> {
        match tag {
            'E' => Ok(Self::Strain),
            'S' => Ok(Self::Stress),
            'F' => Ok(Self::Free),
            _ => Err(MicromechError::InvalidControlTag {
                block,
                step,
                tag: tag.to_string(),
            }),
        }
    }
}

/// Temperature control of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalControl {
    /// Temperature is prescribed (ramped to the target, or read from the
    /// path file).
    Temperature,
    /// Excluded from the path-file column layout; zero increment.
    Free,
}

/// Step flavor, selected by the owning block's loading kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Mechanical loading. The temperature target still ramps linearly but
    /// temperature is not a controlled column in path files.
    Mechanical,
    /// Temperature is an explicitly controlled boundary condition, present
    /// in the path-file column layout.
    ThermoMechanical,
}

/// Sub-increment generation mode.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadMode {
    /// Even split of every delta.
    Linear,
    /// Even time split, mechanical deltas weighted by a `1 + cos` profile.
    Sinusoidal,
    /// Increments read line-by-line from a path file.
    FileDriven(PathBuf),
}

impl LoadMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Sinusoidal => "sinusoidal",
            Self::FileDriven(_) => "file",
        }
    }
}

/// One loading step.
///
/// Until [`generate`](Self::generate) runs, `times`/`mecas`/`ts` are empty.
/// After generation they hold exactly `ninc` entries each and stay fixed,
/// except that file-driven generation rewrites `Free` mechanical controls to
/// `Stress` once the file is consumed. Regeneration (cyclic blocks) restores
/// the as-configured controls first, so path files keep the same column
/// layout on every cycle.
#[derive(Debug, Clone)]
pub struct Step {
    pub number: usize,
    pub kind: StepKind,
    /// Sub-increment count; overwritten by file-driven generation.
    pub ninc: usize,
    /// Initial fraction of a sub-increment attempted by the controller.
    pub dn_init: f64,
    /// Minimum fraction before non-convergence escalates.
    pub dn_mini: f64,
    /// Maximum fraction after acceleration.
    pub dn_maxi: f64,
    pub mode: LoadMode,
    /// Control type per mechanical component (Voigt order).
    pub control: [ControlType; 6],
    /// As-configured controls, reinstated on every generation.
    control_init: [ControlType; 6],
    /// Mechanical targets (stress or strain per the control type).
    pub bc_meca: Vector6,
    /// Step duration target.
    pub bc_time: f64,
    /// Temperature target at the end of the step.
    pub bc_t: f64,
    pub t_control: ThermalControl,
    /// Per-increment time deltas.
    pub times: Vec<f64>,
    /// Per-increment mechanical deltas.
    pub mecas: Vec<Vector6>,
    /// Per-increment temperature deltas.
    pub ts: Vec<f64>,
}

impl Step {
    pub fn new(
        number: usize,
        kind: StepKind,
        ninc: usize,
        mode: LoadMode,
        control: [ControlType; 6],
        bc_meca: Vector6,
        bc_time: f64,
        bc_t: f64,
    ) -> Self {
        assert!(ninc > 0 || matches!(mode, LoadMode::FileDriven(_)),
            "non-file steps need an increment count");
        Self {
            number,
            kind,
            ninc,
            dn_init: 1.0,
            dn_mini: 0.1,
            dn_maxi: 1.0,
            mode,
            control,
            control_init: control,
            bc_meca,
            bc_time,
            bc_t,
            t_control: match kind {
                StepKind::Mechanical => ThermalControl::Free,
                StepKind::ThermoMechanical => ThermalControl::Temperature,
            },
            times: Vec::new(),
            mecas: Vec::new(),
            ts: Vec::new(),
        }
    }

    pub fn with_fractions(mut self, dn_init: f64, dn_mini: f64, dn_maxi: f64) -> Self {
        assert!(dn_mini > 0.0 && dn_mini <= dn_init && dn_init <= dn_maxi && dn_maxi <= 1.0,
            "increment fractions must satisfy 0 < dn_mini <= dn_init <= dn_maxi <= 1");
        self.dn_init = dn_init;
        self.dn_mini = dn_mini;
        self.dn_maxi = dn_maxi;
        self
    }

    pub fn with_thermal_control(mut self, t_control: ThermalControl) -> Self {
        self.t_control = t_control;
        self
    }

    pub fn is_generated(&self) -> bool {
        !self.times.is_empty()
    }

    /// Generate the sub-increment sequence against the committed state at
    /// the end of the previous step. Reentrant: cyclic blocks call this
    /// once per cycle.
    pub fn generate(
        &mut self,
        start_time: f64,
        start_sigma: &Vector6,
        start_etot: &Vector6,
        start_t: f64,
    ) -> Result<()> {
        self.control = self.control_init;
        match self.mode.clone() {
            LoadMode::Linear => self.generate_ramp(start_sigma, start_etot, start_t, false),
            LoadMode::Sinusoidal => self.generate_ramp(start_sigma, start_etot, start_t, true),
            LoadMode::FileDriven(path) => {
                self.generate_from_file(&path, start_time, start_sigma, start_etot, start_t)
            }
        }
    }

    fn generate_ramp(
        &mut self,
        start_sigma: &Vector6,
        start_etot: &Vector6,
        start_t: f64,
        sinusoidal: bool,
    ) -> Result<()> {
        let ninc = self.ninc;
        let n = ninc as f64;

        // Weight profile: unity for the linear ramp, a normalized 1 + cos
        // shape for the sinusoidal one. The normalization keeps the weighted
        // deltas summing to the linear total.
        let weights: Vec<f64> = if sinusoidal {
            let raw: Vec<f64> = (0..ninc)
                .map(|i| {
                    (std::f64::consts::PI
                        + (i as f64 + 1.0) * 2.0 * std::f64::consts::PI / (n + 1.0))
                        .cos()
                        + 1.0
                })
                .collect();
            let sum: f64 = raw.iter().sum();
            raw.into_iter().map(|w| w * n / sum).collect()
        } else {
            vec![1.0; ninc]
        };

        self.times = vec![self.bc_time / n; ninc];
        self.ts = vec![(self.bc_t - start_t) / n; ninc];
        self.mecas = weights
            .iter()
            .map(|&w| {
                let mut delta = Vector6::zeros();
                for k in 0..6 {
                    delta[k] = match self.control[k] {
                        ControlType::Stress => w * (self.bc_meca[k] - start_sigma[k]) / n,
                        ControlType::Strain => w * (self.bc_meca[k] - start_etot[k]) / n,
                        ControlType::Free => 0.0,
                    };
                }
                delta
            })
            .collect();
        Ok(())
    }

    /// Column layout of one path-file line: a label, the absolute time,
    /// the absolute temperature if controlled, then one absolute value per
    /// non-free mechanical component in Voigt order. Counted against the
    /// as-configured controls so the layout survives the Free rewrite.
    fn file_column_count(&self) -> usize {
        let mut count = 1;
        if self.t_control == ThermalControl::Temperature {
            count += 1;
        }
        count
            + self
                .control_init
                .iter()
                .filter(|c| **c != ControlType::Free)
                .count()
    }

    fn generate_from_file(
        &mut self,
        path: &PathBuf,
        start_time: f64,
        start_sigma: &Vector6,
        start_etot: &Vector6,
        start_t: f64,
    ) -> Result<()> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| MicromechError::PathFile {
                step: self.number,
                path: path.clone(),
                source,
            })?;
        let lines: Vec<&str> = contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();
        self.ninc = lines.len();

        let expected = self.file_column_count();
        self.times = Vec::with_capacity(self.ninc);
        self.ts = Vec::with_capacity(self.ninc);
        self.mecas = Vec::with_capacity(self.ninc);

        // Previous-line values start from the committed state, never zero.
        let mut prev_time = start_time;
        let mut prev_t = start_t;
        let mut prev_meca = Vector6::zeros();
        for k in 0..6 {
            prev_meca[k] = match self.control[k] {
                ControlType::Stress => start_sigma[k],
                _ => start_etot[k],
            };
        }

        for (line_no, line) in lines.iter().enumerate() {
            // First token is a label, skipped.
            let values: Vec<f64> = line
                .split_whitespace()
                .skip(1)
                .map(str::parse::<f64>)
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| MicromechError::PathFileFormat {
                    step: self.number,
                    line: line_no + 1,
                    expected,
                    path: path.clone(),
                })?;
            if values.len() != expected {
                return Err(MicromechError::PathFileFormat {
                    step: self.number,
                    line: line_no + 1,
                    expected,
                    path: path.clone(),
                });
            }

            let mut col = values.iter();
            let time = *col.next().unwrap_or(&prev_time);
            self.times.push(time - prev_time);
            prev_time = time;

            if self.t_control == ThermalControl::Temperature {
                let t = *col.next().unwrap_or(&prev_t);
                self.ts.push(t - prev_t);
                prev_t = t;
            } else {
                self.ts.push(0.0);
            }

            let mut delta = Vector6::zeros();
            for k in 0..6 {
                if self.control[k] != ControlType::Free {
                    let v = *col.next().unwrap_or(&prev_meca[k]);
                    delta[k] = v - prev_meca[k];
                    prev_meca[k] = v;
                }
            }
            self.mecas.push(delta);
        }

        // The file is consumed; free components become stress-controlled
        // with no remaining increment so later lookups see a concrete type.
        for c in self.control.iter_mut() {
            if *c == ControlType::Free {
                *c = ControlType::Stress;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn strain_x_step(mode: LoadMode, ninc: usize, target: f64) -> Step {
        let mut control = [ControlType::Stress; 6];
        control[0] = ControlType::Strain;
        let mut bc = Vector6::zeros();
        bc[0] = target;
        Step::new(0, StepKind::Mechanical, ninc, mode, control, bc, 1.0, 0.0)
    }

    #[test]
    fn test_linear_four_equal_increments() {
        let mut step = strain_x_step(LoadMode::Linear, 4, 0.04);
        step.generate(0.0, &Vector6::zeros(), &Vector6::zeros(), 0.0)
            .unwrap();
        assert_eq!(step.mecas.len(), 4);
        for delta in &step.mecas {
            assert_relative_eq!(delta[0], 0.01, epsilon = 1e-15);
        }
        for dt in &step.times {
            assert_relative_eq!(*dt, 0.25, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_linear_measures_from_start_state() {
        let mut step = strain_x_step(LoadMode::Linear, 2, 0.04);
        let mut start_etot = Vector6::zeros();
        start_etot[0] = 0.02;
        step.generate(0.0, &Vector6::zeros(), &start_etot, 0.0)
            .unwrap();
        // Remaining distance 0.02 over two increments
        assert_relative_eq!(step.mecas[0][0], 0.01, epsilon = 1e-15);
    }

    #[test]
    fn test_linear_stress_controlled_uses_stress_start() {
        let mut control = [ControlType::Strain; 6];
        control[1] = ControlType::Stress;
        let mut bc = Vector6::zeros();
        bc[1] = 100.0;
        let mut step = Step::new(0, StepKind::Mechanical, 4, LoadMode::Linear, control, bc, 1.0, 0.0);
        let mut start_sigma = Vector6::zeros();
        start_sigma[1] = 60.0;
        step.generate(0.0, &start_sigma, &Vector6::zeros(), 0.0)
            .unwrap();
        assert_relative_eq!(step.mecas[0][1], 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sinusoidal_sums_to_linear_total() {
        let mut step = strain_x_step(LoadMode::Sinusoidal, 7, 0.021);
        step.generate(0.0, &Vector6::zeros(), &Vector6::zeros(), 0.0)
            .unwrap();
        let total: f64 = step.mecas.iter().map(|d| d[0]).sum();
        assert_relative_eq!(total, 0.021, epsilon = 1e-12);
        // Smooth start: the first increment is smaller than the middle one
        assert!(step.mecas[0][0] < step.mecas[3][0]);
    }

    #[test]
    fn test_sinusoidal_temperature_stays_linear() {
        let mut step = strain_x_step(LoadMode::Sinusoidal, 5, 0.01);
        step.bc_t = 50.0;
        step.generate(0.0, &Vector6::zeros(), &Vector6::zeros(), 20.0)
            .unwrap();
        for dt in &step.ts {
            assert_relative_eq!(*dt, 6.0, epsilon = 1e-12);
        }
    }

    fn write_path_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_file_driven_counts_lines_and_diffs_against_start() {
        // Columns: label, time, T, eps_xx (other five components free)
        let path = write_path_file(
            "micromech_path_basic.txt",
            "i1 1.0 25.0 0.010\ni2 2.0 30.0 0.025\n\ni3 4.0 30.0 0.040\n",
        );
        let mut control = [ControlType::Free; 6];
        control[0] = ControlType::Strain;
        let mut step = Step::new(
            0,
            StepKind::ThermoMechanical,
            0,
            LoadMode::FileDriven(path),
            control,
            Vector6::zeros(),
            0.0,
            0.0,
        );
        let mut start_etot = Vector6::zeros();
        start_etot[0] = 0.004;
        step.generate(0.5, &Vector6::zeros(), &start_etot, 20.0)
            .unwrap();

        assert_eq!(step.ninc, 3);
        // First deltas measured against the start state, not zero
        assert_relative_eq!(step.times[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(step.ts[0], 5.0, epsilon = 1e-12);
        assert_relative_eq!(step.mecas[0][0], 0.006, epsilon = 1e-12);
        // Subsequent deltas are line differences
        assert_relative_eq!(step.times[2], 2.0, epsilon = 1e-12);
        assert_relative_eq!(step.mecas[1][0], 0.015, epsilon = 1e-12);
        // Free components contribute zero and are rewritten to stress
        assert_relative_eq!(step.mecas[0][3], 0.0, epsilon = 1e-15);
        assert_eq!(step.control[3], ControlType::Stress);
        assert_eq!(step.control[0], ControlType::Strain);
    }

    #[test]
    fn test_file_driven_free_temperature_excluded_from_columns() {
        // Columns shrink to label, time, eps_xx when temperature is free
        let path = write_path_file(
            "micromech_path_not.txt",
            "a 1.0 0.01\nb 2.0 0.02\n",
        );
        let mut control = [ControlType::Free; 6];
        control[0] = ControlType::Strain;
        let mut step = Step::new(
            0,
            StepKind::ThermoMechanical,
            0,
            LoadMode::FileDriven(path),
            control,
            Vector6::zeros(),
            0.0,
            0.0,
        )
        .with_thermal_control(ThermalControl::Free);
        step.generate(0.0, &Vector6::zeros(), &Vector6::zeros(), 20.0)
            .unwrap();
        assert_eq!(step.ninc, 2);
        assert_relative_eq!(step.ts[0], 0.0, epsilon = 1e-15);
        assert_relative_eq!(step.mecas[1][0], 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_file_driven_regeneration_keeps_column_layout() {
        // Cyclic blocks regenerate each step; the Free -> Stress rewrite of
        // the first pass must not change the expected file columns.
        let path = write_path_file(
            "micromech_path_cycle.txt",
            "a 1.0 20.0 0.001\nb 2.0 20.0 0.002\n",
        );
        let mut control = [ControlType::Free; 6];
        control[0] = ControlType::Strain;
        let mut step = Step::new(
            0,
            StepKind::ThermoMechanical,
            0,
            LoadMode::FileDriven(path),
            control,
            Vector6::zeros(),
            0.0,
            0.0,
        );
        step.generate(0.0, &Vector6::zeros(), &Vector6::zeros(), 20.0)
            .unwrap();
        assert_eq!(step.control[3], ControlType::Stress);

        // Second cycle starts from the state the first one reached
        let mut start_etot = Vector6::zeros();
        start_etot[0] = 0.002;
        step.generate(2.0, &Vector6::zeros(), &start_etot, 20.0)
            .unwrap();
        assert_eq!(step.ninc, 2);
        assert_relative_eq!(step.mecas[0][0], -0.001, epsilon = 1e-12);
        assert_relative_eq!(step.mecas[1][0], 0.001, epsilon = 1e-12);
        assert_eq!(step.control[3], ControlType::Stress);
    }

    #[test]
    fn test_mechanical_file_step_has_no_temperature_column() {
        // Mechanical steps never carry a temperature column
        let path = write_path_file("micromech_path_meca.txt", "a 1.0 0.01\nb 2.0 0.02\n");
        let mut control = [ControlType::Free; 6];
        control[0] = ControlType::Strain;
        let mut step = Step::new(
            0,
            StepKind::Mechanical,
            0,
            LoadMode::FileDriven(path),
            control,
            Vector6::zeros(),
            0.0,
            0.0,
        );
        step.generate(0.0, &Vector6::zeros(), &Vector6::zeros(), 20.0)
            .unwrap();
        assert_eq!(step.ninc, 2);
        assert_relative_eq!(step.ts[0], 0.0, epsilon = 1e-15);
        assert_relative_eq!(step.mecas[1][0], 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_file_driven_wrong_column_count() {
        let path = write_path_file("micromech_path_bad.txt", "a 1.0\n");
        let mut control = [ControlType::Free; 6];
        control[0] = ControlType::Strain;
        let mut step = Step::new(
            3,
            StepKind::ThermoMechanical,
            0,
            LoadMode::FileDriven(path),
            control,
            Vector6::zeros(),
            0.0,
            0.0,
        );
        let err = step
            .generate(0.0, &Vector6::zeros(), &Vector6::zeros(), 0.0)
            .unwrap_err();
        assert!(matches!(
            err,
            MicromechError::PathFileFormat { step: 3, line: 1, .. }
        ));
    }

    #[test]
    fn test_file_driven_missing_file_is_fatal() {
        let mut step = Step::new(
            1,
            StepKind::Mechanical,
            0,
            LoadMode::FileDriven(PathBuf::from("/nonexistent/micromech.txt")),
            [ControlType::Free; 6],
            Vector6::zeros(),
            0.0,
            0.0,
        );
        let err = step
            .generate(0.0, &Vector6::zeros(), &Vector6::zeros(), 0.0)
            .unwrap_err();
        assert!(matches!(err, MicromechError::PathFile { step: 1, .. }));
    }

    #[test]
    fn test_control_tag_parsing() {
        assert_eq!(ControlType::parse('E', 0, 0).unwrap(), ControlType::Strain);
        assert_eq!(ControlType::parse('S', 0, 0).unwrap(), ControlType::Stress);
        assert_eq!(ControlType::parse('F', 0, 0).unwrap(), ControlType::Free);
        assert!(matches!(
            ControlType::parse('X', 2, 1).unwrap_err(),
            MicromechError::InvalidControlTag { block: 2, step: 1, .. }
        ));
    }
}
