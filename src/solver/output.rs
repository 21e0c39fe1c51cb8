//! Result stream: one tab-separated line per committed sub-increment
//!
//! The line layout follows the request: block/cycle/step/increment indices
//! (1-based), elapsed time, then optionally temperature plus a flux
//! placeholder, the requested strain and stress components, and the
//! requested internal variables.

use std::io::Write;

use crate::error::Result;
use crate::phase::state::StateSnapshot;

/// Internal-variable selection for the result stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatevSelection {
    None,
    All,
    /// Inclusive index ranges.
    Ranges(Vec<(usize, usize)>),
}

/// What each result line contains.
#[derive(Debug, Clone)]
pub struct OutputRequest {
    /// Write temperature and a zero flux placeholder.
    pub temperature: bool,
    /// Voigt component indices whose strain, then stress, are written.
    pub mech_components: Vec<usize>,
    pub statev: StatevSelection,
}

impl Default for OutputRequest {
    fn default() -> Self {
        Self {
            temperature: false,
            mech_components: (0..6).collect(),
            statev: StatevSelection::None,
        }
    }
}

impl OutputRequest {
    /// Write one result line for a committed sub-increment.
    pub fn write_line<W: Write>(
        &self,
        out: &mut W,
        block: usize,
        cycle: usize,
        step: usize,
        inc: usize,
        time: f64,
        sv: &StateSnapshot,
    ) -> Result<()> {
        write!(
            out,
            "{}\t{}\t{}\t{}\t{}\t",
            block + 1,
            cycle + 1,
            step + 1,
            inc + 1,
            time
        )?;

        if self.temperature {
            // The flux slot is a placeholder until a thermal solver fills it.
            write!(out, "{}\t{}\t", sv.t, 0)?;
        }
        for &k in &self.mech_components {
            write!(out, "{}\t", sv.etot[k])?;
        }
        for &k in &self.mech_components {
            write!(out, "{}\t", sv.sigma[k])?;
        }

        match &self.statev {
            StatevSelection::None => {}
            StatevSelection::All => {
                for k in 0..sv.nstatev() {
                    write!(out, "{}\t", sv.statev[k])?;
                }
            }
            StatevSelection::Ranges(ranges) => {
                for &(lo, hi) in ranges {
                    for k in lo..=hi {
                        write!(out, "{}\t", sv.statev[k])?;
                    }
                }
            }
        }
        writeln!(out)?;
        Ok(())
    }
}
