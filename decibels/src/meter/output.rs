//! Where level readings go

use std::io::{self, Write};

use tracing::warn;

use crate::meter::loudness::Decibels;

/// Receives one reading per non-empty capture cycle
pub trait LevelOutput {
    fn emit(&mut self, level: Decibels);
}

/// Writes `<value>dB` lines to standard output
#[derive(Debug, Default)]
pub struct StdoutOutput;

impl StdoutOutput {
    pub fn new() -> Self {
        Self
    }
}

impl LevelOutput for StdoutOutput {
    fn emit(&mut self, level: Decibels) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", level) {
            warn!("Failed to write level: {}", e);
        }
    }
}

/// Collects readings in memory
impl LevelOutput for Vec<Decibels> {
    fn emit(&mut self, level: Decibels) {
        self.push(level);
    }
}

impl<T: LevelOutput + ?Sized> LevelOutput for &mut T {
    fn emit(&mut self, level: Decibels) {
        (**self).emit(level);
    }
}
