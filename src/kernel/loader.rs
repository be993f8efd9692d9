// src/kernel/loader.rs
//! Program images and the trait used to load them by name.
//!
//! Reading a `.maq` file off disk (`prog_cria`/`programa.h`) is out of
//! scope; this crate only defines the shape a host-provided loader must
//! satisfy, plus an in-memory implementation useful for tests and small
//! embedders that don't need a real filesystem.

use std::collections::HashMap;

use crate::kernel::core::result::KernelError;

/// A loaded program: its entry point and the words to place in swap.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramImage {
    pub entry: u32,
    pub words: Vec<i32>,
}

impl ProgramImage {
    #[must_use]
    pub fn new(entry: u32, words: Vec<i32>) -> Self {
        Self { entry, words }
    }
}

/// Resolves a program name (as read from a process's `CRIA_PROC` argument)
/// into a loadable image.
pub trait ProgramLoader {
    fn load(&self, name: &str) -> Result<ProgramImage, KernelError>;
}

/// An in-memory `ProgramLoader` backed by a fixed table, for tests and
/// embedders that bundle their `.maq` images at compile time.
#[derive(Debug, Clone, Default)]
pub struct StaticProgramLoader {
    programs: HashMap<String, ProgramImage>,
}

impl StaticProgramLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_program(mut self, name: impl Into<String>, image: ProgramImage) -> Self {
        self.programs.insert(name.into(), image);
        self
    }
}

impl ProgramLoader for StaticProgramLoader {
    fn load(&self, name: &str) -> Result<ProgramImage, KernelError> {
        self.programs
            .get(name)
            .cloned()
            .ok_or(KernelError::Internal("no such program image"))
    }
}
