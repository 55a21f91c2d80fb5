//! Load contexts: where libraries and programs resolve from
//!
//! A context keeps two ordered lists. Library directories come from the
//! inherited library path plus whatever a strategy appends; they are what
//! the wrapped program sees in its library path variable. Program
//! directories are the inherited `PATH`, consulted only when resolving an
//! entry point by name.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable the dynamic loader reads on this platform
#[cfg(target_os = "macos")]
pub const LIBRARY_PATH_VAR: &str = "DYLD_LIBRARY_PATH";
#[cfg(windows)]
pub const LIBRARY_PATH_VAR: &str = "PATH";
#[cfg(not(any(target_os = "macos", windows)))]
pub const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadContext {
    dirs: Vec<PathBuf>,
    program_dirs: Vec<PathBuf>,
}

impl LoadContext {
    /// Context with library directories only
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        let mut context = Self::default();
        context.extend(dirs);
        context
    }

    pub fn with_program_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        for dir in dirs {
            if !self.program_dirs.contains(&dir) {
                self.program_dirs.push(dir);
            }
        }
        self
    }

    /// The context this process inherited
    pub fn inherited() -> Self {
        let programs = split_var("PATH");
        if LIBRARY_PATH_VAR == "PATH" {
            // The loader reads PATH itself; keep it on one side only
            Self::default().with_program_dirs(programs)
        } else {
            Self::new(split_var(LIBRARY_PATH_VAR)).with_program_dirs(programs)
        }
    }

    /// Library directories, inherited first
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn program_dirs(&self) -> &[PathBuf] {
        &self.program_dirs
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.iter().any(|d| d == dir)
    }

    /// Append library directories not already present, keeping order
    pub fn extend<I: IntoIterator<Item = PathBuf>>(&mut self, dirs: I) {
        for dir in dirs {
            if !self.contains(&dir) {
                self.dirs.push(dir);
            }
        }
    }

    /// Value exported as `LIBRARY_PATH_VAR` to the wrapped program
    pub fn library_path(&self) -> OsString {
        if LIBRARY_PATH_VAR == "PATH" {
            self.search_path()
        } else {
            join(self.dirs.iter())
        }
    }

    /// Where entry points are looked up: library directories, then `PATH`
    pub fn search_path(&self) -> OsString {
        let mut seen: Vec<&PathBuf> = Vec::new();
        for dir in self.dirs.iter().chain(&self.program_dirs) {
            if !seen.contains(&dir) {
                seen.push(dir);
            }
        }
        join(seen.into_iter())
    }
}

fn split_var(var: &str) -> Vec<PathBuf> {
    env::var_os(var)
        .map(|value| {
            env::split_paths(&value)
                .filter(|p| !p.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn join<'a>(dirs: impl Iterator<Item = &'a PathBuf>) -> OsString {
    // Only fails on entries containing the separator, which split_paths never yields
    env::join_paths(dirs).unwrap_or_default()
}
