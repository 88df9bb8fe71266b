//! Output verbosity.

/// Output verbosity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Also show the output of every remote command.
    Verbose,
    /// Show per-step progress and the run summary.
    #[default]
    Normal,
    /// Show host results and the run summary only.
    Quiet,
    /// Show nothing except errors.
    Silent,
}

impl OutputMode {
    /// Pick a mode from the `--verbose`, `--quiet` and `--silent` flags.
    ///
    /// The quieter flag wins.
    pub fn from_flags(verbose: bool, quiet: bool, silent: bool) -> Self {
        match (verbose, quiet, silent) {
            (_, _, true) => Self::Silent,
            (_, true, false) => Self::Quiet,
            (true, false, false) => Self::Verbose,
            (false, false, false) => Self::Normal,
        }
    }

    /// Check if this mode shows remote command output.
    pub fn shows_command_output(&self) -> bool {
        matches!(self, Self::Verbose)
    }

    /// Check if this mode shows individual step lines.
    pub fn shows_steps(&self) -> bool {
        matches!(self, Self::Verbose | Self::Normal)
    }

    /// Check if this mode shows status messages.
    pub fn shows_status(&self) -> bool {
        !matches!(self, Self::Silent)
    }
}
