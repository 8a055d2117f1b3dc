use std::fmt;

/// Whether a pass updates parameters.
///
/// `Train` enables dropout, keeps activations for the backward pass and
/// steps the optimizer. `Eval` does none of these, so no gradient state is
/// built for the whole pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

impl Mode {
    pub fn is_training(self) -> bool {
        matches!(self, Mode::Train)
    }

    /// Tag used in epoch summary log lines.
    pub fn label(self) -> &'static str {
        match self {
            Mode::Train => "Training",
            Mode::Eval => "Validation",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
