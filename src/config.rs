use std::borrow::Cow;

/// Settings a builder applies to the computation it drives
#[derive(Clone, Debug)]
pub struct BuilderConfig {
    /// Whether awaiters obtained through the published future resume on the
    /// scheduling context that was current when they were created
    pub continue_on_captured_context: bool,
    /// Whether a panic in the state machine completes the future with a
    /// failure. When disabled the panic unwinds into the engine.
    pub catch_panics: bool,
    /// Label for the tracing span the state machine runs under
    pub name: Option<Cow<'static, str>>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            continue_on_captured_context: true,
            catch_panics: true,
            name: None,
        }
    }
}

impl BuilderConfig {
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn continue_on_captured_context(mut self, continue_on_captured_context: bool) -> Self {
        self.continue_on_captured_context = continue_on_captured_context;
        self
    }

    pub fn catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }
}
