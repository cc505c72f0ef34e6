use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Note,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

impl Diagnostic {
    pub fn note(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Note,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
        }
    }
}

/// Findings collected while a stage runs, flushed to the log when the stage
/// completes.
#[derive(Debug, Default, Clone)]
pub struct PipelineDiagnostics {
    pub items: Vec<Diagnostic>,
    emitted: Vec<Diagnostic>,
}

impl PipelineDiagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn emit_stage(&mut self, stage: &'static str, verbose: bool) {
        if self.items.is_empty() {
            return;
        }
        for diagnostic in &self.items {
            match diagnostic.level {
                DiagnosticLevel::Warning => warn!("[{}] {}", stage, diagnostic.message),
                DiagnosticLevel::Note if verbose => info!("[{}] {}", stage, diagnostic.message),
                DiagnosticLevel::Note => debug!("[{}] {}", stage, diagnostic.message),
            }
        }
        self.emitted.append(&mut self.items);
    }

    pub fn extend(&mut self, diagnostics: Vec<Diagnostic>) {
        if diagnostics.is_empty() {
            return;
        }
        self.items.extend(diagnostics);
    }

    /// Everything reported so far, flushed or not.
    pub fn all(&self) -> impl Iterator<Item = &Diagnostic> {
        self.emitted.iter().chain(self.items.iter())
    }
}

#[derive(Debug)]
pub struct PipelineError {
    pub stage: &'static str,
    pub message: String,
    pub source: Option<qk_core::Error>,
}

impl PipelineError {
    pub fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            source: None,
        }
    }

    pub fn from_generation(stage: &'static str, err: qk_core::Error) -> Self {
        Self {
            stage,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// The generation error that aborted the stage, if any.
    pub fn generation_error(&self) -> Option<&qk_core::Error> {
        self.source.as_ref()
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|err| err as &(dyn Error + 'static))
    }
}
