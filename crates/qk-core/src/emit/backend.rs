use serde::{Deserialize, Serialize};

use super::{GenerationPlan, ModulePlan, UnitKind};
use crate::config::GenerationOptions;
use crate::Result;

/// A rendered source file, ready for the file writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedFile {
    pub path: String,
    pub contents: String,
}

/// Receives rendered declarations in order. Implementations decide how
/// declarations are laid out on disk.
pub trait EmissionSink {
    fn begin_file(&mut self, path: String);
    fn declaration(&mut self, kind: Option<UnitKind>, text: String);
}

/// In-memory sink joining declarations of a file with blank lines.
#[derive(Debug, Default)]
pub struct FileSink {
    files: Vec<EmittedFile>,
}

impl FileSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_files(self) -> Vec<EmittedFile> {
        self.files
    }
}

impl EmissionSink for FileSink {
    fn begin_file(&mut self, path: String) {
        self.files.push(EmittedFile {
            path,
            contents: String::new(),
        });
    }

    fn declaration(&mut self, _kind: Option<UnitKind>, text: String) {
        let Some(file) = self.files.last_mut() else {
            warn!("declaration emitted before any file was opened");
            return;
        };
        let text = text.trim_end_matches('\n');
        if text.is_empty() {
            return;
        }
        if !file.contents.is_empty() {
            file.contents.push('\n');
        }
        file.contents.push_str(text);
        file.contents.push('\n');
    }
}

/// A target language. Backends are pure: the same plan always yields the
/// same files.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    fn file_extension(&self) -> &'static str;

    /// Targets whose programs run lazy initializers from several threads
    /// must guard every run-once flag with a lock.
    fn multi_threaded(&self) -> bool {
        false
    }

    fn guarded(&self, options: &GenerationOptions) -> bool {
        options.guarded_lazy || self.multi_threaded()
    }

    fn emit_module(
        &self,
        module: &ModulePlan,
        options: &GenerationOptions,
        sink: &mut dyn EmissionSink,
    ) -> Result<()>;

    fn emit(&self, plan: &GenerationPlan, options: &GenerationOptions) -> Result<Vec<EmittedFile>> {
        let mut sink = FileSink::new();
        for module in &plan.modules {
            debug!("{}: emitting module {}", self.name(), module.module);
            self.emit_module(module, options, &mut sink)?;
        }
        Ok(sink.into_files())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_separates_declarations() {
        let mut sink = FileSink::new();
        sink.begin_file("a.js".into());
        sink.declaration(None, "var a;\n".into());
        sink.declaration(Some(UnitKind::LazyStatic), "var b;".into());
        sink.declaration(None, String::new());
        let files = sink.into_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].contents, "var a;\n\nvar b;\n");
    }
}
