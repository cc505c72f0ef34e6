use std::marker::PhantomData;
use std::time::Instant;

use qk_core::config::GenerationOptions;

use crate::error::{PipelineDiagnostics, PipelineError};

/// One generation pass. Stages report failures as generation errors; the
/// pipeline attaches the stage name.
pub trait PipelineStage: Send + Sync {
    type SrcCtx;
    type DstCtx;

    fn name(&self) -> &'static str;
    fn run(
        &self,
        context: Self::SrcCtx,
        options: &GenerationOptions,
        diagnostics: &mut PipelineDiagnostics,
    ) -> qk_core::Result<Self::DstCtx>;
}

type RunFn<Src, Dst> =
    dyn Fn(Src, &mut PipelineDiagnostics, &GenerationOptions) -> Result<Dst, PipelineError>
        + Send
        + Sync;

pub struct Pipeline<Src, Dst> {
    stages: Vec<&'static str>,
    run: Box<RunFn<Src, Dst>>,
}

impl<Src, Dst> Pipeline<Src, Dst> {
    pub fn run(
        &self,
        context: Src,
        diagnostics: &mut PipelineDiagnostics,
        options: &GenerationOptions,
    ) -> Result<Dst, PipelineError> {
        (self.run)(context, diagnostics, options)
    }

    /// Stage names in execution order.
    pub fn stages(&self) -> &[&'static str] {
        &self.stages
    }
}

pub struct PipelineBuilder<Src, Dst> {
    pipeline: Pipeline<Src, Dst>,
    _marker: PhantomData<(Src, Dst)>,
}

impl<Src> PipelineBuilder<Src, Src> {
    pub fn new() -> Self {
        let run = |context: Src,
                   _diagnostics: &mut PipelineDiagnostics,
                   _options: &GenerationOptions| Ok(context);
        Self {
            pipeline: Pipeline {
                stages: Vec::new(),
                run: Box::new(run),
            },
            _marker: PhantomData,
        }
    }
}

impl<Src> Default for PipelineBuilder<Src, Src> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Src, Mid> PipelineBuilder<Src, Mid> {
    pub fn add_stage<Next, S>(self, stage: S) -> PipelineBuilder<Src, Next>
    where
        S: PipelineStage<SrcCtx = Mid, DstCtx = Next> + 'static,
        Src: 'static,
        Mid: 'static,
        Next: 'static,
    {
        let name = stage.name();
        let previous = self.pipeline.run;
        let run = move |context: Src,
                        diagnostics: &mut PipelineDiagnostics,
                        options: &GenerationOptions| {
            let mid = previous(context, diagnostics, options)?;
            let started = Instant::now();
            let result = stage.run(mid, options, diagnostics);
            // notes gathered before a failure still reach the log
            diagnostics.emit_stage(name, qk_core::config::verbose_mode());
            match result {
                Ok(next) => {
                    trace!("stage {} finished in {:?}", name, started.elapsed());
                    Ok(next)
                }
                Err(err) => Err(PipelineError::from_generation(name, err)),
            }
        };

        let mut stages = self.pipeline.stages;
        stages.push(name);
        PipelineBuilder {
            pipeline: Pipeline {
                stages,
                run: Box::new(run),
            },
            _marker: PhantomData,
        }
    }

    pub fn build(self) -> Pipeline<Src, Mid> {
        self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostic;

    struct Double;

    impl PipelineStage for Double {
        type SrcCtx = i64;
        type DstCtx = i64;

        fn name(&self) -> &'static str {
            "double"
        }

        fn run(
            &self,
            context: i64,
            _: &GenerationOptions,
            _: &mut PipelineDiagnostics,
        ) -> qk_core::Result<i64> {
            Ok(context * 2)
        }
    }

    struct Render;

    impl PipelineStage for Render {
        type SrcCtx = i64;
        type DstCtx = String;

        fn name(&self) -> &'static str {
            "render"
        }

        fn run(
            &self,
            context: i64,
            options: &GenerationOptions,
            diagnostics: &mut PipelineDiagnostics,
        ) -> qk_core::Result<String> {
            diagnostics.push(Diagnostic::note(format!("indent {}", options.indent_size)));
            if context < 0 {
                ir_bail!("negative");
            }
            Ok(context.to_string())
        }
    }

    #[test]
    fn stages_compose_and_failures_name_the_stage() {
        let pipeline = PipelineBuilder::new()
            .add_stage(Double)
            .add_stage(Double)
            .add_stage(Render)
            .build();
        assert_eq!(pipeline.stages(), ["double", "double", "render"]);
        let options = GenerationOptions::default();
        let mut diagnostics = PipelineDiagnostics::default();
        assert_eq!(pipeline.run(3, &mut diagnostics, &options).unwrap(), "12");

        let err = pipeline.run(-1, &mut diagnostics, &options).unwrap_err();
        assert_eq!(err.stage, "render");
        assert_eq!(err.to_string(), "[render] IR consistency error: negative");
        assert!(matches!(err.generation_error(), Some(qk_core::Error::IrConsistency(_))));
        assert_eq!(diagnostics.all().count(), 2);
    }
}
