//! SVG previews compiled from harvested documents.
//!
//! `output.typ` becomes `preview-1.svg`, `preview-2.svg`, ... and each hero
//! frame `hero-frame-<i>.typ` becomes `hero-frame-<i>.svg`. Compilation runs
//! the trusted Typst CLI on the host.

use crate::command::{CommandError, CommandExecutor, CommandLine, stderr_text};
use crate::metadata::{
    DOCUMENT_FILE, MetadataError, MetadataStore, PREVIEW_PREFIX, TemplateMetadata,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Timeout per Typst invocation.
const COMPILE_TIMEOUT: Duration = Duration::from_secs(120);

/// Preview compilation failures.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// The compiler could not be run or timed out.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The compiler rejected the document.
    #[error("failed to compile {}: {stderr}", input.display())]
    Failed {
        /// Document being compiled.
        input: PathBuf,
        /// Compiler stderr.
        stderr: String,
    },

    /// Preparing the output directory failed.
    #[error("I/O error preparing previews: {0}")]
    Io(#[from] io::Error),

    /// Listing the compiled pages failed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Compiles Typst documents to SVG pages.
pub trait PreviewCompiler {
    /// Compile `input` to `output`, whose `{n}` placeholder is replaced by
    /// the page number.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError`] when compilation fails.
    fn compile(
        &self,
        input: &Path,
        output: &Path,
        font_path: Option<&Path>,
    ) -> Result<(), PreviewError>;
}

/// The Typst CLI.
#[derive(Debug, Clone)]
pub struct TypstCompiler<E> {
    executor: E,
}

impl<E: CommandExecutor> TypstCompiler<E> {
    /// Compiler invoking `typst` through `executor`.
    pub const fn new(executor: E) -> Self {
        Self { executor }
    }
}

impl<E: CommandExecutor> PreviewCompiler for TypstCompiler<E> {
    fn compile(
        &self,
        input: &Path,
        output: &Path,
        font_path: Option<&Path>,
    ) -> Result<(), PreviewError> {
        let mut line = CommandLine::new("typst").arg("compile");
        if let Some(fonts) = font_path {
            line = line.arg("--font-path").arg(fonts.to_string_lossy());
        }
        line = line
            .arg(input.to_string_lossy())
            .arg(output.to_string_lossy())
            .timeout(COMPILE_TIMEOUT);
        let result = self.executor.run(&line)?;
        if result.status.success() {
            Ok(())
        } else {
            Err(PreviewError::Failed {
                input: input.to_path_buf(),
                stderr: stderr_text(&result),
            })
        }
    }
}

/// Compile the previews of one template and return the preview files.
///
/// Stale `preview-*.svg` pages are removed first so a shorter document never
/// keeps pages from an older one. Hero frame failures are logged and
/// skipped.
///
/// # Errors
///
/// Returns [`PreviewError`] when the main document fails to compile.
pub fn compile_previews(
    compiler: &dyn PreviewCompiler,
    store: &MetadataStore,
    meta: &TemplateMetadata,
    font_path: Option<&Path>,
) -> Result<Vec<String>, PreviewError> {
    let dir = store.template_dir(&meta.name);
    remove_stale_pages(&dir)?;

    let document = dir.join(meta.files.document.as_deref().unwrap_or(DOCUMENT_FILE));
    compiler.compile(
        &document,
        &dir.join(format!("{PREVIEW_PREFIX}{{n}}.svg")),
        font_path,
    )?;

    for frame in &meta.files.hero_frames {
        let input = dir.join(frame);
        let output = input.with_extension("svg");
        if let Err(e) = compiler.compile(&input, &output, font_path) {
            log::warn!("{}: {frame}: {e}", meta.name);
        }
    }

    Ok(store.previews(&meta.name)?)
}

fn remove_stale_pages(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let stale = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(PREVIEW_PREFIX) && n.ends_with(".svg"));
        if stale {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{Provenance, TemplateCandidate};
    use crate::test_utils::{
        ExpectedCall, FakeCompiler, StubExecutor, failure_output, success_output,
    };

    fn record(store: &MetadataStore, hero: &[&str]) -> TemplateMetadata {
        let candidate = TemplateCandidate {
            name: "gongwen".try_into().expect("valid"),
            repo: "Presto-io/Presto".to_owned(),
            owner: "Presto-io".to_owned(),
            version: "1.0.0".to_owned(),
            tag: "v1.0.0".to_owned(),
            published_at: None,
            assets: Vec::new(),
            html_url: String::new(),
            provenance: Provenance::Official,
            readme_path: None,
        };
        let mut meta = TemplateMetadata::from_candidate(&candidate);
        meta.files.document = Some(DOCUMENT_FILE.to_owned());
        meta.files.hero_frames = hero.iter().map(|f| (*f).to_owned()).collect();
        store
            .write_file(&meta.name, DOCUMENT_FILE, b"= Doc")
            .expect("write document");
        meta
    }

    #[test]
    fn typst_receives_font_path_and_page_pattern() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "typst",
            &["compile", "--font-path", "fonts", "in.typ", "out/preview-{n}.svg"],
            Ok(success_output()),
        )]);
        TypstCompiler::new(&executor)
            .compile(
                Path::new("in.typ"),
                Path::new("out/preview-{n}.svg"),
                Some(Path::new("fonts")),
            )
            .expect("compiles");
        executor.assert_finished();
    }

    #[test]
    fn typst_failure_carries_stderr() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "typst",
            &["compile", "in.typ", "out.svg"],
            Ok(failure_output("error: expected expression")),
        )]);
        let err = TypstCompiler::new(&executor)
            .compile(Path::new("in.typ"), Path::new("out.svg"), None)
            .expect_err("fails");
        assert!(err.to_string().contains("expected expression"));
    }

    #[test]
    fn stale_pages_are_replaced_and_hero_failures_tolerated() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = MetadataStore::new(dir.path());
        let meta = record(&store, &["hero-frame-0.typ", "hero-frame-1.typ"]);
        store
            .write_file(&meta.name, "preview-7.svg", b"<svg/>")
            .expect("stale page");

        let compiler = FakeCompiler::failing_on(&["hero-frame-1.typ"]);
        let previews = compile_previews(&compiler, &store, &meta, None).expect("compiles");

        assert_eq!(previews, vec!["preview-1.svg".to_owned()]);
        let template_dir = store.template_dir(&meta.name);
        assert!(template_dir.join("hero-frame-0.svg").exists());
        assert!(!template_dir.join("hero-frame-1.svg").exists());
        assert_eq!(compiler.compiled().len(), 3);
    }
}
