//! Shared test doubles for the registry crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! integration tests under `tests/`.

use crate::build::container::{ContainerError, ContainerOutput, ContainerRuntime, ContainerSpec};
use crate::build::publish::{PublishError, Publisher, ReleaseRequest};
use crate::command::{CommandError, CommandExecutor, CommandLine};
use crate::preview::{PreviewCompiler, PreviewError};
use crate::sandbox::{ExecOutput, ExecRequest, ExecutionSandbox, SandboxError};
use crate::source::{FetchError, Release, Repository, SourceProvider};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.cast_unsigned())
}

/// A successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// A failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// An expected host command invocation.
#[derive(Debug)]
pub struct ExpectedCall {
    /// Program name, e.g. `git`.
    pub program: &'static str,
    /// Exact arguments.
    pub args: Vec<&'static str>,
    /// What the invocation returns.
    pub result: Result<Output, CommandError>,
}

impl ExpectedCall {
    /// Expect `program args` and answer with `result`.
    #[must_use]
    pub fn new(
        program: &'static str,
        args: &[&'static str],
        result: Result<Output, CommandError>,
    ) -> Self {
        Self {
            program,
            args: args.to_vec(),
            result,
        }
    }
}

/// A `CommandExecutor` that replays expected calls in order.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a stub expecting `expected`, in order.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that every expected call was consumed.
    ///
    /// # Panics
    ///
    /// Panics if expected calls remain.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, command: &CommandLine) -> Result<Output, CommandError> {
        let call = self
            .expected
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected command invocation: {command}"));
        assert_eq!(call.program, command.program);
        assert_eq!(call.args, command.args, "arguments of {command}");
        call.result
    }
}

/// One scripted sandbox answer.
#[derive(Debug)]
pub struct SandboxReply {
    args: Option<Vec<String>>,
    stdin: Option<Option<Vec<u8>>>,
    result: Result<ExecOutput, SandboxError>,
}

impl SandboxReply {
    /// Answer a request with exactly `args` and `stdin`.
    #[must_use]
    pub fn expect(
        args: &[&str],
        stdin: Option<&[u8]>,
        result: Result<ExecOutput, SandboxError>,
    ) -> Self {
        Self {
            args: Some(args.iter().map(|a| (*a).to_owned()).collect()),
            stdin: Some(stdin.map(<[u8]>::to_vec)),
            result,
        }
    }

    /// Answer whatever request comes next.
    #[must_use]
    pub const fn any(result: Result<ExecOutput, SandboxError>) -> Self {
        Self {
            args: None,
            stdin: None,
            result,
        }
    }
}

/// An `ExecutionSandbox` that replays scripted replies and records requests.
#[derive(Debug, Default)]
pub struct ScriptedSandbox {
    replies: RefCell<VecDeque<SandboxReply>>,
    requests: RefCell<Vec<ExecRequest>>,
}

impl ScriptedSandbox {
    /// Creates a sandbox answering with `replies`, in order.
    #[must_use]
    pub fn new(replies: Vec<SandboxReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ExecRequest> {
        self.requests.borrow().clone()
    }

    /// Asserts that every reply was consumed.
    ///
    /// # Panics
    ///
    /// Panics if replies remain.
    pub fn assert_finished(&self) {
        assert!(
            self.replies.borrow().is_empty(),
            "expected no further sandbox invocations"
        );
    }
}

impl ExecutionSandbox for ScriptedSandbox {
    fn run(&self, request: &ExecRequest) -> Result<ExecOutput, SandboxError> {
        self.requests.borrow_mut().push(request.clone());
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected sandbox invocation: {:?}", request.args));
        if let Some(args) = reply.args {
            assert_eq!(args, request.args);
        }
        if let Some(stdin) = reply.stdin {
            assert_eq!(stdin, request.stdin);
        }
        reply.result
    }
}

/// Something a [`RecordingRuntime`] was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// A volume was created.
    Create(String),
    /// A volume was removed.
    Remove(String),
    /// A container was run.
    Run(ContainerSpec),
}

type RunHook = Box<dyn Fn(&ContainerSpec) -> Result<ContainerOutput, ContainerError>>;

/// A `ContainerRuntime` that records every call.
///
/// Container runs succeed unless a hook says otherwise.
#[derive(Default)]
pub struct RecordingRuntime {
    events: RefCell<Vec<RuntimeEvent>>,
    fail_create: Option<String>,
    hook: Option<RunHook>,
}

impl RecordingRuntime {
    /// A runtime whose creation of `volume` fails.
    #[must_use]
    pub fn failing_create(volume: &str) -> Self {
        Self {
            fail_create: Some(volume.to_owned()),
            ..Self::default()
        }
    }

    /// A runtime that answers container runs with `hook`.
    #[must_use]
    pub fn with_hook(
        hook: impl Fn(&ContainerSpec) -> Result<ContainerOutput, ContainerError> + 'static,
    ) -> Self {
        Self {
            hook: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<RuntimeEvent> {
        self.events.borrow().clone()
    }

    /// Container specs run so far.
    #[must_use]
    pub fn specs(&self) -> Vec<ContainerSpec> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                RuntimeEvent::Run(spec) => Some(spec.clone()),
                RuntimeEvent::Create(_) | RuntimeEvent::Remove(_) => None,
            })
            .collect()
    }
}

impl ContainerRuntime for RecordingRuntime {
    fn create_volume(&self, name: &str) -> Result<(), ContainerError> {
        if self.fail_create.as_deref() == Some(name) {
            return Err(ContainerError::Failed {
                step: "create-volume",
                stderr: format!("cannot create {name}"),
            });
        }
        self.events
            .borrow_mut()
            .push(RuntimeEvent::Create(name.to_owned()));
        Ok(())
    }

    fn remove_volume(&self, name: &str) -> Result<(), ContainerError> {
        self.events
            .borrow_mut()
            .push(RuntimeEvent::Remove(name.to_owned()));
        Ok(())
    }

    fn run(&self, spec: &ContainerSpec) -> Result<ContainerOutput, ContainerError> {
        self.events.borrow_mut().push(RuntimeEvent::Run(spec.clone()));
        self.hook
            .as_ref()
            .map_or_else(|| Ok(ContainerOutput::default()), |hook| hook(spec))
    }
}

/// Host directory bind-mounted at `target` in `spec`, if any.
#[must_use]
pub fn bind_source(spec: &ContainerSpec, target: &str) -> Option<PathBuf> {
    spec.mounts
        .iter()
        .find(|mount| mount.target == target)
        .map(|mount| PathBuf::from(&mount.source))
}

/// A `Publisher` that records releases instead of creating them.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    deleted: RefCell<Vec<String>>,
    created: RefCell<Vec<ReleaseRequest>>,
    reject_create: bool,
}

impl RecordingPublisher {
    /// A publisher whose release creation fails.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            reject_create: true,
            ..Self::default()
        }
    }

    /// Tags deleted so far.
    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.borrow().clone()
    }

    /// Releases created so far.
    #[must_use]
    pub fn created(&self) -> Vec<ReleaseRequest> {
        self.created.borrow().clone()
    }
}

impl Publisher for RecordingPublisher {
    fn delete_release(&self, _repo: &str, tag: &str) -> Result<(), PublishError> {
        self.deleted.borrow_mut().push(tag.to_owned());
        Ok(())
    }

    fn create_release(&self, release: &ReleaseRequest) -> Result<(), PublishError> {
        if self.reject_create {
            return Err(PublishError::Rejected {
                action: "create",
                tag: release.tag.clone(),
                stderr: "HTTP 403".to_owned(),
            });
        }
        self.created.borrow_mut().push(release.clone());
        Ok(())
    }
}

/// A `PreviewCompiler` that writes a placeholder page per input.
///
/// Inputs named in `failing` fail to compile.
#[derive(Debug, Default)]
pub struct FakeCompiler {
    failing: Vec<String>,
    compiled: RefCell<Vec<PathBuf>>,
}

impl FakeCompiler {
    /// A compiler that fails for inputs with these filenames.
    #[must_use]
    pub fn failing_on(failing: &[&str]) -> Self {
        Self {
            failing: failing.iter().map(|f| (*f).to_owned()).collect(),
            compiled: RefCell::new(Vec::new()),
        }
    }

    /// Inputs compiled so far.
    #[must_use]
    pub fn compiled(&self) -> Vec<PathBuf> {
        self.compiled.borrow().clone()
    }
}

impl PreviewCompiler for FakeCompiler {
    fn compile(
        &self,
        input: &Path,
        output: &Path,
        _font_path: Option<&Path>,
    ) -> Result<(), PreviewError> {
        self.compiled.borrow_mut().push(input.to_path_buf());
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing.contains(&name) {
            return Err(PreviewError::Failed {
                input: input.to_path_buf(),
                stderr: "error: unknown font".to_owned(),
            });
        }
        let page = output.to_string_lossy().replace("{n}", "1");
        fs::write(page, "<svg/>").map_err(PreviewError::Io)
    }
}

/// An in-memory `SourceProvider`.
#[derive(Debug, Default)]
pub struct FakeProvider {
    releases: BTreeMap<String, Release>,
    repositories: Vec<Repository>,
    files: BTreeMap<(String, String), String>,
    readmes: BTreeMap<String, String>,
    blobs: BTreeMap<String, Vec<u8>>,
    downloads: RefCell<Vec<String>>,
}

impl FakeProvider {
    /// Serve `release` as the latest release of `repo`.
    #[must_use]
    pub fn with_release(mut self, repo: &str, release: Release) -> Self {
        self.releases.insert(repo.to_owned(), release);
        self
    }

    /// Return `repository` from topic search.
    #[must_use]
    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repositories.push(repository);
        self
    }

    /// Serve `text` as `path` in `repo`.
    #[must_use]
    pub fn with_file(mut self, repo: &str, path: &str, text: &str) -> Self {
        self.files
            .insert((repo.to_owned(), path.to_owned()), text.to_owned());
        self
    }

    /// Serve `text` as the root README of `repo`.
    #[must_use]
    pub fn with_readme(mut self, repo: &str, text: &str) -> Self {
        self.readmes.insert(repo.to_owned(), text.to_owned());
        self
    }

    /// Serve `bytes` at `url`.
    #[must_use]
    pub fn with_blob(mut self, url: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.blobs.insert(url.to_owned(), bytes.into());
        self
    }

    /// URLs downloaded so far.
    #[must_use]
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.borrow().clone()
    }
}

fn not_found(what: &str) -> FetchError {
    FetchError::NotFound {
        url: what.to_owned(),
    }
}

impl SourceProvider for FakeProvider {
    fn latest_release(&self, repo: &str) -> Result<Release, FetchError> {
        self.releases.get(repo).cloned().ok_or_else(|| not_found(repo))
    }

    fn search_repositories(&self, _topic: &str) -> Result<Vec<Repository>, FetchError> {
        Ok(self.repositories.clone())
    }

    fn file_contents(&self, repo: &str, path: &str) -> Result<String, FetchError> {
        self.files
            .get(&(repo.to_owned(), path.to_owned()))
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn readme(&self, repo: &str) -> Result<String, FetchError> {
        self.readmes.get(repo).cloned().ok_or_else(|| not_found(repo))
    }

    fn download(&self, url: &str, dest: &Path, max_bytes: u64) -> Result<u64, FetchError> {
        self.downloads.borrow_mut().push(url.to_owned());
        let bytes = self.blobs.get(url).ok_or_else(|| not_found(url))?;
        let len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        if len > max_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_owned(),
                limit: max_bytes,
            });
        }
        fs::write(dest, bytes)?;
        Ok(len)
    }
}
