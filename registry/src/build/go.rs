//! Container specs for building Go template sources.
//!
//! Dependencies are fetched once with network access into the `-deps`
//! volume. Every cross-compile then runs with no network, a read-only root,
//! and `GOPROXY=off`, so the build can only use what was fetched.

use super::container::{ContainerSpec, Mount};
use super::volumes::BuildVolumes;
use crate::config::BuildSettings;
use crate::platform::Platform;
use std::path::Path;

const SRC: &str = "/src";
const MODCACHE: &str = "/go/pkg/mod";
const OUT: &str = "/out";
const HOST: &str = "/host";

/// Copy the host checkout into the source volume.
#[must_use]
pub fn stage_source(settings: &BuildSettings, checkout: &Path, volumes: &BuildVolumes<'_>) -> ContainerSpec {
    ContainerSpec::new("stage", &settings.helper_image, settings.copy_timeout())
        .named(volumes.container("stage"))
        .mount(Mount::read_only(checkout.display().to_string(), HOST))
        .mount(Mount::read_write(volumes.src(), SRC))
        .command(["cp", "-a", "/host/.", "/src/"])
}

/// Download modules into the deps volume. The only networked step.
#[must_use]
pub fn fetch_dependencies(settings: &BuildSettings, volumes: &BuildVolumes<'_>) -> ContainerSpec {
    ContainerSpec::new("fetch-dependencies", &settings.go_image, settings.deps_timeout())
        .named(volumes.container("fetch-dependencies"))
        .with_network()
        .limits(&settings.memory, &settings.cpus)
        .mount(Mount::read_only(volumes.src(), SRC))
        .mount(Mount::read_write(volumes.deps(), MODCACHE))
        .env("GOMODCACHE", MODCACHE)
        .env("GOFLAGS", "-mod=mod")
        .workdir(SRC)
        .command(["go", "mod", "download"])
}

/// Cross-compile `package` for `platform` into the out volume as `artifact`.
#[must_use]
pub fn build_target(
    settings: &BuildSettings,
    volumes: &BuildVolumes<'_>,
    package: &str,
    platform: Platform,
    artifact: &str,
) -> ContainerSpec {
    ContainerSpec::new("build", &settings.go_image, settings.build_timeout())
        .named(volumes.container(&format!("build-{}", platform.key())))
        .hardened()
        .limits(&settings.memory, &settings.cpus)
        .mount(Mount::read_only(volumes.src(), SRC))
        .mount(Mount::read_only(volumes.deps(), MODCACHE))
        .mount(Mount::read_write(volumes.out(), OUT))
        .env("CGO_ENABLED", "0")
        .env("GOOS", platform.os.as_str())
        .env("GOARCH", platform.arch.as_str())
        .env("GOFLAGS", "-mod=mod -trimpath")
        .env("GOPROXY", "off")
        .env("GOMODCACHE", MODCACHE)
        .env("GOCACHE", "/tmp/go-build")
        .env("HOME", "/tmp")
        .workdir(SRC)
        .command([
            "go".to_owned(),
            "build".to_owned(),
            "-o".to_owned(),
            format!("{OUT}/{artifact}"),
            package_path(package),
        ])
}

/// Copy every artifact out of the out volume into `dest` on the host.
///
/// The copy runs as the host user so the artifacts land owned by us and
/// can be hashed and marked executable without privileges.
#[must_use]
pub fn copy_artifacts(settings: &BuildSettings, volumes: &BuildVolumes<'_>, dest: &Path) -> ContainerSpec {
    let mut spec = ContainerSpec::new("copy-artifacts", &settings.helper_image, settings.copy_timeout())
        .named(volumes.container("copy-artifacts"))
        .mount(Mount::read_only(volumes.out(), OUT))
        .mount(Mount::read_write(dest.display().to_string(), HOST))
        .command(["cp", "-R", "/out/.", "/host/"]);
    if let Some(user) = host_user() {
        spec = spec.as_user(user);
    }
    spec
}

/// The invoking `uid:gid`.
#[cfg(unix)]
fn host_user() -> Option<String> {
    // SAFETY: both calls only read the process credentials and cannot fail.
    let (uid, gid) = unsafe { (libc::geteuid(), libc::getegid()) };
    Some(format!("{uid}:{gid}"))
}

#[cfg(not(unix))]
const fn host_user() -> Option<String> {
    None
}

/// Go package argument for `package`, always relative to the module root.
fn package_path(package: &str) -> String {
    let trimmed = package.trim_start_matches("./").trim_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        ".".to_owned()
    } else {
        format!("./{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Os};
    use crate::template_name::TemplateName;
    use crate::test_utils::RecordingRuntime;
    use rstest::rstest;

    fn with_volumes(check: impl FnOnce(&BuildVolumes<'_>)) {
        let runtime = RecordingRuntime::default();
        let name = TemplateName::try_from("demo").expect("valid");
        let volumes = BuildVolumes::create(&runtime, &name).expect("volumes");
        check(&volumes);
    }

    #[test]
    fn builds_are_offline_and_hardened() {
        with_volumes(|volumes| {
            let spec = build_target(
                &BuildSettings::default(),
                volumes,
                "./cmd/demo",
                Platform::new(Os::Windows, Arch::Arm64),
                "presto-template-demo-windows-arm64.exe",
            );
            assert!(!spec.network);
            assert!(spec.read_only_root);
            assert_eq!(spec.tmpfs, vec!["/tmp".to_owned()]);
            assert!(spec.env.contains(&("GOPROXY".to_owned(), "off".to_owned())));
            assert!(spec.env.contains(&("GOOS".to_owned(), "windows".to_owned())));
            assert!(spec.env.contains(&("GOARCH".to_owned(), "arm64".to_owned())));
            assert!(spec.mounts.contains(&Mount::read_only("presto-demo-deps", MODCACHE)));
            assert_eq!(
                spec.command.last().map(String::as_str),
                Some("./cmd/demo")
            );
        });
    }

    #[test]
    fn dependency_fetch_is_networked_with_limits() {
        with_volumes(|volumes| {
            let spec = fetch_dependencies(&BuildSettings::default(), volumes);
            assert!(spec.network);
            assert_eq!(spec.memory.as_deref(), Some("2g"));
            assert_eq!(spec.cpus.as_deref(), Some("2"));
            assert!(spec.mounts.contains(&Mount::read_only("presto-demo-src", SRC)));
        });
    }

    #[test]
    fn every_step_gets_its_own_container_name() {
        with_volumes(|volumes| {
            let settings = BuildSettings::default();
            let dest = Path::new("/tmp/artifacts");
            let names: Vec<_> = [
                stage_source(&settings, dest, volumes),
                fetch_dependencies(&settings, volumes),
                build_target(
                    &settings,
                    volumes,
                    ".",
                    Platform::new(Os::Linux, Arch::Amd64),
                    "demo",
                ),
                build_target(
                    &settings,
                    volumes,
                    ".",
                    Platform::new(Os::Darwin, Arch::Arm64),
                    "demo",
                ),
                copy_artifacts(&settings, volumes, dest),
            ]
            .into_iter()
            .filter_map(|spec| spec.name)
            .collect();
            assert_eq!(
                names,
                vec![
                    "presto-demo-stage",
                    "presto-demo-fetch-dependencies",
                    "presto-demo-build-linux-amd64",
                    "presto-demo-build-darwin-arm64",
                    "presto-demo-copy-artifacts",
                ]
            );
        });
    }

    #[cfg(unix)]
    #[test]
    fn artifacts_are_copied_out_as_the_host_user() {
        with_volumes(|volumes| {
            let spec = copy_artifacts(&BuildSettings::default(), volumes, Path::new("/tmp/a"));
            // SAFETY: reads the process credentials only.
            let uid = unsafe { libc::geteuid() };
            let user = spec.user.expect("copy runs as the host user");
            assert!(user.starts_with(&format!("{uid}:")), "{user}");
            assert!(!spec.command.iter().any(|arg| arg == "-a"));
        });
    }

    #[rstest]
    #[case(".", ".")]
    #[case("./", ".")]
    #[case("cmd/demo", "./cmd/demo")]
    #[case("./cmd/demo/", "./cmd/demo")]
    fn package_paths_are_module_relative(#[case] package: &str, #[case] expected: &str) {
        assert_eq!(package_path(package), expected);
    }
}
