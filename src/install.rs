//! Applying an extracted driver description through the OS installer.

use tracing::debug;

use crate::archive::DriverPackageDescriptor;
use crate::config::DriverFetchConfig;
use crate::pipeline::StageFailure;
use crate::tool::ToolRunner;

/// Invokes the configured installer for one descriptor.
///
/// Success means the installer exited with the configured success code;
/// nothing checks that the device works afterwards.
pub struct Installer<'a> {
    config: &'a DriverFetchConfig,
    tools: &'a dyn ToolRunner,
}

impl<'a> Installer<'a> {
    pub fn new(config: &'a DriverFetchConfig, tools: &'a dyn ToolRunner) -> Self {
        Self { config, tools }
    }

    pub fn install(&self, descriptor: &DriverPackageDescriptor) -> Result<(), StageFailure> {
        let descriptor_arg = descriptor.path().display().to_string();
        let args = self.config.installer.render_args(&[
            ("descriptor", descriptor_arg.as_str()),
            ("section", self.config.install_section.as_str()),
        ]);

        let exit = self
            .tools
            .run(&self.config.installer.program, &args)
            .map_err(|err| StageFailure::install(err.to_string()))?;
        debug!(descriptor = %descriptor_arg, code = ?exit.code, "installer finished");

        if exit.is(self.config.install_success_code) {
            Ok(())
        } else {
            Err(StageFailure::install(match exit.code {
                Some(code) => format!(
                    "installer exited with {code} (expected {})",
                    self.config.install_success_code
                ),
                None => "installer terminated by a signal".to_string(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;

    use super::*;
    use crate::error::DriverFetchError;
    use crate::pipeline::PipelineOutcome;
    use crate::tool::ToolExit;

    struct ScriptedInstaller {
        exit: Result<i32, ()>,
        seen: RefCell<Vec<String>>,
    }

    impl ToolRunner for ScriptedInstaller {
        fn run(&self, program: &str, args: &[String]) -> Result<ToolExit, DriverFetchError> {
            self.seen.borrow_mut().push(program.to_string());
            self.seen.borrow_mut().extend(args.iter().cloned());
            match self.exit {
                Ok(code) => Ok(ToolExit::code(code)),
                Err(()) => Err(DriverFetchError::Tool {
                    program: program.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }),
            }
        }
    }

    fn descriptor(dir: &std::path::Path) -> DriverPackageDescriptor {
        let path = dir.join("net.inf");
        fs::write(&path, "[DefaultInstall]\n").expect("write");
        DriverPackageDescriptor::open(path).expect("open")
    }

    #[test]
    fn passes_section_and_descriptor() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let config = DriverFetchConfig::default();
        let runner = ScriptedInstaller {
            exit: Ok(0),
            seen: RefCell::new(Vec::new()),
        };
        let descriptor = descriptor(temp.path());

        Installer::new(&config, &runner)
            .install(&descriptor)
            .expect("installed");

        let seen = runner.seen.borrow();
        assert_eq!(
            *seen,
            vec![
                "rundll32.exe".to_string(),
                "setupapi,InstallHinfSection".to_string(),
                "DefaultInstall".to_string(),
                "132".to_string(),
                descriptor.path().display().to_string(),
            ]
        );
    }

    #[test]
    fn other_exit_codes_fail() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let config = DriverFetchConfig {
            install_success_code: 3010,
            ..DriverFetchConfig::default()
        };
        let runner = ScriptedInstaller {
            exit: Ok(0),
            seen: RefCell::new(Vec::new()),
        };

        let failure = Installer::new(&config, &runner)
            .install(&descriptor(temp.path()))
            .expect_err("wrong code");
        assert_eq!(failure.outcome, PipelineOutcome::InstallFailed);
        assert!(failure.detail.contains("expected 3010"));
    }

    #[test]
    fn launch_failure_is_install_failure() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let config = DriverFetchConfig::default();
        let runner = ScriptedInstaller {
            exit: Err(()),
            seen: RefCell::new(Vec::new()),
        };

        let failure = Installer::new(&config, &runner)
            .install(&descriptor(temp.path()))
            .expect_err("not launched");
        assert_eq!(failure.outcome, PipelineOutcome::InstallFailed);
    }
}
