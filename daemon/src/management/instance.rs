use crate::management::comm::InstanceProcess;
use crate::management::config::InstanceSettingsExt;
use crate::management::console::{ConsoleInjector, ConsoleSink, SignalInjector};
use crate::management::game_ini;
use crate::management::installer::{Installer, InstallerRun, UpdateRequest};
use crate::management::AdapterError;
use log::{debug, info, warn};
use satisfactory_protocol::game::{APP_ID, LOGIN_ANONYMOUS};
use satisfactory_protocol::management::instance::{
    AdapterReport, InstanceSettings, StopOutcome,
};
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const STOP_TIMEOUT: Duration = Duration::from_secs(20);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// how long a graceful stop waits for the server to exit
    pub stop_timeout: Duration,
    /// kill the server when it ignores the interrupt
    pub kill_on_timeout: bool,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            stop_timeout: STOP_TIMEOUT,
            kill_on_timeout: false,
        }
    }
}

pub struct UpdateOutcome {
    /// the installer's process, already exited
    pub process: Option<InstanceProcess>,
    pub status: Option<ExitStatus>,
    /// error text reported by the installer, verbatim
    pub error: Option<String>,
}

impl UpdateOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status.map_or(false, |status| status.success())
    }

    pub fn report(&self) -> AdapterReport {
        match (&self.error, self.status) {
            (Some(error), _) => AdapterReport::error(error.clone()),
            (None, Some(status)) if !status.success() => {
                AdapterReport::error(format!("installer exited with {}", status))
            }
            (None, None) => AdapterReport::error("installer exit status unknown"),
            _ => AdapterReport::ok(),
        }
    }
}

/// Start/stop/update of one Satisfactory dedicated server instance.
pub struct Satisfactory {
    settings: InstanceSettings,
    root: PathBuf,
    options: AdapterOptions,
    console: Arc<dyn ConsoleSink>,
    injector: Arc<dyn ConsoleInjector>,
    installer: Arc<dyn Installer>,
}

impl Satisfactory {
    /// `root` is the directory holding the instance's server files.
    pub fn new(
        settings: InstanceSettings,
        root: impl Into<PathBuf>,
        console: Arc<dyn ConsoleSink>,
        installer: Arc<dyn Installer>,
    ) -> Self {
        Self {
            settings,
            root: root.into(),
            options: AdapterOptions::default(),
            console,
            injector: Arc::new(SignalInjector),
            installer,
        }
    }

    pub fn with_options(mut self, options: AdapterOptions) -> Self {
        self.options = options;
        self
    }

    #[cfg(test)]
    pub fn with_injector(mut self, injector: Arc<dyn ConsoleInjector>) -> Self {
        self.injector = injector;
        self
    }

    pub fn settings(&self) -> &InstanceSettings {
        &self.settings
    }

    pub fn start_path(&self) -> PathBuf {
        self.settings.get_start_path(&self.root)
    }

    /// Writes the server config after installation.
    pub async fn create_server_cfg(&self) -> Result<PathBuf, AdapterError> {
        game_ini::sync(&self.root, self.settings.max_players).await
    }

    pub async fn start(&self) -> Result<InstanceProcess, AdapterError> {
        let start_path = self.start_path();
        if !start_path.exists() {
            return Err(AdapterError::not_found(start_path));
        }

        game_ini::sync(&self.root, self.settings.max_players).await?;

        let start_info = self.settings.get_start_info(&self.root);
        debug!(
            "instance(uuid={}) launch args: {}",
            self.settings.uuid,
            start_info.args.join(" ")
        );
        InstanceProcess::spawn(start_info, self.settings.uuid, self.console.clone())
            .map_err(AdapterError::Launch)
    }

    /// Interrupts the server and waits for it to exit.
    ///
    /// Returns within the stop timeout, output draining included.
    pub async fn stop(&self, process: &mut InstanceProcess) -> Result<StopOutcome, AdapterError> {
        let deadline = Instant::now() + self.options.stop_timeout;
        if let Some(status) = process.try_wait().map_err(AdapterError::Process)? {
            process.drain_output(Some(drain_budget(deadline))).await;
            return Ok(StopOutcome::Exited {
                code: status.code(),
            });
        }

        if let Some(pid) = process.id() {
            let injector = self.injector.clone();
            match tokio::task::spawn_blocking(move || injector.send_interrupt(pid)).await {
                Ok(Ok(())) => debug!("sent interrupt to server (pid={})", pid),
                Ok(Err(err)) => warn!("could not interrupt server (pid={}): {}", pid, err),
                Err(err) => warn!("interrupt task failed: {}", err),
            }
        }

        let waited = tokio::time::timeout_at(deadline, process.wait_exit()).await;
        match waited {
            Ok(status) => {
                let status = status.map_err(AdapterError::Process)?;
                process.drain_output(Some(drain_budget(deadline))).await;
                info!(
                    "instance(uuid={}) stopped with {}",
                    self.settings.uuid, status
                );
                Ok(StopOutcome::Exited {
                    code: status.code(),
                })
            }
            Err(_) if self.options.kill_on_timeout => {
                warn!(
                    "instance(uuid={}) ignored interrupt for {:?}, killing",
                    self.settings.uuid, self.options.stop_timeout
                );
                process.kill().await.map_err(AdapterError::Process)?;
                process.drain_output(Some(drain_budget(deadline))).await;
                Ok(StopOutcome::Killed)
            }
            Err(_) => {
                warn!(
                    "instance(uuid={}) still running after {:?}",
                    self.settings.uuid, self.options.stop_timeout
                );
                Ok(StopOutcome::TimedOut)
            }
        }
    }

    /// Runs the installer and waits for it to finish.
    ///
    /// `custom` overrides the instance's beta channel.
    pub async fn update(&self, validate: bool, custom: Option<&str>) -> UpdateOutcome {
        let channel = custom
            .map(str::trim)
            .filter(|channel| !channel.is_empty())
            .or_else(|| self.settings.beta_channel())
            .map(str::to_string);
        let request = UpdateRequest {
            instance: self.settings.uuid,
            install_dir: self.root.clone(),
            app_id: APP_ID.to_string(),
            validate,
            channel,
            login_anonymous: LOGIN_ANONYMOUS,
        };

        let InstallerRun { process, error } = self.installer.update(&request).await;
        let Some(mut process) = process else {
            return UpdateOutcome {
                process: None,
                status: None,
                error: Some(error.unwrap_or_else(|| "installer did not start".to_string())),
            };
        };

        let status = match process.wait().await {
            Ok(status) => Some(status),
            Err(err) => {
                warn!("failed to wait for installer: {}", err);
                None
            }
        };
        info!(
            "instance(uuid={}) installer finished with {:?}",
            self.settings.uuid, status
        );
        UpdateOutcome {
            process: Some(process),
            status,
            error,
        }
    }
}

/// Time left for draining output, never past `deadline`.
fn drain_budget(deadline: Instant) -> Duration {
    deadline
        .saturating_duration_since(Instant::now())
        .min(DRAIN_TIMEOUT)
}

/// Host-facing `Error`/`Notice` view of an operation result.
pub fn report<T>(result: &Result<T, AdapterError>) -> AdapterReport {
    match result {
        Ok(_) => AdapterReport::ok(),
        Err(err) => AdapterReport::error(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::management::comm::ProcessStartInfo;
    use crate::management::console::ConsoleHub;
    use satisfactory_protocol::game::START_PATH;
    use satisfactory_protocol::management::instance::StreamKind;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    struct RecordingInjector(AtomicU32);

    impl ConsoleInjector for RecordingInjector {
        fn send_interrupt(&self, pid: u32) -> std::io::Result<()> {
            self.0.store(pid, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Runs `sh -c <script>` instead of steamcmd and records the request.
    struct ScriptInstaller {
        script: Option<&'static str>,
        error: Option<&'static str>,
        console: Arc<dyn ConsoleSink>,
        seen: Mutex<Option<UpdateRequest>>,
    }

    #[async_trait::async_trait]
    impl Installer for ScriptInstaller {
        async fn update(&self, request: &UpdateRequest) -> InstallerRun {
            *self.seen.lock().unwrap() = Some(request.clone());
            let process = self.script.map(|script| {
                InstanceProcess::spawn(
                    ProcessStartInfo {
                        target: "/bin/sh".into(),
                        args: vec!["-c".into(), script.into()],
                        working_dir: std::env::temp_dir(),
                        redirect: true,
                    },
                    request.instance,
                    self.console.clone(),
                )
                .unwrap()
            });
            InstallerRun {
                process,
                error: self.error.map(str::to_string),
            }
        }
    }

    fn installer(
        script: Option<&'static str>,
        error: Option<&'static str>,
        console: Arc<dyn ConsoleSink>,
    ) -> Arc<ScriptInstaller> {
        Arc::new(ScriptInstaller {
            script,
            error,
            console,
            seen: Mutex::new(None),
        })
    }

    fn server(root: &Path, hub: Arc<ConsoleHub>) -> Satisfactory {
        let settings = InstanceSettings::new(Uuid::new_v4());
        Satisfactory::new(settings, root, hub.clone(), installer(None, None, hub))
    }

    #[cfg(unix)]
    fn stubborn_server(
        root: &Path,
        hub: Arc<ConsoleHub>,
        embed_console: bool,
        kill_on_timeout: bool,
    ) -> Satisfactory {
        let mut settings = InstanceSettings::new(Uuid::new_v4());
        settings.embed_console = embed_console;
        Satisfactory::new(settings, root, hub.clone(), installer(None, None, hub)).with_options(
            AdapterOptions {
                stop_timeout: Duration::from_millis(300),
                kill_on_timeout,
            },
        )
    }

    /// Puts an executable shell script at the start path.
    #[cfg(unix)]
    fn fake_server(root: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let exe = crate::storage::paths::join_segments(root, START_PATH);
        std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
        std::fs::write(&exe, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Starts the server, retrying while a fork from a concurrent test still
    /// holds the freshly written script open for writing.
    #[cfg(unix)]
    async fn start(server: &Satisfactory) -> InstanceProcess {
        let busy = nix::errno::Errno::ETXTBSY as i32;
        for _ in 0..50 {
            match server.start().await {
                Err(AdapterError::Launch(err)) if err.raw_os_error() == Some(busy) => {
                    tokio::time::sleep(Duration::from_millis(20)).await
                }
                result => return result.unwrap(),
            }
        }
        panic!("server script stayed busy")
    }

    #[cfg(unix)]
    async fn wait_until(mut ready: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !ready() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("server did not get ready");
    }

    #[cfg(unix)]
    fn printed(hub: &ConsoleHub, uuid: Uuid, text: &str) -> bool {
        hub.snapshot(uuid).iter().any(|line| line.text == text)
    }

    #[tokio::test]
    async fn start_without_executable_reports_not_found() {
        let root = tempfile::tempdir().unwrap();
        let server = server(root.path(), Arc::new(ConsoleHub::new(10)));

        let result = server.start().await;

        let report = report(&result);
        let Err(err) = result else {
            panic!("server must not start")
        };
        assert!(matches!(err, AdapterError::NotFound { .. }));
        let message = report.error.unwrap();
        assert!(message.contains(START_PATH.last().unwrap()));
        assert!(message.contains(&server.start_path().display().to_string()));
        // nothing is written before the executable is found
        assert!(!game_ini::config_path(root.path()).exists());
    }

    #[tokio::test]
    async fn create_server_cfg_writes_max_players() {
        let root = tempfile::tempdir().unwrap();
        let hub = Arc::new(ConsoleHub::new(10));
        let mut settings = InstanceSettings::new(Uuid::new_v4());
        settings.max_players = 4;
        let server = Satisfactory::new(settings, root.path(), hub.clone(), installer(None, None, hub));

        let path = server.create_server_cfg().await.unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("MaxPlayers=4"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn start_syncs_config_and_embeds_console() {
        let root = tempfile::tempdir().unwrap();
        fake_server(root.path(), "echo \"args: $*\"\necho warming up >&2\n");
        let hub = Arc::new(ConsoleHub::new(10));
        let server = server(root.path(), hub.clone());

        let mut process = start(&server).await;
        assert!(process.is_embedded());
        assert!(process.wait().await.unwrap().success());

        let lines = hub.snapshot(server.settings().uuid);
        assert!(lines.iter().any(|l| l.stream == StreamKind::Stdout
            && l.text == "args: FactoryGame -log -unattended -Port=7777 -ServerQueryPort=15777"));
        assert!(lines
            .iter()
            .any(|l| l.stream == StreamKind::Stderr && l.text == "warming up"));
        let ini = std::fs::read_to_string(game_ini::config_path(root.path())).unwrap();
        assert!(ini.contains("MaxPlayers=16"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_interrupts_and_reports_exit() {
        let root = tempfile::tempdir().unwrap();
        fake_server(root.path(), "sleep 0.3\nexit 0\n");
        let injector = Arc::new(RecordingInjector(AtomicU32::new(0)));
        let server = server(root.path(), Arc::new(ConsoleHub::new(10)))
            .with_injector(injector.clone());

        let mut process = start(&server).await;
        let outcome = server.stop(&mut process).await.unwrap();

        assert_eq!(outcome, StopOutcome::Exited { code: Some(0) });
        assert_eq!(injector.0.load(Ordering::SeqCst), process.id().unwrap());

        // a second stop sees the exited process right away
        let again = server.stop(&mut process).await.unwrap();
        assert_eq!(again, StopOutcome::Exited { code: Some(0) });
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_returns_within_bound_when_interrupt_is_ignored() {
        let root = tempfile::tempdir().unwrap();
        fake_server(root.path(), "trap '' INT\ntouch ready\nsleep 5\n");
        let server = stubborn_server(root.path(), Arc::new(ConsoleHub::new(10)), false, false);

        let mut process = start(&server).await;
        let marker = root.path().join("ready");
        wait_until(|| marker.exists()).await;

        let started = Instant::now();
        let outcome = server.stop(&mut process).await.unwrap();

        assert_eq!(outcome, StopOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_millis(1500));
        assert!(process.try_wait().unwrap().is_none());
        process.kill().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_times_out_with_embedded_console() {
        let root = tempfile::tempdir().unwrap();
        fake_server(root.path(), "trap '' INT\necho ready\nsleep 5\n");
        let hub = Arc::new(ConsoleHub::new(10));
        let server = stubborn_server(root.path(), hub.clone(), true, false);
        let uuid = server.settings().uuid;

        let mut process = start(&server).await;
        wait_until(|| printed(&hub, uuid, "ready")).await;

        let started = Instant::now();
        let outcome = server.stop(&mut process).await.unwrap();

        assert_eq!(outcome, StopOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_millis(1500));
        assert!(process.try_wait().unwrap().is_none());
        process.kill().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_kills_within_bound_while_pipes_stay_open() {
        let root = tempfile::tempdir().unwrap();
        // the sleep outlives the killed shell and keeps stdout open
        fake_server(root.path(), "trap '' INT\necho ready\nsleep 5\n");
        let hub = Arc::new(ConsoleHub::new(10));
        let server = stubborn_server(root.path(), hub.clone(), true, true);
        let uuid = server.settings().uuid;

        let mut process = start(&server).await;
        wait_until(|| printed(&hub, uuid, "ready")).await;

        let started = Instant::now();
        let outcome = server.stop(&mut process).await.unwrap();

        assert_eq!(outcome, StopOutcome::Killed);
        assert!(started.elapsed() < Duration::from_millis(1500));
        assert!(process.try_wait().unwrap().is_some());
    }

    #[test]
    fn drain_budget_never_passes_deadline() {
        assert_eq!(drain_budget(Instant::now()), Duration::ZERO);
        assert_eq!(
            drain_budget(Instant::now() + Duration::from_secs(60)),
            DRAIN_TIMEOUT
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn update_waits_for_installer_and_keeps_its_error() {
        let root = tempfile::tempdir().unwrap();
        let hub = Arc::new(ConsoleHub::new(10));
        let installer = installer(
            Some("echo Success! App fully installed."),
            Some("Warning: validation skipped"),
            hub.clone(),
        );
        let mut settings = InstanceSettings::new(Uuid::new_v4());
        settings.beta = Some("experimental".into());
        let server = Satisfactory::new(settings, root.path(), hub.clone(), installer.clone());

        let outcome = server.update(true, None).await;

        assert!(outcome.status.unwrap().success());
        assert!(outcome.process.is_some());
        assert_eq!(outcome.error.as_deref(), Some("Warning: validation skipped"));
        assert!(!outcome.is_success());
        assert_eq!(
            hub.snapshot(server.settings().uuid)[0].text,
            "Success! App fully installed."
        );

        let request = installer.seen.lock().unwrap().clone().unwrap();
        assert_eq!(request.app_id, "1690800");
        assert_eq!(request.channel.as_deref(), Some("experimental"));
        assert!(request.validate);
        assert!(request.login_anonymous);
        assert_eq!(request.install_dir, root.path());
    }

    #[tokio::test]
    async fn update_custom_channel_wins_and_missing_process_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let hub = Arc::new(ConsoleHub::new(10));
        let installer = installer(None, None, hub.clone());
        let mut settings = InstanceSettings::new(Uuid::new_v4());
        settings.beta = Some("experimental".into());
        let server = Satisfactory::new(settings, root.path(), hub, installer.clone());

        let outcome = server.update(false, Some("public")).await;

        assert!(outcome.process.is_none());
        assert_eq!(outcome.error.as_deref(), Some("installer did not start"));
        assert!(outcome.report().error.is_some());
        let request = installer.seen.lock().unwrap().clone().unwrap();
        assert_eq!(request.channel.as_deref(), Some("public"));
        assert!(!request.validate);
    }
}
