use std::io;
#[cfg(windows)]
use std::time::Duration;

#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(windows)]
use winapi::shared::minwindef::{FALSE, TRUE};
#[cfg(windows)]
use winapi::um::consoleapi::SetConsoleCtrlHandler;
#[cfg(windows)]
use winapi::um::wincon::{
    AttachConsole, FreeConsole, GenerateConsoleCtrlEvent, ATTACH_PARENT_PROCESS, CTRL_C_EVENT,
};

pub struct ProcessHelper;

impl ProcessHelper {
    /// Delivers the console interrupt (what Ctrl+C in the server window does).
    ///
    /// Unix: `SIGINT`. Windows: attaches to the console of the process and
    /// raises `CTRL_C_EVENT` there, ignoring it in this process meanwhile.
    /// Blocks briefly on Windows; call it off the async executor.
    pub fn interrupt(pid: u32) -> io::Result<()> {
        #[cfg(unix)]
        {
            let pid = Pid::from_raw(pid as i32);
            kill(pid, Signal::SIGINT).map_err(io::Error::from)?;
            Ok(())
        }
        #[cfg(windows)]
        {
            unsafe {
                FreeConsole();
                if AttachConsole(pid) == 0 {
                    let err = io::Error::last_os_error();
                    AttachConsole(ATTACH_PARENT_PROCESS);
                    return Err(err);
                }
                SetConsoleCtrlHandler(None, TRUE);
                let sent = GenerateConsoleCtrlEvent(CTRL_C_EVENT, 0);
                let err = io::Error::last_os_error();
                // the event is dispatched asynchronously, keep ignoring it for a moment
                std::thread::sleep(Duration::from_millis(100));
                FreeConsole();
                AttachConsole(ATTACH_PARENT_PROCESS);
                SetConsoleCtrlHandler(None, FALSE);
                if sent == 0 {
                    Err(err)
                } else {
                    Ok(())
                }
            }
        }
        #[cfg(not(any(unix, windows)))]
        {
            let _ = pid;
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "console interrupt is not supported on this platform",
            ))
        }
    }
}
