//! Detached process launching and child reaping. The reaping handler is
//! async-signal-safe and touches no window-manager state.

use std::process::{Command, Stdio};

use tracing::error;

use crate::core::context::SetupError;

/// Launch a user command in its own session with stdio detached, so it
/// outlives the window manager and never writes to our terminal.
pub fn launch(argv: &[&str]) {
    let Some((program, args)) = argv.split_first() else {
        return;
    };
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    unsafe {
        use std::os::unix::process::CommandExt;
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }
    if let Err(e) = cmd.spawn() {
        error!("failed to spawn {}: {}", program, e);
    }
}

extern "C" fn reap_children(_signal: libc::c_int) {
    // Non-blocking wait for any finished child; only async-signal-safe
    // calls allowed here.
    unsafe {
        while libc::waitpid(-1, std::ptr::null_mut(), libc::WNOHANG) > 0 {}
    }
}

/// Install the SIGCHLD reaper and collect any children inherited from a
/// previous incarnation. Failure is fatal: without it, spawned commands
/// would accumulate as zombies.
pub fn install_sigchld() -> Result<(), SetupError> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        let handler: extern "C" fn(libc::c_int) = reap_children;
        action.sa_sigaction = handler as usize;
        action.sa_flags = libc::SA_RESTART | libc::SA_NOCLDSTOP;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGCHLD, &action, std::ptr::null_mut()) != 0 {
            return Err(SetupError::Sigchld);
        }
        while libc::waitpid(-1, std::ptr::null_mut(), libc::WNOHANG) > 0 {}
    }
    Ok(())
}
