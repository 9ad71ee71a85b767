/// Process group termination
/// Every command runs as the leader of its own process group, so killing the
/// group reaches anything the command forked, unless it started a session of
/// its own; those are caught by the subreaper sweep.
use nix::errno::Errno;
use nix::sys::prctl;
use nix::sys::signal::{kill, killpg, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::{getpid, getsid, Pid};
use std::fs;

/// Send SIGKILL to the whole group led by `pgid`.
///
/// An already empty group (ESRCH) counts as success.
pub fn kill_group(pgid: u32) -> Result<(), Errno> {
    let pid = i32::try_from(pgid).map_err(|_| Errno::EINVAL)?;
    if pid <= 1 {
        return Err(Errno::EINVAL);
    }

    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Become the subreaper for everything this process spawns.
///
/// Descendants whose parent dies are reparented here instead of to init, which
/// is what lets [`kill_escaped_children`] find commands that left their group.
pub fn become_subreaper() -> Result<(), Errno> {
    prctl::set_child_subreaper(true)
}

/// Fields of `/proc/<pid>/stat` used to spot escaped processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProcStat {
    ppid: i32,
    pgrp: i32,
    session: i32,
}

fn parse_stat(stat: &str) -> Option<ProcStat> {
    // comm may contain spaces and parentheses
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace().skip(1);
    Some(ProcStat {
        ppid: fields.next()?.parse().ok()?,
        pgrp: fields.next()?.parse().ok()?,
        session: fields.next()?.parse().ok()?,
    })
}

/// Kill and reap children of this process that run in a session of their own.
///
/// Commands never start a new session, so such a child is a descendant that
/// called setsid(2) and was reparented here after its parent died. Returns
/// how many were killed.
pub fn kill_escaped_children() -> usize {
    let me = getpid().as_raw();
    let Ok(my_session) = getsid(None) else {
        return 0;
    };
    let Ok(entries) = fs::read_dir("/proc") else {
        return 0;
    };

    let mut killed = 0;
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|name| name.parse::<i32>().ok()) else {
            continue;
        };
        let Some(stat) = fs::read_to_string(entry.path().join("stat"))
            .ok()
            .and_then(|raw| parse_stat(&raw))
        else {
            continue;
        };
        if stat.ppid != me || stat.session == my_session.as_raw() {
            continue;
        }

        log::warn!("Killing process {} that escaped into session {}", pid, stat.session);
        if let Ok(pgrp) = u32::try_from(stat.pgrp) {
            let _ = kill_group(pgrp);
        }
        let child = Pid::from_raw(pid);
        let _ = kill(child, Signal::SIGKILL);
        while waitpid(child, None) == Err(Errno::EINTR) {}
        killed += 1;
    }
    killed
}
