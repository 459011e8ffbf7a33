/*!
 * Status Renderer
 * Spinner, four-zone memory bar, and job count on the controlling
 * terminal
 *
 * The renderer owns a duplicated stderr descriptor so status writes
 * never contend with recipe output, and it queries the terminal
 * exactly once, at startup, under a termios save/restore. After any
 * broken-pipe or bad-descriptor write it disables itself permanently.
 */

use crate::core::limits::{STATUS_BAR_WIDTH, STATUS_VISIBLE_LEN};
use crate::core::{MemorySnapshot, MiB};
use log::{debug, info};
use nix::errno::Errno;
use nix::sys::termios::{tcgetattr, tcsetattr, SetArg};
use nix::unistd::write as fd_write;
use std::io::{self, IsTerminal};
use std::os::fd::{AsFd, FromRawFd, OwnedFd};

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const PURPLE: &str = "\x1b[1;35m";
const GREEN: &str = "\x1b[1;32m";
const YELLOW: &str = "\x1b[1;33m";
const GRAY: &str = "\x1b[0;90m";
const WHITE: &str = "\x1b[1;37m";
const RESET: &str = "\x1b[0m";

const FILLED: &str = "█";
const LIGHT: &str = "░";

/// Cursor-save, clear-line, newline: the terminal restore sequence
const RESTORE_SEQ: &[u8] = b"\r\x1b[K\n";

enum State {
    Active {
        fd: OwnedFd,
        term_width: u16,
        /// Both stderr and stdout are terminals; use cursor movement
        /// instead of plain lines
        tty_pair: bool,
        drew: bool,
    },
    Disabled,
}

/// Single-line status renderer over a private stderr duplicate
pub struct StatusRenderer {
    state: State,
    spinner_frame: usize,
}

impl StatusRenderer {
    /// Probe the terminal once and build the renderer, disabled when
    /// the display is off or the terminal cannot be queried
    pub fn new(display_enabled: bool) -> Self {
        let state = Self::activate(display_enabled);
        Self {
            state,
            spinner_frame: 0,
        }
    }

    fn activate(display_enabled: bool) -> State {
        if !display_enabled {
            return State::Disabled;
        }
        if !io::stderr().is_terminal() {
            debug!("stderr is not a terminal, status display off");
            return State::Disabled;
        }

        let term_width = query_term_width();
        if term_width == 0 {
            info!("could not obtain terminal width, status display off");
            return State::Disabled;
        }

        // A private duplicate keeps status writes off the descriptor
        // the recipes share.
        let raw = unsafe { libc::dup(libc::STDERR_FILENO) };
        if raw < 0 {
            info!("could not duplicate stderr, status display off");
            return State::Disabled;
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        State::Active {
            fd,
            term_width,
            tty_pair: io::stdout().is_terminal(),
            drew: false,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    /// Draw one status line; returns whether anything was written
    pub fn render(&mut self, snapshot: &MemorySnapshot) -> bool {
        let State::Active {
            fd,
            term_width,
            tty_pair,
            drew,
        } = &mut self.state
        else {
            return false;
        };

        let spinner = SPINNER[self.spinner_frame % SPINNER.len()];
        self.spinner_frame = self.spinner_frame.wrapping_add(1);

        let bar = build_bar(snapshot);
        let status = format!(
            "{spinner}{bar} {WHITE}{}%{RESET} {GRAY}({}MiB){RESET} {GRAY}{} jobs{RESET}",
            snapshot.used_percent, snapshot.free_mib, snapshot.jobs
        );

        let out = if *tty_pair {
            // Up one line, save cursor, jump right, draw, restore: the
            // status rides the line above the current recipe message.
            let col = term_width.saturating_sub(STATUS_VISIBLE_LEN).max(1);
            format!("\x1b[A\x1b[s\x1b[{col}G{status}\x1b[u\x1b[B")
        } else {
            // Piped somewhere: plain lines only
            format!("{status}\n")
        };

        match fd_write(fd.as_fd(), out.as_bytes()) {
            Ok(_) => {
                *drew = true;
                true
            }
            Err(Errno::EPIPE) | Err(Errno::EBADF) => {
                debug!("status stream closed, disabling display");
                self.state = State::Disabled;
                false
            }
            Err(_) => false,
        }
    }

    /// Restore the terminal and permanently release the descriptor
    pub fn finish(&mut self) {
        if let State::Active {
            fd, tty_pair, drew, ..
        } = &self.state
        {
            if *drew && *tty_pair {
                let _ = fd_write(fd.as_fd(), RESTORE_SEQ);
            }
        }
        self.state = State::Disabled;
    }
}

impl Drop for StatusRenderer {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Write the terminal restore sequence straight to stderr, for the
/// immediate-stop path that cannot wait for the monitor thread
pub(crate) fn restore_terminal() {
    if io::stderr().is_terminal() && io::stdout().is_terminal() {
        let _ = fd_write(io::stderr().as_fd(), RESTORE_SEQ);
    }
}

/// Terminal width from one ioctl, under a termios save/restore so the
/// query cannot perturb the terminal the build is using
fn query_term_width() -> u16 {
    let stderr = io::stderr();
    let saved = tcgetattr(&stderr).ok();

    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(libc::STDERR_FILENO, libc::TIOCGWINSZ, &mut ws) };

    if let Some(termios) = &saved {
        let _ = tcsetattr(&stderr, SetArg::TCSANOW, termios);
    }

    if rc == 0 {
        ws.ws_col
    } else {
        0
    }
}

/// Compose the four-zone bar: build-tracked, other used, imminent, free
fn build_bar(snapshot: &MemorySnapshot) -> String {
    let (tracked, other, imminent, free) = zone_widths(snapshot);
    let mut bar = String::new();
    if tracked > 0 {
        bar.push_str(PURPLE);
        (0..tracked).for_each(|_| bar.push_str(FILLED));
    }
    if other > 0 {
        bar.push_str(GREEN);
        (0..other).for_each(|_| bar.push_str(FILLED));
    }
    if imminent > 0 {
        bar.push_str(YELLOW);
        (0..imminent).for_each(|_| bar.push_str(LIGHT));
    }
    if free > 0 {
        bar.push_str(GRAY);
        (0..free).for_each(|_| bar.push_str(LIGHT));
    }
    bar.push_str(RESET);
    bar
}

/// Zone widths in columns, proportional to each share of total memory
fn zone_widths(snapshot: &MemorySnapshot) -> (MiB, MiB, MiB, MiB) {
    let bar = STATUS_BAR_WIDTH;
    let total = snapshot.total_mib.max(1);

    let tracked = (snapshot.tracked_mib * bar / total).min(bar);
    let used = (snapshot.used_percent as MiB * bar / 100).min(bar);
    let other = used.saturating_sub(tracked).min(bar - tracked);
    let imminent = (snapshot.imminent_mib * bar / total).min(bar - tracked - other);
    let free = bar - tracked - other - imminent;
    (tracked, other, imminent, free)
}
