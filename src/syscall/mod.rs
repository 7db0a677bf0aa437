//! System Call Interface
//!
//! Entry point for traps raised by user code with `int 0x30`.
//!
//! # Security Model
//! - Whitelist approach: only the numbers in [`SyscallNumber`] are accepted
//! - All parameters are validated before use
//! - Invalid inputs return errors, never panic
//! - A call that names memory the caller cannot access terminates the
//!   caller with status -1
//!
//! # Syscalls
//! | nr | call | result |
//! |----|------|--------|
//! | 0 | `halt()` | does not return |
//! | 1 | `exit(status)` | does not return |
//! | 2 | `exec(cmd_line)` | child pid or -1 |
//! | 3 | `wait(pid)` | child status or -1 |
//! | 4 | `create(path, size)` | bool |
//! | 5 | `remove(path)` | bool |
//! | 6 | `open(path)` | fd or -1 |
//! | 7 | `filesize(fd)` | bytes or -1 |
//! | 8 | `read(fd, buf, size)` | bytes or -1 |
//! | 9 | `write(fd, buf, size)` | bytes or -1 |
//! | 10 | `seek(fd, pos)` | none |
//! | 11 | `tell(fd)` | position or -1 |
//! | 12 | `close(fd)` | none |
//! | 13 | `practice(n)` | n + 1 |

pub mod abi;
mod handler;
pub mod validate;

pub use abi::{Syscall, SyscallNumber};
pub use handler::{dispatch, Outcome};
pub use validate::UserFault;
