//! Trap Frames and User Context
//!
//! Types exchanged with the trap entry/exit path.
//!
//! # Trap Sources
//! - `int 0x30` from user mode: system calls, see [`Kernel::syscall`]
//! - Page faults: see [`Kernel::user_fault`]
//!
//! # Security Considerations
//! - Every register value in a [`TrapFrame`] is attacker-controlled
//! - Faults raised by user code terminate only the faulting process
//!
//! [`Kernel::syscall`]: crate::Kernel::syscall
//! [`Kernel::user_fault`]: crate::Kernel::user_fault

use bitflags::bitflags;

use crate::mm::VirtAddr;

/// User code segment selector (GDT index 3, RPL 3).
pub const SEL_UCSEG: u16 = 0x1B;
/// User data segment selector (GDT index 4, RPL 3).
pub const SEL_UDSEG: u16 = 0x23;

bitflags! {
    /// The subset of EFLAGS the kernel sets for user entry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EFlags: u32 {
        /// Must be set.
        const MBS = 1 << 1;
        /// Interrupt enable.
        const IF = 1 << 9;
    }
}

/// Register state captured when user code traps into the kernel.
///
/// System call arguments live on the user stack at `esp`; the result is
/// returned in `eax`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    /// User stack pointer at the time of the trap.
    pub esp: u32,
    /// Return value slot.
    pub eax: u32,
}

impl TrapFrame {
    /// Frame for a trap taken with the given user stack pointer.
    pub const fn new(esp: u32) -> Self {
        Self { esp, eax: 0 }
    }
}

/// FPU state a fresh process starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpuState {
    /// x87 control word.
    pub control_word: u16,
}

impl FpuState {
    /// Control word loaded by `fninit`.
    const FNINIT_CONTROL_WORD: u16 = 0x037F;
    /// Precision control field.
    const PRECISION_CONTROL: u16 = 0x0300;
    /// Rounding control field.
    const ROUNDING_CONTROL: u16 = 0x0C00;

    /// `fninit` state with precision and rounding control cleared.
    pub const fn initial() -> Self {
        Self {
            control_word: Self::FNINIT_CONTROL_WORD
                & !Self::PRECISION_CONTROL
                & !Self::ROUNDING_CONTROL,
        }
    }
}

/// Synthetic interrupt frame used to start a process.
///
/// Restoring this frame is indistinguishable from returning from an
/// interrupt that was taken at the program's entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserContext {
    /// Instruction pointer: the image's entry point.
    pub eip: u32,
    /// Initial user stack pointer, pointing at the fake return address.
    pub esp: u32,
    /// Code segment selector.
    pub cs: u16,
    /// Data segment selector for ds, es, fs, gs, and ss.
    pub ds: u16,
    /// Flags register.
    pub eflags: EFlags,
    /// Floating point state.
    pub fpu: FpuState,
}

impl UserContext {
    /// Context that starts user code at `entry` with stack `stack`.
    pub fn new(entry: VirtAddr, stack: VirtAddr) -> Self {
        Self {
            eip: entry.as_u32(),
            esp: stack.as_u32(),
            cs: SEL_UCSEG,
            ds: SEL_UDSEG,
            eflags: EFlags::IF | EFlags::MBS,
            fpu: FpuState::initial(),
        }
    }
}

/// Where a fault was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    /// User mode.
    User,
    /// Kernel mode.
    Kernel,
}

/// Details of a page fault delivered by the trap path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultInfo {
    /// Faulting address (CR2).
    pub address: VirtAddr,
    /// Privilege level the fault came from.
    pub mode: FaultMode,
    /// Whether the access was a write.
    pub write: bool,
    /// Whether the page was present (protection violation).
    pub present: bool,
}
