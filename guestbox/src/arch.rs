//! Guest architecture tags and register identifiers.

/// The instruction-set architecture a guest executes under.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Arch {
    /// 32-bit ARM (A32 and T32 encodings).
    Arm,
    /// AArch64.
    Arm64,
    /// 32-bit x86.
    X86,
    /// x86-64.
    X86_64,
}

impl Arch {
    /// Width of a guest pointer in bytes.
    pub const fn pointer_size(self) -> u64 {
        match self {
            Arch::Arm | Arch::X86 => 4,
            Arch::Arm64 | Arch::X86_64 => 8,
        }
    }

    /// Whether guest `long` and pointers are 64 bits wide.
    pub const fn is_64bit(self) -> bool {
        matches!(self, Arch::Arm64 | Arch::X86_64)
    }
}

/// An architecture-scoped register identifier.
///
/// The numbering is private to each architecture module below; an emulator
/// interprets a `RegId` according to its own [`Arch`]. Identifiers from
/// different architectures must never be mixed.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RegId(pub u16);

/// The interrupt number raised by ARM-family cores for a supervisor-call
/// exception (`SVC`/`SWI`). Shared by A32, T32 and AArch64 execution states.
pub const EXCP_SWI: u64 = 2;

/// Registers of a 32-bit ARM core.
pub mod arm {
    use super::RegId;

    pub const R0: RegId = RegId(0);
    pub const R1: RegId = RegId(1);
    pub const R2: RegId = RegId(2);
    pub const R3: RegId = RegId(3);
    pub const R4: RegId = RegId(4);
    pub const R5: RegId = RegId(5);
    pub const R6: RegId = RegId(6);
    pub const R7: RegId = RegId(7);
    pub const SP: RegId = RegId(13);
    pub const LR: RegId = RegId(14);
    pub const PC: RegId = RegId(15);
    pub const CPSR: RegId = RegId(16);
    /// The user read-only thread id register (`TPIDRURO`), written through
    /// coprocessor register `c13, c0, 3`. Used as the TLS base.
    pub const C13_C0_3: RegId = RegId(17);

    /// The Thumb execution-state bit in `CPSR`.
    pub const CPSR_T: u64 = 1 << 5;
}

/// Registers of an AArch64 core.
pub mod arm64 {
    use super::RegId;

    pub const X0: RegId = RegId(0);
    pub const X1: RegId = RegId(1);
    pub const X2: RegId = RegId(2);
    pub const X3: RegId = RegId(3);
    pub const X4: RegId = RegId(4);
    pub const X5: RegId = RegId(5);
    pub const X6: RegId = RegId(6);
    pub const X7: RegId = RegId(7);
    pub const X8: RegId = RegId(8);
    pub const SP: RegId = RegId(31);
    pub const PC: RegId = RegId(32);
    /// EL0 thread pointer; the TLS base register.
    pub const TPIDR_EL0: RegId = RegId(33);
}

/// Registers of a 32-bit x86 core (only what the kernel touches).
pub mod x86 {
    use super::RegId;

    pub const ESP: RegId = RegId(4);
    pub const EIP: RegId = RegId(8);
    /// Segment register used as the TLS base on 32-bit x86.
    pub const GS: RegId = RegId(20);
}

/// Registers of an x86-64 core (only what the kernel touches).
pub mod x86_64 {
    use super::RegId;

    pub const RSP: RegId = RegId(4);
    pub const RIP: RegId = RegId(8);
    /// Segment register used as the TLS base on x86-64.
    pub const FS: RegId = RegId(21);
}
