//! End-to-end dispatcher tests: raise supervisor-call interrupts against a
//! mock emulator and watch complete syscalls go through the kernel.

use guestbox::arch::{arm, arm64, Arch, EXCP_SWI};
use guestbox::emulator::HookResult;
use guestbox_common_linux::{Errno, AT_FDCWD};
use guestbox_emulator_mock::{MockContext, MockEmulator};
use guestbox_kernel_linux::{KernelError, LinuxKernel, TaskExit};

/// An `svc #imm` instruction word for AArch64.
fn svc_a64(imm: u16) -> u32 {
    0xD400_0001 | (u32::from(imm) << 5)
}

/// Place an AArch64 `svc` at a fixed spot and point the context's PC past it.
fn arm64_trap(emu: &'static MockEmulator, ctx: &MockContext, imm: u16) {
    const TEXT: u64 = 0x10_0000;
    emu.install(TEXT, &svc_a64(imm).to_le_bytes());
    ctx.set_reg(arm64::PC, TEXT + 4);
}

#[test]
fn arm64_write_goes_through_the_kernel() {
    let emu = MockEmulator::leaked(Arch::Arm64);
    let _kernel = LinuxKernel::new(emu).unwrap();
    let ctx = emu.new_context(1);

    let msg = emu.install(0x20_0000, b"hi");
    arm64_trap(emu, &ctx, 0);
    ctx.set_reg(arm64::X8, 64); // write
    ctx.set_reg(arm64::X0, 1);
    ctx.set_reg(arm64::X1, msg.addr());
    ctx.set_reg(arm64::X2, 2);

    assert_eq!(emu.raise_interrupt(&ctx, EXCP_SWI), HookResult::Done);
    assert_eq!(ctx.reg(arm64::X0), 2);
    assert_eq!(emu.stdout_bytes(), b"hi");
}

#[test]
fn nonzero_svc_immediates_pass_through() {
    let emu = MockEmulator::leaked(Arch::Arm64);
    let _kernel = LinuxKernel::new(emu).unwrap();
    let ctx = emu.new_context(1);

    arm64_trap(emu, &ctx, 1);
    ctx.set_reg(arm64::X8, 64);
    ctx.set_reg(arm64::X0, 0x55);
    assert_eq!(emu.raise_interrupt(&ctx, EXCP_SWI), HookResult::Next);
    // The result register is untouched.
    assert_eq!(ctx.reg(arm64::X0), 0x55);
}

#[test]
fn unknown_syscall_numbers_pass_through() {
    let emu = MockEmulator::leaked(Arch::Arm64);
    let _kernel = LinuxKernel::new(emu).unwrap();
    let ctx = emu.new_context(1);

    arm64_trap(emu, &ctx, 0);
    ctx.set_reg(arm64::X8, 9999);
    assert_eq!(emu.raise_interrupt(&ctx, EXCP_SWI), HookResult::Next);
}

#[test]
fn other_interrupt_kinds_pass_through() {
    let emu = MockEmulator::leaked(Arch::Arm64);
    let _kernel = LinuxKernel::new(emu).unwrap();
    let ctx = emu.new_context(1);
    assert_eq!(emu.raise_interrupt(&ctx, 5), HookResult::Next);
}

#[test]
fn failing_syscalls_set_errno_after_a_clean_slate() {
    let emu = MockEmulator::leaked(Arch::Arm64);
    let kernel = LinuxKernel::new(emu).unwrap();
    let ctx = emu.new_context(1);
    kernel.set_errno(Errno::EIO); // stale value from an earlier call

    let path = emu.install(0x30_0000, b"/no/such/file\0");
    arm64_trap(emu, &ctx, 0);
    ctx.set_reg(arm64::X8, 56); // openat
    ctx.set_reg(arm64::X0, AT_FDCWD as i64 as u64);
    ctx.set_reg(arm64::X1, path.addr());
    ctx.set_reg(arm64::X2, 0);
    ctx.set_reg(arm64::X3, 0);

    assert_eq!(emu.raise_interrupt(&ctx, EXCP_SWI), HookResult::Done);
    assert_eq!(ctx.reg(arm64::X0), u64::MAX);
    assert_eq!(kernel.errno(), Some(Errno::ENOENT));
}

#[test]
fn successful_syscalls_leave_errno_clear() {
    let emu = MockEmulator::leaked(Arch::Arm64);
    let kernel = LinuxKernel::new(emu).unwrap();
    let ctx = emu.new_context(1);
    kernel.set_errno(Errno::EIO);

    let msg = emu.install(0x20_0000, b"ok");
    arm64_trap(emu, &ctx, 0);
    ctx.set_reg(arm64::X8, 64);
    ctx.set_reg(arm64::X0, 1);
    ctx.set_reg(arm64::X1, msg.addr());
    ctx.set_reg(arm64::X2, 2);
    assert_eq!(emu.raise_interrupt(&ctx, EXCP_SWI), HookResult::Done);
    assert_eq!(kernel.errno(), None);
}

#[test]
fn arm_mode_decodes_swi_and_thumb_encodings() {
    let emu = MockEmulator::leaked(Arch::Arm);
    let _kernel = LinuxKernel::new(emu).unwrap();

    // A32: `svc #0` behind the PC, NR in R7.
    let ctx = emu.new_context(1);
    let msg = emu.install(0x20_0000, b"arm");
    emu.install(0x10_0000, &0xEF00_0000u32.to_le_bytes());
    ctx.set_reg(arm::PC, 0x10_0000 + 4);
    ctx.set_reg(arm::CPSR, 0);
    ctx.set_reg(arm::R7, 4); // write
    ctx.set_reg(arm::R0, 1);
    ctx.set_reg(arm::R1, msg.addr());
    ctx.set_reg(arm::R2, 3);
    assert_eq!(emu.raise_interrupt(&ctx, EXCP_SWI), HookResult::Done);
    assert_eq!(ctx.reg(arm::R0), 3);

    // T32: `svc #0` is a halfword and the PC sits two bytes past it.
    let thumb = emu.new_context(2);
    emu.install(0x11_0000, &0xDF00u16.to_le_bytes());
    thumb.set_reg(arm::PC, 0x11_0000 + 2);
    thumb.set_reg(arm::CPSR, arm::CPSR_T);
    thumb.set_reg(arm::R7, 4);
    thumb.set_reg(arm::R0, 1);
    thumb.set_reg(arm::R1, msg.addr());
    thumb.set_reg(arm::R2, 3);
    assert_eq!(emu.raise_interrupt(&thumb, EXCP_SWI), HookResult::Done);
    assert_eq!(thumb.reg(arm::R0), 3);

    // A non-zero SWI immediate is not ours.
    let other = emu.new_context(3);
    emu.install(0x12_0000, &0xEF00_0001u32.to_le_bytes());
    other.set_reg(arm::PC, 0x12_0000 + 4);
    other.set_reg(arm::R7, 4);
    assert_eq!(emu.raise_interrupt(&other, EXCP_SWI), HookResult::Next);
}

#[test]
fn exit_unwinds_with_a_task_exit_payload() {
    let emu = MockEmulator::leaked(Arch::Arm64);
    let _kernel = LinuxKernel::new(emu).unwrap();
    let ctx = emu.new_context(1);

    arm64_trap(emu, &ctx, 0);
    ctx.set_reg(arm64::X8, 93); // exit
    ctx.set_reg(arm64::X0, 7);

    let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        emu.raise_interrupt(&ctx, EXCP_SWI)
    }))
    .expect_err("exit must unwind");
    let exit = unwound.downcast::<TaskExit>().expect("TaskExit payload");
    assert_eq!(exit.status, 7);
}

#[test]
fn closing_the_kernel_releases_the_hook() {
    let emu = MockEmulator::leaked(Arch::Arm64);
    let kernel = LinuxKernel::new(emu).unwrap();
    let ctx = emu.new_context(1);

    let msg = emu.install(0x20_0000, b"hi");
    arm64_trap(emu, &ctx, 0);
    ctx.set_reg(arm64::X8, 64);
    ctx.set_reg(arm64::X0, 1);
    ctx.set_reg(arm64::X1, msg.addr());
    ctx.set_reg(arm64::X2, 2);

    kernel.close();
    assert_eq!(emu.raise_interrupt(&ctx, EXCP_SWI), HookResult::Next);
}

#[test]
fn x86_guests_have_no_trap_dispatcher() {
    let emu = MockEmulator::leaked(Arch::X86_64);
    match LinuxKernel::new(emu) {
        Err(KernelError::UnsupportedArch(Arch::X86_64)) => {}
        other => panic!("expected UnsupportedArch, got {:?}", other.err()),
    }
}
