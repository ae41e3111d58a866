//! Dispatcher único de syscalls.
//!
//! As duas entradas (gate 128 e instrução `syscall`) entregam o mesmo
//! `ContextFrame`; o número vem de RAX e os argumentos de
//! RDI/RSI/RDX/R10/R8/R9. O resultado (ou errno negado) volta em RAX.

use super::error::SysError;
use super::numbers::*;
use crate::arch::x86_64::idt::ContextFrame;

/// Argumentos decodificados de uma syscall.
#[derive(Debug, Clone, Copy)]
pub struct SyscallArgs {
    pub num: usize,
    pub arg1: u64,
    pub arg2: u64,
    pub arg3: u64,
    pub arg4: u64,
    pub arg5: u64,
    pub arg6: u64,
}

/// Entrada comum: decodifica o frame, despacha e grava RAX.
pub fn handle_trap(frame: &mut ContextFrame) {
    let args = SyscallArgs {
        num: frame.rax as usize,
        arg1: frame.rdi,
        arg2: frame.rsi,
        arg3: frame.rdx,
        arg4: frame.r10,
        arg5: frame.r8,
        arg6: frame.r9,
    };

    crate::ktrace!(
        "[SYSCALL] num={} a1={:#x} a2={:#x}",
        args.num,
        args.arg1,
        args.arg2
    );

    let ret = match dispatch(&args) {
        Ok(v) => v,
        Err(e) => e.as_ret(),
    };

    frame.rax = ret;
}

fn dispatch(args: &SyscallArgs) -> super::error::SysResult {
    match args.num {
        SYS_READ => super::fs::sys_read(args.arg1 as i32, args.arg2, args.arg3 as usize),
        SYS_WRITE => super::fs::sys_write(args.arg1 as i32, args.arg2, args.arg3 as usize),
        SYS_OPEN => super::fs::sys_open(args.arg1, args.arg2 as i32, args.arg3 as i32),
        SYS_CLOSE => super::fs::sys_close(args.arg1 as i32),
        SYS_FSTAT => super::fs::sys_fstat(args.arg1 as i32, args.arg2),
        SYS_LSEEK => super::fs::sys_lseek(args.arg1 as i32, args.arg2 as i64, args.arg3 as i32),
        SYS_SBRK => super::memory::sys_sbrk(args.arg1 as i64),
        SYS_GETPID => super::process::sys_getpid(),
        SYS_EXIT => super::process::sys_exit(args.arg1 as i32),
        SYS_KILL => super::process::sys_kill(args.arg1, args.arg2),
        SYS_ISATTY => super::fs::sys_isatty(args.arg1 as i32),
        SYS_ARCH_PRCTL => super::process::sys_arch_prctl(args.arg1 as i32, args.arg2),
        SYS_GET_REENT => super::memory::sys_get_reent(args.arg1),
        _ => {
            crate::kwarn!("(Syscall) número desconhecido: {}", args.num);
            Err(SysError::NoSys)
        }
    }
}
