//! Syscalls de processo: exit, getpid, kill, arch_prctl.

use super::error::{SysError, SysResult};
use super::usercopy::copy_to_user;
use crate::arch::x86_64::cpu::{rdmsr, wrmsr};

/* códigos do arch_prctl */
const ARCH_SET_GS: i32 = 0x1001;
const ARCH_SET_FS: i32 = 0x1002;
const ARCH_GET_FS: i32 = 0x1003;
const ARCH_GET_GS: i32 = 0x1004;

const MSR_FS_BASE: u32 = 0xC000_0100;
const MSR_GS_BASE: u32 = 0xC000_0101;

/// exit(code): marca a task morta e força o reschedule. Nunca retorna.
pub fn sys_exit(code: i32) -> SysResult {
    crate::kdebug!(
        "(Syscall) exit(tid={}, code={})",
        crate::sched::scheduler::task_current_tid(),
        code
    );
    crate::sched::scheduler::task_exit();
}

/// getpid(): tid da task corrente.
pub fn sys_getpid() -> SysResult {
    Ok(crate::sched::scheduler::task_current_tid() as u64)
}

/// kill(pid, sig): stub — aceita qualquer entrada e reporta sucesso
/// (não há entrega de sinais nesta release).
pub fn sys_kill(_pid: u64, _sig: u64) -> SysResult {
    Ok(0)
}

/// arch_prctl: base de FS/GS via MSR (TLS da libc hospedada).
pub fn sys_arch_prctl(code: i32, addr: u64) -> SysResult {
    match code {
        ARCH_SET_FS => {
            // SAFETY: escrever FS_BASE só afeta a task corrente
            unsafe { wrmsr(MSR_FS_BASE, addr) };
            Ok(0)
        }
        ARCH_SET_GS => {
            // SAFETY: idem para GS_BASE
            unsafe { wrmsr(MSR_GS_BASE, addr) };
            Ok(0)
        }
        ARCH_GET_FS => {
            let v = rdmsr(MSR_FS_BASE);
            copy_to_user(addr, &v.to_le_bytes())?;
            Ok(0)
        }
        ARCH_GET_GS => {
            let v = rdmsr(MSR_GS_BASE);
            copy_to_user(addr, &v.to_le_bytes())?;
            Ok(0)
        }
        _ => Err(SysError::InvalidArgument),
    }
}
