//! Syscalls de arquivo: read/write/open/close/lseek/fstat/isatty.
//!
//! A tabela de fds da task corrente é copiada para fora do lock da
//! arena antes de qualquer operação que possa bloquear (read no fd 0
//! espera teclado) e gravada de volta ao final — no modelo single-CPU
//! só a própria task mexe na própria tabela.

use super::error::{SysError, SysResult};
use super::usercopy::{copy_from_user, copy_to_user, strncpy_from_user};
use crate::fs::vfs::{self, FdTable};
use crate::sched::scheduler::with_current;
use alloc::vec;

/// Executa `f` sobre uma cópia da FdTable da task corrente e persiste
/// as mudanças.
fn with_fds<T>(f: impl FnOnce(&mut FdTable) -> T) -> Result<T, SysError> {
    let mut fds = with_current(|t| t.fds).ok_or(SysError::BadFd)?;
    let r = f(&mut fds);
    with_current(|t| t.fds = fds);
    Ok(r)
}

pub fn sys_read(fd: i32, user_buf: u64, len: usize) -> SysResult {
    if len == 0 {
        return Ok(0);
    }
    // validar o destino antes de bloquear no teclado
    let mut kbuf = vec![0u8; len];
    copy_to_user(user_buf, &kbuf)?;

    let n = with_fds(|fds| vfs::read_with(fds, fd, &mut kbuf))?;
    if n < 0 {
        return Err(SysError::BadFd);
    }
    copy_to_user(user_buf, &kbuf[..n as usize])?;
    Ok(n as u64)
}

pub fn sys_write(fd: i32, user_buf: u64, len: usize) -> SysResult {
    if len == 0 {
        return Ok(0);
    }
    let data = copy_from_user(user_buf, len)?;
    let n = with_fds(|fds| vfs::write_with(fds, fd, &data))?;
    if n < 0 {
        return Err(SysError::BadFd);
    }
    Ok(n as u64)
}

pub fn sys_open(user_path: u64, flags: i32, mode: i32) -> SysResult {
    let path = strncpy_from_user(user_path, vfs::MAX_PATH)?;
    let fd = with_fds(|fds| vfs::open_with(fds, &path, flags, mode))?;
    if fd < 0 {
        return Err(SysError::NotFound);
    }
    Ok(fd as u64)
}

pub fn sys_close(fd: i32) -> SysResult {
    let r = with_fds(|fds| vfs::close_with(fds, fd))?;
    if r < 0 {
        return Err(SysError::BadFd);
    }
    Ok(0)
}

pub fn sys_lseek(fd: i32, offset: i64, whence: i32) -> SysResult {
    let r = with_fds(|fds| vfs::lseek_with(fds, fd, offset, whence))?;
    if r < 0 {
        return Err(SysError::BadFd);
    }
    Ok(r as u64)
}

/// fstat mínimo: preenche os campos de modo e tamanho do `struct stat`
/// da libc hospedada. O modo é gravado nos offsets 0 e 16 e o tamanho
/// nos offsets 40 e 48 para cobrir as duas variantes de layout que os
/// stubs conhecem.
pub fn sys_fstat(fd: i32, user_statbuf: u64) -> SysResult {
    let (mode, size) = with_fds(|fds| vfs::fstat_with(fds, fd))?.map_err(|_| SysError::BadFd)?;

    copy_to_user(user_statbuf, &mode.to_le_bytes())?;
    copy_to_user(user_statbuf + 16, &mode.to_le_bytes())?;
    copy_to_user(user_statbuf + 40, &size.to_le_bytes())?;
    copy_to_user(user_statbuf + 48, &size.to_le_bytes())?;
    Ok(0)
}

pub fn sys_isatty(fd: i32) -> SysResult {
    Ok(if vfs::isatty(fd) { 1 } else { 0 })
}
