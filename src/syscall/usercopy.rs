//! Cópia segura de/para ponteiros de usuário.
//!
//! Antes de tocar memória de usuário, cada página da faixa é validada
//! por page-walk do CR3 corrente (o CR3 da task está carregado durante
//! a syscall, então a presença no walk implica acessibilidade direta).

use super::error::SysError;
use crate::mm::config::FRAME_SIZE;
use crate::mm::vmem;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

/// Limite defensivo para faixas de usuário numa syscall (16 MiB).
const MAX_USER_RANGE: usize = 16 * 1024 * 1024;

/// Toda página de `[addr, addr+len)` está presente?
fn user_range_present(addr: u64, len: usize) -> bool {
    if len == 0 {
        return true;
    }
    if addr == 0 || len > MAX_USER_RANGE {
        return false;
    }
    let end = match addr.checked_add(len as u64) {
        Some(e) => e,
        None => return false,
    };

    let mut page = addr & !(FRAME_SIZE - 1);
    while page < end {
        if vmem::walk_current_cr3(page) == u64::MAX {
            return false;
        }
        page += FRAME_SIZE;
    }
    true
}

/// Copia `len` bytes do usuário para um buffer de kernel.
pub fn copy_from_user(user_src: u64, len: usize) -> Result<Vec<u8>, SysError> {
    if !user_range_present(user_src, len) {
        return Err(SysError::Fault);
    }
    let mut buf = vec![0u8; len];
    // SAFETY: faixa validada página a página no CR3 corrente
    unsafe {
        core::ptr::copy_nonoverlapping(user_src as *const u8, buf.as_mut_ptr(), len);
    }
    Ok(buf)
}

/// Copia um buffer de kernel para o usuário.
pub fn copy_to_user(user_dst: u64, src: &[u8]) -> Result<(), SysError> {
    if !user_range_present(user_dst, src.len()) {
        return Err(SysError::Fault);
    }
    // SAFETY: faixa validada página a página no CR3 corrente
    unsafe {
        core::ptr::copy_nonoverlapping(src.as_ptr(), user_dst as *mut u8, src.len());
    }
    Ok(())
}

/// Lê uma C-string do usuário (até `max` bytes, NUL exclusivo).
pub fn strncpy_from_user(user_src: u64, max: usize) -> Result<String, SysError> {
    if user_src == 0 {
        return Err(SysError::Fault);
    }

    let mut out = Vec::new();
    let mut addr = user_src;

    while out.len() < max {
        // validar a página no primeiro byte e a cada cruzamento
        if addr % FRAME_SIZE == 0 || addr == user_src {
            if vmem::walk_current_cr3(addr) == u64::MAX {
                return Err(SysError::Fault);
            }
        }
        // SAFETY: página validada acima
        let b = unsafe { core::ptr::read_volatile(addr as *const u8) };
        if b == 0 {
            return String::from_utf8(out).map_err(|_| SysError::InvalidArgument);
        }
        out.push(b);
        addr += 1;
    }

    Err(SysError::InvalidArgument) // sem NUL dentro do limite
}
