//! Syscalls de memória: sbrk e get_reent.

use super::error::{SysError, SysResult};
use crate::klib::align::align_up;
use crate::mm::config::{FRAME_SIZE, USER_HEAP_BASE};
use crate::mm::paging::{self, MapFlags};
use crate::mm::pmm;
use crate::sched::scheduler::with_current;
use alloc::vec::Vec;

/// sbrk(inc): move o program break da task para cima, mapeando frames
/// `PRESENT|RW|USER` a partir de `USER_HEAP_BASE`. Retorna o break
/// antigo. Encolher (inc < 0) não é suportado e devolve -1 cru.
///
/// Falha de alocação no meio é revertida por completo: frames recém
/// alocados voltam ao PMM e páginas já mapeadas são desfeitas.
pub fn sys_sbrk(inc: i64) -> SysResult {
    // estado do break da task corrente
    let (base, size, pml4) = with_current(|t| {
        if t.user_brk == 0 {
            t.user_brk = USER_HEAP_BASE;
            t.user_brk_size = 0;
        }
        (t.user_brk, t.user_brk_size, t.pml4_phys)
    })
    .ok_or(SysError::InvalidArgument)?;

    let current_brk = base + size;

    if inc == 0 {
        return Ok(current_brk);
    }
    if inc < 0 {
        // Encolher não é suportado. Este caso devolve o -1 CRU em RAX
        // (e não um errno negado): é o valor que o stub de sbrk da
        // libc hospedada compara literalmente.
        return Ok(u64::MAX);
    }

    let new_end = current_brk
        .checked_add(inc as u64)
        .ok_or(SysError::InvalidArgument)?;

    // páginas novas: da primeira ainda não mapeada até o fim arredondado
    let map_start = align_up(current_brk, FRAME_SIZE);
    let map_end = align_up(new_end, FRAME_SIZE);
    let pages = (map_end.saturating_sub(map_start)) / FRAME_SIZE;

    if pages == 0 {
        // sem cruzar fronteira de página: só cresce o tamanho lógico
        with_current(|t| t.user_brk_size = new_end - base);
        return Ok(current_brk);
    }

    // alocar todos os frames primeiro (rollback simples)
    let mut frames: Vec<u64> = Vec::with_capacity(pages as usize);
    for _ in 0..pages {
        match pmm::alloc_frame() {
            Some(f) => frames.push(f.as_u64()),
            None => {
                for phys in frames {
                    pmm::free_frame(crate::mm::PhysAddr::new(phys));
                }
                return Err(SysError::OutOfMemory);
            }
        }
    }

    // zerar e mapear; em falha de mapeamento, desfazer tudo
    let flags = MapFlags::PRESENT | MapFlags::WRITABLE | MapFlags::USER;
    for (i, &phys) in frames.iter().enumerate() {
        // SAFETY: frame exclusivo, identity-mapped
        unsafe {
            core::ptr::write_bytes(phys as *mut u8, 0, FRAME_SIZE as usize);
        }

        let va = map_start + i as u64 * FRAME_SIZE;
        if paging::map_page_64(pml4, phys, va, flags).is_err() {
            for (j, &p) in frames.iter().enumerate() {
                if j < i {
                    let _ = paging::unmap_page_64(pml4, map_start + j as u64 * FRAME_SIZE);
                }
                pmm::free_frame(crate::mm::PhysAddr::new(p));
            }
            return Err(SysError::OutOfMemory);
        }
    }

    with_current(|t| t.user_brk_size = new_end - base);
    Ok(current_brk)
}

/// get_reent(size): página zerada de kernel para o estado de
/// reentrância da libc. Limitado a uma página; o endereço devolvido é
/// do identity map (visível pela task, que clona a metade baixa do
/// kernel na PML4).
pub fn sys_get_reent(size: u64) -> SysResult {
    if size == 0 || size > 4096 {
        return Err(SysError::InvalidArgument);
    }
    let ptr = crate::mm::heap::kmalloc(size as u32);
    if ptr.is_null() {
        return Err(SysError::OutOfMemory);
    }
    // SAFETY: bloco recém-alocado do tamanho pedido
    unsafe {
        core::ptr::write_bytes(ptr, 0, size as usize);
    }
    Ok(ptr as u64)
}
