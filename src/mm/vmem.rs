//! vmem — conversão físico <-> virtual com modo selecionável.
//!
//! Três modos: identidade (default deste kernel), offset fixo e
//! page-walk do CR3 corrente. O walker de 64 bits respeita large pages
//! de 1 GiB (PS na PDPT) e 2 MiB (PS na PD) e é o que permite ao
//! mapeador mexer em page tables que deixam de ser endereçáveis pelo
//! identity map depois que um CR3 de usuário é carregado.
//!
//! Sentinelas de erro: `u32::MAX` / `u64::MAX`.

use crate::arch::x86_64::cpu::read_cr3;
use crate::mm::config::{HUGE_PAGE_ADDR_MASK, PAGE_ADDR_MASK, PAGE_HUGE, PAGE_PRESENT};
use core::sync::atomic::{AtomicI64, AtomicU8, Ordering};

/// Modo de conversão ativo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VmemMode {
    /// virt == phys (identity map)
    Identity = 0,
    /// virt = phys + offset fixo
    Offset = 1,
    /// page-walk do CR3 corrente
    Walk = 2,
}

static MODE: AtomicU8 = AtomicU8::new(VmemMode::Identity as u8);
static OFFSET: AtomicI64 = AtomicI64::new(0);

pub fn set_mode(mode: VmemMode) {
    MODE.store(mode as u8, Ordering::Relaxed);
}

pub fn set_offset(offset: i64) {
    OFFSET.store(offset, Ordering::Relaxed);
}

fn mode() -> VmemMode {
    match MODE.load(Ordering::Relaxed) {
        1 => VmemMode::Offset,
        2 => VmemMode::Walk,
        _ => VmemMode::Identity,
    }
}

/// Converte físico -> virtual (32 bits). `u32::MAX` em erro.
pub fn phys_to_virt(phys: u32) -> u32 {
    if phys == u32::MAX {
        return u32::MAX;
    }
    match mode() {
        VmemMode::Identity => phys,
        VmemMode::Offset | VmemMode::Walk => {
            let off = OFFSET.load(Ordering::Relaxed);
            let v = phys as i64 + off;
            if v < 0 || v > u32::MAX as i64 {
                u32::MAX
            } else {
                v as u32
            }
        }
    }
}

/// Converte virtual -> físico (32 bits). `u32::MAX` em erro.
pub fn virt_to_phys(virt: u32) -> u32 {
    match mode() {
        VmemMode::Identity => virt,
        VmemMode::Offset => {
            let off = OFFSET.load(Ordering::Relaxed);
            let p = virt as i64 - off;
            if p < 0 {
                u32::MAX
            } else {
                p as u32
            }
        }
        VmemMode::Walk => {
            let p = virt_to_phys64(virt as u64);
            if p == u64::MAX || p > u32::MAX as u64 {
                u32::MAX
            } else {
                p as u32
            }
        }
    }
}

/// Converte físico -> virtual (64 bits). `u64::MAX` em erro.
pub fn phys_to_virt64(phys: u64) -> u64 {
    if phys == u64::MAX {
        return u64::MAX;
    }
    match mode() {
        VmemMode::Identity => phys,
        VmemMode::Offset | VmemMode::Walk => {
            let off = OFFSET.load(Ordering::Relaxed);
            let v = phys as i64 + off;
            if v < 0 {
                u64::MAX
            } else {
                v as u64
            }
        }
    }
}

/// Converte virtual -> físico (64 bits) via page-walk do CR3 corrente.
/// Respeita PS (1 GiB na PDPT, 2 MiB na PD). `u64::MAX` em erro.
pub fn virt_to_phys64(virt: u64) -> u64 {
    match mode() {
        VmemMode::Identity => return virt,
        VmemMode::Offset => {
            let off = OFFSET.load(Ordering::Relaxed);
            let p = virt as i64 - off;
            return if p < 0 { u64::MAX } else { p as u64 };
        }
        VmemMode::Walk => {}
    }

    walk_current_cr3(virt)
}

/// Page-walk explícito do CR3 corrente (independente do modo).
pub fn walk_current_cr3(virt: u64) -> u64 {
    let pml4_base = read_cr3() & PAGE_ADDR_MASK;
    if pml4_base == 0 {
        return u64::MAX;
    }

    let pml4_idx = (virt >> 39) & 0x1FF;
    let pdpt_idx = (virt >> 30) & 0x1FF;
    let pd_idx = (virt >> 21) & 0x1FF;
    let pt_idx = (virt >> 12) & 0x1FF;
    let page_off = virt & 0xFFF;

    // SAFETY: as tabelas apontadas por um CR3 válido estão dentro do
    // identity map; leituras voláteis de 8 bytes alinhados.
    unsafe {
        let entry = read_table_entry(pml4_base, pml4_idx);
        if entry & PAGE_PRESENT == 0 {
            return u64::MAX;
        }

        let entry = read_table_entry(entry & PAGE_ADDR_MASK, pdpt_idx);
        if entry & PAGE_PRESENT == 0 {
            return u64::MAX;
        }
        if entry & PAGE_HUGE != 0 {
            // página de 1 GiB
            let base = entry & 0x000F_FFFF_C000_0000;
            return base + (virt & 0x3FFF_FFFF);
        }

        let entry = read_table_entry(entry & PAGE_ADDR_MASK, pd_idx);
        if entry & PAGE_PRESENT == 0 {
            return u64::MAX;
        }
        if entry & PAGE_HUGE != 0 {
            // página de 2 MiB
            let base = entry & HUGE_PAGE_ADDR_MASK;
            return base + (virt & 0x1F_FFFF);
        }

        let entry = read_table_entry(entry & PAGE_ADDR_MASK, pt_idx);
        if entry & PAGE_PRESENT == 0 {
            return u64::MAX;
        }

        (entry & PAGE_ADDR_MASK) + page_off
    }
}

/// Lê a entrada `idx` da tabela física `table_phys`.
///
/// # Safety
/// `table_phys` precisa apontar para uma page table válida e acessível
/// (identity map ou conversível pelo modo corrente).
unsafe fn read_table_entry(table_phys: u64, idx: u64) -> u64 {
    let virt = phys_to_virt64(table_phys);
    if virt == u64::MAX {
        return 0; // entrada "não presente" sintetizada
    }
    core::ptr::read_volatile((virt as *const u64).add(idx as usize))
}
