//! Paginação de 4 níveis (PML4 -> PDPT -> PD -> PT).
//!
//! O mapeador aloca tabelas intermediárias sob demanda (um frame de
//! 4 KiB zerado cada, flags `PRESENT|RW|USER`, NX limpo em todos os
//! níveis). Entradas de PD com PS (large page de 2 MiB) são divididas
//! numa PT nova cujas 512 entradas replicam a base original preservando
//! as flags (menos PS); a faixa de 2 MiB é invalidada no TLB antes de a
//! nova PTE de usuário ser instalada.
//!
//! Toda modificação é seguida de `invlpg` para a página afetada.

use crate::klib::align::align_down;
use crate::mm::addr::PhysAddr;
use crate::mm::config::{
    FRAME_SIZE, HUGE_PAGE_ADDR_MASK, HUGE_PAGE_SIZE, PAGE_ADDR_MASK, PAGE_HUGE, PAGE_NO_EXEC,
    PAGE_PRESENT,
};
use crate::mm::error::{MmError, MmResult};
use crate::mm::{pmm, vmem};
use bitflags::bitflags;
use core::sync::atomic::{AtomicU64, Ordering};

bitflags! {
    /// Flags de mapeamento de página.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MapFlags: u64 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const NO_CACHE = 1 << 4;
        const ACCESSED = 1 << 5;
        const DIRTY = 1 << 6;
        const HUGE_PAGE = 1 << 7;
        const GLOBAL = 1 << 8;
        const NO_EXECUTE = 1 << 63;
    }
}

/// PML4 do kernel (definida uma vez em `init_kernel_pml4`).
static KERNEL_PML4: AtomicU64 = AtomicU64::new(0);

/// Endereço físico da PML4 do kernel.
pub fn kernel_pml4() -> u64 {
    KERNEL_PML4.load(Ordering::SeqCst)
}

#[inline]
fn invlpg(virt: u64) {
    #[cfg(not(test))]
    // SAFETY: invalidar TLB é sempre seguro
    unsafe {
        core::arch::asm!("invlpg [{}]", in(reg) virt, options(nostack, preserves_flags));
    }
    #[cfg(test)]
    let _ = virt;
}

/// Converte o físico de uma tabela num ponteiro gravável.
fn table_ptr(table_phys: u64) -> MmResult<*mut u64> {
    let virt = vmem::phys_to_virt64(table_phys);
    if virt == u64::MAX {
        return Err(MmError::TranslationFailed);
    }
    Ok(virt as *mut u64)
}

/// Aloca e zera um frame para servir de page table. Retorna o físico.
fn alloc_table() -> MmResult<u64> {
    let frame = pmm::alloc_frame().ok_or(MmError::OutOfMemory)?;
    let phys = frame.as_u64();
    let ptr = table_ptr(phys)?;
    // SAFETY: frame recém-alocado, identity-mapped, exclusivo
    unsafe {
        for i in 0..512 {
            core::ptr::write_volatile(ptr.add(i), 0);
        }
    }
    Ok(phys)
}

/// Garante que a entrada `idx` de `table_phys` aponta para uma tabela
/// do nível seguinte, alocando-a se preciso, e retorna o físico dela.
/// NX é limpo na entrada em qualquer caso.
unsafe fn ensure_next_table(table_phys: u64, idx: usize) -> MmResult<u64> {
    let table = table_ptr(table_phys)?;
    let entry = core::ptr::read_volatile(table.add(idx));

    if entry & PAGE_PRESENT == 0 {
        let next = alloc_table()?;
        let new_entry = (next & PAGE_ADDR_MASK)
            | PAGE_PRESENT
            | MapFlags::WRITABLE.bits()
            | MapFlags::USER.bits();
        core::ptr::write_volatile(table.add(idx), new_entry & !PAGE_NO_EXEC);
        Ok(next)
    } else {
        // entrada existente: garantir NX limpo
        core::ptr::write_volatile(table.add(idx), entry & !PAGE_NO_EXEC);
        Ok(entry & PAGE_ADDR_MASK)
    }
}

/// Mapeia `virt` -> `phys` (4 KiB) na PML4 `pml4_phys`.
pub fn map_page_64(pml4_phys: u64, phys: u64, virt: u64, flags: MapFlags) -> MmResult<()> {
    let flags = flags | MapFlags::PRESENT;

    let pml4_idx = ((virt >> 39) & 0x1FF) as usize;
    let pdpt_idx = ((virt >> 30) & 0x1FF) as usize;
    let pd_idx = ((virt >> 21) & 0x1FF) as usize;
    let pt_idx = ((virt >> 12) & 0x1FF) as usize;

    // SAFETY: tabelas alcançadas via vmem; frames novos são exclusivos
    unsafe {
        let pdpt_phys = ensure_next_table(pml4_phys, pml4_idx)?;
        let pd_phys = ensure_next_table(pdpt_phys, pdpt_idx)?;

        // PD: pode ser large page de 2 MiB -> split
        let pd = table_ptr(pd_phys)?;
        let pd_entry = core::ptr::read_volatile(pd.add(pd_idx));

        if pd_entry & PAGE_PRESENT == 0 {
            let pt = alloc_table()?;
            let new_entry = (pt & PAGE_ADDR_MASK)
                | PAGE_PRESENT
                | MapFlags::WRITABLE.bits()
                | MapFlags::USER.bits();
            core::ptr::write_volatile(pd.add(pd_idx), new_entry & !PAGE_NO_EXEC);
        } else if pd_entry & PAGE_HUGE != 0 {
            split_large_page(pd, pd_idx, pd_entry, virt)?;
        } else {
            core::ptr::write_volatile(pd.add(pd_idx), pd_entry & !PAGE_NO_EXEC);
        }

        let pt_phys = core::ptr::read_volatile(pd.add(pd_idx)) & PAGE_ADDR_MASK;
        let pt = table_ptr(pt_phys)?;

        // PTE final: apenas os 12 bits baixos das flags, NX limpo
        let entry = (phys & PAGE_ADDR_MASK) | (flags.bits() & 0xFFF);
        core::ptr::write_volatile(pt.add(pt_idx), entry & !PAGE_NO_EXEC);
    }

    invlpg(virt);
    Ok(())
}

/// Divide uma large page de 2 MiB numa PT de 512 entradas de 4 KiB que
/// resolvem para os mesmos bytes físicos, preservando as flags da
/// entrada original (menos PS). Invalida a faixa de 2 MiB no TLB.
unsafe fn split_large_page(pd: *mut u64, pd_idx: usize, pd_entry: u64, virt: u64) -> MmResult<()> {
    let large_base = pd_entry & HUGE_PAGE_ADDR_MASK;
    let large_flags = pd_entry & 0xFFF;

    let pt_phys = alloc_table()?;
    let pt = table_ptr(pt_phys)?;

    for i in 0..512u64 {
        let page_phys = large_base + i * FRAME_SIZE;
        let entry = (page_phys & PAGE_ADDR_MASK) | (large_flags & !PAGE_HUGE);
        core::ptr::write_volatile(pt.add(i as usize), entry);
    }

    let new_pd_entry = (pt_phys & PAGE_ADDR_MASK)
        | PAGE_PRESENT
        | MapFlags::WRITABLE.bits()
        | MapFlags::USER.bits();
    core::ptr::write_volatile(pd.add(pd_idx), new_pd_entry & !PAGE_NO_EXEC);

    // invalidar os 2 MiB inteiros
    let region_base = align_down(virt, HUGE_PAGE_SIZE);
    for i in 0..512u64 {
        invlpg(region_base + i * FRAME_SIZE);
    }

    Ok(())
}

/// Mapeia usando o CR3 corrente.
pub fn map_page_current_64(phys: u64, virt: u64, flags: MapFlags) -> MmResult<()> {
    let cr3 = crate::arch::x86_64::cpu::read_cr3() & PAGE_ADDR_MASK;
    map_page_64(cr3, phys, virt, flags)
}

/// Remove o mapeamento 4 KiB de `virt`. Retorna o físico que estava lá.
pub fn unmap_page_64(pml4_phys: u64, virt: u64) -> MmResult<PhysAddr> {
    let (pt_phys, pt_idx) = locate_pt(pml4_phys, virt)?;
    let pt = table_ptr(pt_phys)?;

    // SAFETY: PT localizada pelo walk; escrita de 8 bytes alinhada
    unsafe {
        let entry = core::ptr::read_volatile(pt.add(pt_idx));
        if entry & PAGE_PRESENT == 0 {
            return Err(MmError::NotMapped);
        }
        core::ptr::write_volatile(pt.add(pt_idx), 0);
        invlpg(virt);
        Ok(PhysAddr::new(entry & PAGE_ADDR_MASK))
    }
}

/// Desce até a PT que cobre `virt` (sem alocar nada).
fn locate_pt(pml4_phys: u64, virt: u64) -> MmResult<(u64, usize)> {
    let pml4_idx = ((virt >> 39) & 0x1FF) as usize;
    let pdpt_idx = ((virt >> 30) & 0x1FF) as usize;
    let pd_idx = ((virt >> 21) & 0x1FF) as usize;
    let pt_idx = ((virt >> 12) & 0x1FF) as usize;

    unsafe {
        let pml4 = table_ptr(pml4_phys & PAGE_ADDR_MASK)?;
        let e = core::ptr::read_volatile(pml4.add(pml4_idx));
        if e & PAGE_PRESENT == 0 {
            return Err(MmError::NotMapped);
        }

        let pdpt = table_ptr(e & PAGE_ADDR_MASK)?;
        let e = core::ptr::read_volatile(pdpt.add(pdpt_idx));
        if e & PAGE_PRESENT == 0 || e & PAGE_HUGE != 0 {
            return Err(MmError::NotMapped);
        }

        let pd = table_ptr(e & PAGE_ADDR_MASK)?;
        let e = core::ptr::read_volatile(pd.add(pd_idx));
        if e & PAGE_PRESENT == 0 || e & PAGE_HUGE != 0 {
            return Err(MmError::NotMapped);
        }

        Ok((e & PAGE_ADDR_MASK, pt_idx))
    }
}

/// Resolve `virt` na PML4 dada. Retorna `(phys, flags_pte)`.
/// Usado pelos self-tests e pelo usercopy.
pub fn translate(pml4_phys: u64, virt: u64) -> Option<(u64, u64)> {
    let pml4_idx = ((virt >> 39) & 0x1FF) as usize;
    let pdpt_idx = ((virt >> 30) & 0x1FF) as usize;
    let pd_idx = ((virt >> 21) & 0x1FF) as usize;
    let pt_idx = ((virt >> 12) & 0x1FF) as usize;

    unsafe {
        let pml4 = table_ptr(pml4_phys & PAGE_ADDR_MASK).ok()?;
        let e = core::ptr::read_volatile(pml4.add(pml4_idx));
        if e & PAGE_PRESENT == 0 {
            return None;
        }

        let pdpt = table_ptr(e & PAGE_ADDR_MASK).ok()?;
        let e = core::ptr::read_volatile(pdpt.add(pdpt_idx));
        if e & PAGE_PRESENT == 0 {
            return None;
        }
        if e & PAGE_HUGE != 0 {
            let base = e & 0x000F_FFFF_C000_0000;
            return Some((base + (virt & 0x3FFF_FFFF), e & 0xFFF));
        }

        let pd = table_ptr(e & PAGE_ADDR_MASK).ok()?;
        let e = core::ptr::read_volatile(pd.add(pd_idx));
        if e & PAGE_PRESENT == 0 {
            return None;
        }
        if e & PAGE_HUGE != 0 {
            let base = e & HUGE_PAGE_ADDR_MASK;
            return Some((base + (virt & 0x1F_FFFF), e & 0xFFF));
        }

        let pt = table_ptr(e & PAGE_ADDR_MASK).ok()?;
        let e = core::ptr::read_volatile(pt.add(pt_idx));
        if e & PAGE_PRESENT == 0 {
            return None;
        }
        Some(((e & PAGE_ADDR_MASK) + (virt & 0xFFF), e & 0xFFF))
    }
}

/// Clona a PML4 entregue pela UEFI numa PML4 própria do kernel, anexa o
/// identity map de 4 GiB em large pages de 2 MiB (PML4[0]) e troca CR3.
/// Chamado uma única vez no boot.
pub fn init_kernel_pml4() -> MmResult<()> {
    let uefi_cr3 = crate::arch::x86_64::cpu::read_cr3() & PAGE_ADDR_MASK;
    let uefi_pml4 = table_ptr(uefi_cr3)?;

    let new_pml4_phys = alloc_table()?;
    let new_pml4 = table_ptr(new_pml4_phys)?;

    // SAFETY: identidade garantida pelo mapa da UEFI no boot
    unsafe {
        // copiar todas as entradas da PML4 da UEFI
        for i in 0..512 {
            let e = core::ptr::read_volatile(uefi_pml4.add(i));
            core::ptr::write_volatile(new_pml4.add(i), e);
        }

        // identity map dos 4 GiB baixos: PDPT com 4 PDs de 512 entradas
        // de 2 MiB cada, flags P|RW|USER|PS (0x87)
        let pdpt_phys = alloc_table()?;
        let pdpt = table_ptr(pdpt_phys)?;

        for pdpt_idx in 0..4u64 {
            let pd_phys = alloc_table()?;
            let pd = table_ptr(pd_phys)?;

            for i in 0..512u64 {
                let phys = pdpt_idx * 0x4000_0000 + i * HUGE_PAGE_SIZE;
                core::ptr::write_volatile(pd.add(i as usize), phys | 0x87);
            }

            core::ptr::write_volatile(pdpt.add(pdpt_idx as usize), (pd_phys & PAGE_ADDR_MASK) | 0x7);
        }

        core::ptr::write_volatile(new_pml4, (pdpt_phys & PAGE_ADDR_MASK) | 0x7);

        // trocar para a nova PML4
        crate::arch::x86_64::cpu::write_cr3(new_pml4_phys);
    }

    KERNEL_PML4.store(new_pml4_phys, Ordering::SeqCst);
    crate::kinfo!("(Paging) PML4 do kernel em {:#x}, identity 4 GiB ativo", new_pml4_phys);
    Ok(())
}

/// Cria a PML4 de uma task de usuário:
/// - `[0]` clonada da PML4 do kernel (o identity map baixo continua
///   alcançável depois do `mov cr3` — o próprio código do kernel que
///   executa o `iretq` vive lá);
/// - `[1..256)` zeradas (espaço privado da task);
/// - `[256..512)` copiadas da PML4 do kernel (metade alta).
///
/// Mapeamentos de usuário em endereços baixos continuam funcionando
/// porque `map_page_64` divide as large pages do identity map em PTs de
/// 4 KiB que têm precedência.
pub fn create_user_pml4() -> Option<u64> {
    let kernel = kernel_pml4();
    if kernel == 0 {
        crate::kerror!("(Paging) create_user_pml4 antes de init_kernel_pml4");
        return None;
    }

    let new_phys = alloc_table().ok()?;
    let new_pml4 = table_ptr(new_phys).ok()?;
    let kernel_pml4_ptr = table_ptr(kernel).ok()?;

    // SAFETY: tabelas identity-mapped; frame novo é exclusivo
    unsafe {
        for i in 1..256 {
            core::ptr::write_volatile(new_pml4.add(i), 0);
        }
        for i in 256..512 {
            let e = core::ptr::read_volatile(kernel_pml4_ptr.add(i));
            core::ptr::write_volatile(new_pml4.add(i), e);
        }
        let low = core::ptr::read_volatile(kernel_pml4_ptr);
        core::ptr::write_volatile(new_pml4, low);
    }

    Some(new_phys)
}
